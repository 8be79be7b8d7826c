#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! A concurrent hash map built on lock striping and online resizing.
//!
//! The map is, at its core, a chained hash table whose buckets are
//! partitioned into contiguous blocks, each block guarded by its own
//! shard mutex. A point operation hashes its key to a bucket index,
//! takes exactly one shard mutex, and works on one chain; operations on
//! different shards never contend. With `B` buckets and `S` shards,
//! every shard guards `ceil(B / S)` consecutive buckets, so "lock every
//! shard" doubles as a full barrier over the whole table.
//!
//! The key insight into making the table resizable without a global
//! lock is to treat each generation of the table as immutable once
//! published. The buckets, the shard mutexes, the bucket count and the
//! hasher of a generation never change; what changes is which
//! generation an atomically swappable pointer designates as current.
//! Point operations follow a load-lock-reload-compare idiom: load the
//! current generation, take the shard mutex for the key, then re-load
//! the pointer and compare it by identity with the generation in hand.
//! If they differ, a resize completed in between and the held mutex
//! guards stale buckets; the operation drops it and retries against the
//! new generation. If they match, the operation is working on live data
//! and every later resize is ordered after it by the shard mutex.
//!
//! A resize is triggered by the writer whose insert pushes a chain past
//! the load factor, and only by the first such writer: a test-and-set
//! flag admits one resize at a time. The resizing thread acquires every
//! shard mutex of the current generation (with a try-and-back-off loop
//! that cannot deadlock against single-mutex holders), re-checks the
//! pointer, then migrates all entries into a freshly allocated
//! generation with `2 * B + 1` buckets, and by default twice the shards
//! up to [`MAX_SHARDS`]. The new generation needs no locking while it is
//! filled because no other thread can reach it yet; the old one needs
//! none because all of its mutexes are held. Publishing the new
//! generation is a single release store, after which stalled operations
//! fail their identity check and retry.
//!
//! Readers take transient shared ownership of a generation for the
//! duration of one operation, so a superseded generation stays alive
//! exactly until the last operation that loaded it completes.
//!
//! This design trades the incremental-migration complexity of lock-free
//! tables for a short stop-the-shards pause: point operations block only
//! while entries are being migrated, and none of them can ever act on a
//! stale generation or lose a write to one.

mod builder;
mod lock;
mod map;

pub use builder::Builder;
pub use map::{DefaultHashBuilder, HashMap, MAX_SHARDS};
