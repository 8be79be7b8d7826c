//! The striped-lock hash map and its resize protocol.

pub(crate) mod bucket;
pub(crate) mod table;

use std::{
    borrow::Borrow,
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;

use crate::lock;
use self::table::Table;

/// Default hasher for `HashMap`.
pub type DefaultHashBuilder = RandomState;

/// The hard cap on the number of shard mutexes a table will ever use.
///
/// Growing the shard count on resize stops at this bound; the bucket
/// count keeps growing without limit.
pub const MAX_SHARDS: usize = 1024;

/// A concurrent hash map with lock striping and online resizing.
///
/// The map spreads its buckets over a set of shard mutexes so that
/// operations on different shards proceed in parallel, and it grows its
/// bucket array in the background of ordinary use: the writer whose
/// insert pushes a bucket chain past `MAX_LOAD_FACTOR` entries stops all
/// shards of the current generation, migrates every entry into a table
/// with `2 * buckets + 1` buckets (and, by default, twice the shards, up
/// to [`MAX_SHARDS`]), and atomically publishes the replacement. Point
/// operations never act on a superseded generation; each one re-checks
/// the published table after taking its shard lock and retries if a
/// resize won the race.
///
/// All operations take `&self`; the map is meant to be shared by
/// reference (or inside an `Arc`) between threads. It is deliberately
/// not `Clone`: a by-value copy could go stale the moment the original
/// resizes.
///
/// It is required that the keys implement the [`Eq`] and [`Hash`]
/// traits, and that `k1 == k2 -> hash(k1) == hash(k2)`. The hashing
/// algorithm defaults to the one used by `std::collections::HashMap`
/// and can be replaced per map via [`with_hasher`](Self::with_hasher)
/// or the [`Builder`](crate::Builder).
///
/// `get` returns a _clone_ of the stored value. If values are expensive
/// to clone, wrap them in `std::sync::Arc` before storing.
pub struct HashMap<K, V, S = DefaultHashBuilder, const MAX_LOAD_FACTOR: usize = 4> {
    current: ArcSwap<Table<K, V, S>>,
    resize_in_progress: AtomicBool,
    grow_shards_on_resize: bool,
    len: AtomicUsize,
}

impl<K, V, const MAX_LOAD_FACTOR: usize> HashMap<K, V, DefaultHashBuilder, MAX_LOAD_FACTOR> {
    /// Creates a map with `num_shards` shard mutexes and at least
    /// `initial_capacity` buckets, hashing with the default hasher and
    /// growing the shard count on resize.
    ///
    /// The effective bucket count is
    /// `max(initial_capacity, num_shards)`, so every shard guards at
    /// least one bucket.
    ///
    /// # Panics
    ///
    /// Panics if `num_shards` is 0.
    pub fn new(num_shards: usize, initial_capacity: usize) -> Self {
        Self::with_hasher(num_shards, initial_capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S, const MAX_LOAD_FACTOR: usize> HashMap<K, V, S, MAX_LOAD_FACTOR> {
    /// Creates a map like [`new`](Self::new), hashing with
    /// `build_hasher`.
    ///
    /// # Panics
    ///
    /// Panics if `num_shards` is 0.
    pub fn with_hasher(num_shards: usize, initial_capacity: usize, build_hasher: S) -> Self {
        Self::with_everything(num_shards, initial_capacity, true, build_hasher)
    }

    /// # Panics
    ///
    /// Panics if `num_shards` is 0.
    pub(crate) fn with_everything(
        num_shards: usize,
        initial_capacity: usize,
        grow_shards_on_resize: bool,
        build_hasher: S,
    ) -> Self {
        assert!(num_shards > 0);

        let num_shards = num_shards.min(MAX_SHARDS);
        let num_buckets = initial_capacity.max(num_shards);

        Self {
            current: ArcSwap::from_pointee(Table::new(num_shards, num_buckets, build_hasher)),
            resize_in_progress: AtomicBool::new(false),
            grow_shards_on_resize,
            len: AtomicUsize::new(0),
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// Other threads may be adding or removing entries at any time, so
    /// the count is already approximate by the time it is returned.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bucket count of the current table generation.
    ///
    /// Grows by `2 * n + 1` on every resize; never shrinks.
    pub fn num_buckets(&self) -> usize {
        self.current.load().num_buckets()
    }

    /// Returns the shard count of the current table generation.
    pub fn num_shards(&self) -> usize {
        self.current.load().num_shards()
    }

    /// `true` if the snapshot taken before locking still names the
    /// published generation. On `false` the caller holds a stale shard
    /// lock and must retry against the current table.
    #[inline]
    fn verify(&self, snapshot: &Arc<Table<K, V, S>>) -> bool {
        Arc::ptr_eq(snapshot, &self.current.load())
    }
}

impl<K, V, S, const MAX_LOAD_FACTOR: usize> HashMap<K, V, S, MAX_LOAD_FACTOR>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Returns a clone of the value corresponding to the key, or `None`
    /// if the key is absent.
    ///
    /// The key may be any borrowed form of the map's key type, but
    /// [`Hash`] and [`Eq`] on the borrowed form *must* match those for
    /// the key type.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        loop {
            let table = self.current.load_full();
            let bucket_index = table.bucket_index(table.hash(key));
            let bucket = table.lock_bucket(bucket_index);
            if !self.verify(&table) {
                continue;
            }

            return bucket.get(key);
        }
    }

    /// Returns `true` if the map contains a value for the key. Unlike
    /// [`get`](Self::get), no clone of the value is made.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        loop {
            let table = self.current.load_full();
            let bucket_index = table.bucket_index(table.hash(key));
            let bucket = table.lock_bucket(bucket_index);
            if !self.verify(&table) {
                continue;
            }

            return bucket.find(key).is_some();
        }
    }

    /// Inserts a key-value pair into the map, returning the previous
    /// value if the key was already present.
    ///
    /// If the insert pushes the bucket's chain past `MAX_LOAD_FACTOR`
    /// entries and no resize is already in flight, the calling thread
    /// performs the resize before returning.
    pub fn insert(&self, key: K, value: V) -> Option<V>
    where
        S: Clone,
    {
        loop {
            let table = self.current.load_full();
            let bucket_index = table.bucket_index(table.hash(&key));
            let mut bucket = table.lock_bucket(bucket_index);
            if !self.verify(&table) {
                continue;
            }

            let (previous, chain_len) = bucket.insert(key, value);
            if previous.is_none() {
                self.len.fetch_add(1, Ordering::Relaxed);
            }
            drop(bucket);

            // Only the first writer past the threshold resizes; the flag
            // is cleared by that writer once the new table is published.
            if chain_len > MAX_LOAD_FACTOR && !self.resize_in_progress.swap(true, Ordering::Relaxed)
            {
                self.resize();
            }

            return previous;
        }
    }

    /// Removes a key from the map, returning the value previously stored
    /// for it. Removing an absent key is a silent no-op.
    ///
    /// The table never shrinks on removal.
    ///
    /// The key may be any borrowed form of the map's key type, but
    /// [`Hash`] and [`Eq`] on the borrowed form *must* match those for
    /// the key type.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        loop {
            let table = self.current.load_full();
            let bucket_index = table.bucket_index(table.hash(key));
            let mut bucket = table.lock_bucket(bucket_index);
            if !self.verify(&table) {
                continue;
            }

            let previous = bucket.remove(key);
            if previous.is_some() {
                self.len.fetch_sub(1, Ordering::Relaxed);
            }

            return previous;
        }
    }

    /// Replaces the current table generation with one of `2 * B + 1`
    /// buckets, migrating every entry.
    ///
    /// Caller must have claimed `resize_in_progress`; the flag is
    /// cleared here after the new table is published.
    fn resize(&self)
    where
        S: Clone,
    {
        loop {
            let table = self.current.load_full();
            let mut old_shards = lock::lock_all(table.shards());
            // The same re-check as in the point operations: between the
            // load and the last lock acquisition the generation may have
            // been replaced, and these locks would guard the wrong one.
            if !self.verify(&table) {
                continue;
            }

            let num_shards = if self.grow_shards_on_resize {
                (table.num_shards() * 2).min(MAX_SHARDS)
            } else {
                table.num_shards()
            };
            let num_buckets = table.num_buckets() * 2 + 1;

            log::trace!(
                "resizing from {} buckets / {} shards to {} buckets / {} shards",
                table.num_buckets(),
                table.num_shards(),
                num_buckets,
                num_shards,
            );

            // The new table is still private to this thread, so entries
            // go in without locking. The old buckets can be drained in
            // place: every shard mutex of the old generation is held
            // here, and once the new table is published no operation can
            // pass the verify step against the old one again.
            let mut next = Table::new(num_shards, num_buckets, table.build_hasher().clone());
            for shard in old_shards.iter_mut() {
                for old_bucket in shard.iter_mut() {
                    for (key, value) in old_bucket.drain() {
                        next.rehash_insert(key, value);
                    }
                }
            }

            self.current.store(Arc::new(next));
            self.resize_in_progress.store(false, Ordering::Relaxed);

            return;
        }
    }
}

impl<K, V, const MAX_LOAD_FACTOR: usize> Default
    for HashMap<K, V, DefaultHashBuilder, MAX_LOAD_FACTOR>
{
    fn default() -> Self {
        crate::Builder::new().build()
    }
}

impl<K, V, S, const MAX_LOAD_FACTOR: usize> fmt::Debug for HashMap<K, V, S, MAX_LOAD_FACTOR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.current.load();
        f.debug_struct("HashMap")
            .field("len", &self.len())
            .field("num_buckets", &table.num_buckets())
            .field("num_shards", &table.num_shards())
            .finish_non_exhaustive()
    }
}
