use std::{
    borrow::Borrow,
    hash::{BuildHasher, Hash, Hasher},
};

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

use super::bucket::Bucket;

/// The buckets owned by a single shard mutex.
pub(crate) type Shard<K, V> = Box<[Bucket<K, V>]>;

/// One generation of the map: `num_buckets` buckets partitioned into
/// contiguous blocks of `budget` buckets, each block guarded by (and owned
/// by) one shard mutex.
///
/// A `Table` is immutable once published: the shard array, the bucket
/// count, the budget and the hasher never change. Only the buckets behind
/// the shard mutexes are mutated, and only under those mutexes. Replacing
/// a table with a larger one is the job of the resize protocol in
/// [`HashMap`](crate::HashMap).
pub(crate) struct Table<K, V, S> {
    shards: Box<[CachePadded<Mutex<Shard<K, V>>>]>,
    num_buckets: usize,
    budget: usize,
    build_hasher: S,
}

impl<K, V, S> Table<K, V, S> {
    /// Creates a table with `num_buckets` empty buckets spread over
    /// `num_shards` mutexes.
    ///
    /// # Panics
    ///
    /// Panics if `num_shards` or `num_buckets` is zero.
    pub(crate) fn new(num_shards: usize, num_buckets: usize, build_hasher: S) -> Self {
        assert!(num_shards > 0);
        assert!(num_buckets > 0);

        // ceil(num_buckets / num_shards); the last shard may own a short
        // block, and shards past the bucket range own nothing.
        let budget = (num_buckets + num_shards - 1) / num_shards;

        let shards = (0..num_shards)
            .map(|i| {
                let start = i * budget;
                let len = num_buckets.saturating_sub(start).min(budget);
                let buckets: Vec<_> = (0..len).map(|_| Bucket::default()).collect();
                CachePadded::new(Mutex::new(buckets.into_boxed_slice()))
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            num_buckets,
            budget,
            build_hasher,
        }
    }

    pub(crate) fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    pub(crate) fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub(crate) fn build_hasher(&self) -> &S {
        &self.build_hasher
    }

    /// The full shard array, for callers that need to lock every shard.
    pub(crate) fn shards(&self) -> &[CachePadded<Mutex<Shard<K, V>>>] {
        &self.shards
    }

    #[inline]
    pub(crate) fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.num_buckets as u64) as usize
    }

    #[inline]
    fn shard_index(&self, bucket_index: usize) -> usize {
        bucket_index / self.budget
    }

    #[inline]
    fn shard_offset(&self, bucket_index: usize) -> usize {
        bucket_index % self.budget
    }

    /// Acquires the shard mutex guarding `bucket_index` and narrows the
    /// guard down to that one bucket.
    pub(crate) fn lock_bucket(&self, bucket_index: usize) -> MappedBucketGuard<'_, K, V> {
        let guard = self.shards[self.shard_index(bucket_index)].lock();
        MutexGuard::map(guard, |buckets| &mut buckets[self.shard_offset(bucket_index)])
    }
}

impl<K, V, S> Table<K, V, S>
where
    K: Hash,
    S: BuildHasher,
{
    #[inline]
    pub(crate) fn hash<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        let mut hasher = self.build_hasher.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }
}

impl<K, V, S> Table<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts an entry without touching any shard mutex.
    ///
    /// Sound only while the table is still private to one thread, which is
    /// exactly the window between allocating a replacement table and
    /// publishing it; `&mut self` makes that exclusivity explicit.
    pub(crate) fn rehash_insert(&mut self, key: K, value: V) {
        let bucket_index = self.bucket_index(self.hash(&key));
        let shard_index = self.shard_index(bucket_index);
        let shard_offset = self.shard_offset(bucket_index);
        self.shards[shard_index].get_mut()[shard_offset].insert(key, value);
    }
}

pub(crate) type MappedBucketGuard<'a, K, V> = parking_lot::MappedMutexGuard<'a, Bucket<K, V>>;

#[cfg(test)]
mod tests {
    use std::collections::hash_map::RandomState;

    use super::Table;

    #[test]
    fn budget_is_ceiling_division() {
        let table: Table<u32, u32, _> = Table::new(2, 5, RandomState::default());
        assert_eq!(table.budget, 3);
        assert_eq!(table.shards()[0].lock().len(), 3);
        assert_eq!(table.shards()[1].lock().len(), 2);
    }

    #[test]
    fn every_bucket_maps_into_a_shard() {
        for (num_shards, num_buckets) in [(1, 1), (2, 5), (3, 7), (64, 256), (7, 2055)] {
            let table: Table<u32, u32, _> = Table::new(num_shards, num_buckets, RandomState::default());
            for bucket_index in 0..num_buckets {
                let shard_index = table.shard_index(bucket_index);
                assert!(shard_index < num_shards);
                assert!(table.shard_offset(bucket_index) < table.shards()[shard_index].lock().len());
            }
        }
    }

    #[test]
    fn more_shards_than_buckets_leaves_trailing_shards_empty() {
        let table: Table<u32, u32, _> = Table::new(4, 2, RandomState::default());
        assert_eq!(table.budget, 1);
        assert_eq!(table.shards()[0].lock().len(), 1);
        assert_eq!(table.shards()[1].lock().len(), 1);
        assert_eq!(table.shards()[2].lock().len(), 0);
        assert_eq!(table.shards()[3].lock().len(), 0);
    }

    #[test]
    fn bucket_index_is_always_in_range() {
        let table: Table<u64, u32, _> = Table::new(8, 101, RandomState::default());
        for key in 0u64..10_000 {
            assert!(table.bucket_index(table.hash(&key)) < 101);
        }
    }

    #[test]
    fn lock_bucket_and_rehash_insert_agree_on_placement() {
        let mut table: Table<u64, u64, _> = Table::new(8, 101, RandomState::default());
        for key in 0u64..500 {
            table.rehash_insert(key, key + 1);
        }

        for key in 0u64..500 {
            let bucket_index = table.bucket_index(table.hash(&key));
            let bucket = table.lock_bucket(bucket_index);
            assert_eq!(bucket.get(&key), Some(key + 1));
        }
    }
}
