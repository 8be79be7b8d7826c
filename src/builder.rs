use std::{hash::BuildHasher, marker::PhantomData};

use crate::map::{DefaultHashBuilder, HashMap};

const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// Builds a [`HashMap`] with the settings that have no place in the
/// positional constructors.
///
/// ```
/// use stripemap::{Builder, HashMap};
///
/// let map: HashMap<u32, String> = Builder::new()
///     .num_shards(64)
///     .initial_capacity(256)
///     .grow_shards_on_resize(false)
///     .build();
///
/// map.insert(1, "one".to_string());
/// ```
pub struct Builder<K, V, const MAX_LOAD_FACTOR: usize = 4> {
    num_shards: Option<usize>,
    initial_capacity: usize,
    grow_shards_on_resize: bool,
    map_type: PhantomData<(K, V)>,
}

impl<K, V, const MAX_LOAD_FACTOR: usize> Builder<K, V, MAX_LOAD_FACTOR> {
    pub fn new() -> Self {
        Self {
            num_shards: None,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            grow_shards_on_resize: true,
            map_type: PhantomData,
        }
    }

    /// Sets the number of shard mutexes. Defaults to twice the number
    /// of logical CPUs.
    pub fn num_shards(self, num_shards: usize) -> Self {
        Self {
            num_shards: Some(num_shards),
            ..self
        }
    }

    /// Sets the initial bucket count. The effective count is clamped up
    /// to the shard count so every shard guards at least one bucket.
    pub fn initial_capacity(self, initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..self
        }
    }

    /// Whether a resize also doubles the shard count (up to
    /// [`MAX_SHARDS`](crate::MAX_SHARDS)). Defaults to `true`; with
    /// `false` the shard mutexes stay as constructed and only the bucket
    /// array grows.
    pub fn grow_shards_on_resize(self, grow_shards_on_resize: bool) -> Self {
        Self {
            grow_shards_on_resize,
            ..self
        }
    }

    /// Builds a map hashing with the default hasher.
    ///
    /// # Panics
    ///
    /// Panics if the configured shard count is 0.
    pub fn build(self) -> HashMap<K, V, DefaultHashBuilder, MAX_LOAD_FACTOR> {
        self.build_with_hasher(DefaultHashBuilder::default())
    }

    /// Builds a map hashing with `build_hasher`.
    ///
    /// # Panics
    ///
    /// Panics if the configured shard count is 0.
    pub fn build_with_hasher<S>(self, build_hasher: S) -> HashMap<K, V, S, MAX_LOAD_FACTOR>
    where
        S: BuildHasher + Clone,
    {
        let num_shards = self.num_shards.unwrap_or_else(|| num_cpus::get() * 2);

        HashMap::with_everything(
            num_shards,
            self.initial_capacity,
            self.grow_shards_on_resize,
            build_hasher,
        )
    }
}

impl<K, V, const MAX_LOAD_FACTOR: usize> Default for Builder<K, V, MAX_LOAD_FACTOR> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Builder;

    #[test]
    fn defaults() {
        let map = Builder::<u32, u32>::new().build();
        assert!(map.num_shards() >= 2);
        assert!(map.num_buckets() >= map.num_shards());
        assert!(map.is_empty());
    }

    #[test]
    fn explicit_settings() {
        let map = Builder::<u32, u32>::new()
            .num_shards(8)
            .initial_capacity(128)
            .build();
        assert_eq!(map.num_shards(), 8);
        assert_eq!(map.num_buckets(), 128);
    }

    #[test]
    fn fixed_shards_survive_resizing() {
        let map = Builder::<u32, u32>::new()
            .num_shards(8)
            .initial_capacity(8)
            .grow_shards_on_resize(false)
            .build();

        for i in 0..5_000 {
            map.insert(i, i);
        }

        assert_eq!(map.num_shards(), 8);
        assert!(map.num_buckets() > 8);
    }

    #[test]
    #[should_panic]
    fn zero_shards_panics_at_build() {
        let _ = Builder::<u32, u32>::new().num_shards(0).build();
    }
}
