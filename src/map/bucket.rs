use std::{borrow::Borrow, mem, vec::Drain};

/// A single chain of `(key, value)` entries, identified by a bucket index.
///
/// A bucket holds no synchronization of its own. Every method taking
/// `&mut self` must only be called while the shard mutex guarding this
/// bucket is held; the type system enforces that through the mutex guards
/// handed out by the owning [`Table`](crate::map::table::Table).
pub(crate) struct Bucket<K, V> {
    entries: Vec<(K, V)>,
}

// Not derived: a derived impl would require `K: Default` and `V: Default`.
impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K, V> Bucket<K, V> {
    /// Returns the position of the entry for `key`, if present.
    #[inline]
    pub(crate) fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries.iter().position(|(k, _)| k.borrow() == key)
    }

    /// Returns a clone of the value for `key`, or `None` if absent.
    #[inline]
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        V: Clone,
    {
        self.find(key).map(|i| self.entries[i].1.clone())
    }

    /// Inserts `value` for `key`, overwriting in place if the key is
    /// already present.
    ///
    /// Returns the previous value (if any) and the chain length after the
    /// operation. The length is what the caller checks against the load
    /// factor to decide whether to trigger a resize.
    pub(crate) fn insert(&mut self, key: K, value: V) -> (Option<V>, usize)
    where
        K: Eq,
    {
        let previous = match self.find(&key) {
            Some(i) => Some(mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        };

        (previous, self.len())
    }

    /// Removes the entry for `key` and returns its value, or `None` if the
    /// key is absent.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        // Order within a chain is insignificant.
        self.find(key).map(|i| self.entries.swap_remove(i).1)
    }

    /// Moves every entry out of the bucket. Used when migrating a
    /// generation into its replacement.
    pub(crate) fn drain(&mut self) -> Drain<'_, (K, V)> {
        self.entries.drain(..)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
