//! Deadlock-free acquisition of a whole family of mutexes.
//!
//! Resizing needs every shard mutex of one table generation at once,
//! while concurrent point operations keep taking single shard mutexes
//! from the same generation. Grabbing the mutexes one by one with
//! blocking locks could deadlock against another multi-locker; instead,
//! only the first mutex of each attempt is acquired blockingly and the
//! rest are try-locked in rotating order. Any failed try-lock releases
//! everything taken for the attempt and restarts, blocking next on the
//! mutex that was busy. Point operations hold at most one shard mutex at
//! a time and never wait on anything else while holding it, so every
//! attempt either completes or identifies exactly the holder to wait
//! for.

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::{Mutex, MutexGuard};

/// Guards for every mutex of one family, in the family's index order.
///
/// Dropping the `MultiLock` releases all of them in one sweep.
pub(crate) struct MultiLock<'a, T> {
    guards: Vec<MutexGuard<'a, T>>,
}

impl<'a, T> MultiLock<'a, T> {
    /// Mutable access to the data behind every guard, in index order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + use<'_, 'a, T> {
        self.guards.iter_mut().map(|guard| &mut **guard)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.guards.len()
    }
}

/// Acquires every mutex in `mutexes` without deadlocking against holders
/// of single mutexes from the same slice.
///
/// # Panics
///
/// Panics if `mutexes` is empty.
pub(crate) fn lock_all<T>(mutexes: &[CachePadded<Mutex<T>>]) -> MultiLock<'_, T> {
    assert!(!mutexes.is_empty());

    let backoff = Backoff::new();
    let mut start = 0;

    'attempt: loop {
        let mut guards = Vec::with_capacity(mutexes.len());
        guards.push(mutexes[start].lock());

        for offset in 1..mutexes.len() {
            let index = (start + offset) % mutexes.len();
            match mutexes[index].try_lock() {
                Some(guard) => guards.push(guard),
                None => {
                    // Release everything taken for this attempt and wait
                    // for whoever preempted us.
                    drop(guards);
                    start = index;
                    backoff.snooze();
                    continue 'attempt;
                }
            }
        }

        // `guards[i]` currently guards `mutexes[(start + i) % len]`;
        // rotate back into slice order so callers can index by shard.
        guards.rotate_right(start);

        return MultiLock { guards };
    }
}
