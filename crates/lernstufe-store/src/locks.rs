//! Per-key reader/writer locks.
//!
//! The registry mutex is only held long enough to hand out (or prune) the
//! lock of one key; contention for state work is scoped to a single id.

use lernstufe_core::StudentId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type Slot = Arc<RwLock<()>>;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<StudentId, Slot>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the shared lock of `id`.
    pub fn with_read<T>(&self, id: &StudentId, f: impl FnOnce() -> T) -> T {
        let slot = self.acquire(id);
        let out = {
            let _guard = slot.read().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(id, slot);
        out
    }

    /// Runs `f` while holding the exclusive lock of `id`.
    pub fn with_write<T>(&self, id: &StudentId, f: impl FnOnce() -> T) -> T {
        let slot = self.acquire(id);
        let out = {
            let _guard = slot.write().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(id, slot);
        out
    }

    /// Number of keys that currently have a live lock.
    #[must_use]
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn acquire(&self, id: &StudentId) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id.clone()).or_default())
    }

    fn release(&self, id: &StudentId, slot: Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under the registry mutex, so a count of
        // two (map + ours) means nobody else is waiting on this key.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn locks_are_pruned_after_use() {
        let locks = KeyedLocks::new();
        let id = StudentId::parse("s1").unwrap();
        let v = locks.with_write(&id, || locks.active());
        assert_eq!(v, 1);
        assert_eq!(locks.active(), 0);
        locks.with_read(&id, || ());
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn writers_on_same_key_never_overlap() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let id = StudentId::parse("shared").unwrap();
                    barrier.wait();
                    for _ in 0..100 {
                        locks.with_write(&id, || {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn panicking_writer_releases_lock() {
        let locks = Arc::new(KeyedLocks::new());
        let id = StudentId::parse("p").unwrap();
        let l2 = Arc::clone(&locks);
        let id2 = id.clone();
        let res = thread::spawn(move || l2.with_write(&id2, || -> u32 { panic!("boom") })).join();
        assert!(res.is_err());
        // poisoned lock is recovered, not deadlocked
        assert_eq!(locks.with_write(&id, || 42), 42);
    }
}
