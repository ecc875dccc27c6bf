//! Concurrent read-modify-write against one student id must never lose an
//! observation, for either backend.

use lernstufe_core::{Arm, BanditState, Observation, Reward, StudentId};
use lernstufe_store::{BanditStore, FileBackend, MemoryBackend, StateBackend};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;
const PER_THREAD: usize = 25;

fn hammer<B: StateBackend + 'static>(store: Arc<BanditStore<B>>, id: &str) -> BanditState {
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let id = StudentId::parse(id).unwrap();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    // Arm encodes the thread, reward alternates.
                    let arm = Arm(u8::try_from(t % 5 + 1).unwrap());
                    let reward = if i % 2 == 0 {
                        Reward::Correct
                    } else {
                        Reward::Incorrect
                    };
                    store.apply(&id, Observation::new(arm, reward)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    store.get(&StudentId::parse(id).unwrap()).unwrap()
}

fn assert_nothing_lost(state: &BanditState) {
    assert_eq!(state.history().len(), THREADS * PER_THREAD);
    assert_eq!(state.total_pulls(), (THREADS * PER_THREAD) as u64);
    assert!(state.is_consistent());
    for arm in 1..=5u8 {
        let threads_on_arm = (0..THREADS).filter(|t| t % 5 + 1 == arm as usize).count();
        let expected = (threads_on_arm * PER_THREAD) as u64;
        assert_eq!(state.pulls(Arm(arm)), expected, "arm {arm}");
        let successes = (threads_on_arm * PER_THREAD.div_ceil(2)) as u64;
        assert_eq!(state.stats(Arm(arm)).successes, successes, "arm {arm}");
    }
}

#[test]
fn memory_backend_loses_no_updates() {
    let store = Arc::new(BanditStore::new(MemoryBackend::new()));
    let state = hammer(store, "shared-mem");
    assert_nothing_lost(&state);
}

#[test]
fn file_backend_loses_no_updates() {
    let dir = std::env::temp_dir().join(format!(
        "lernstufe_concurrency_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let store = Arc::new(BanditStore::new(FileBackend::open(&dir).unwrap()));
    let state = hammer(Arc::clone(&store), "shared-file");
    assert_nothing_lost(&state);

    // A fresh backend over the same directory sees the same committed state.
    let reopened = BanditStore::new(FileBackend::open(&dir).unwrap());
    let id = StudentId::parse("shared-file").unwrap();
    assert_eq!(reopened.get(&id).unwrap(), state);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn two_distinct_observations_both_land() {
    let store = Arc::new(BanditStore::new(MemoryBackend::new()));
    let id = StudentId::parse("pair").unwrap();
    let a = Observation::new(Arm(1), Reward::Correct);
    let b = Observation::new(Arm(5), Reward::Incorrect);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [a, b]
        .into_iter()
        .map(|obs| {
            let store = Arc::clone(&store);
            let id = id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.apply(&id, obs).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let history = store.get(&id).unwrap().history().to_vec();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|o| **o == a).count(), 1);
    assert_eq!(history.iter().filter(|o| **o == b).count(), 1);
}

#[test]
fn readers_see_only_committed_snapshots() {
    let store = Arc::new(BanditStore::new(MemoryBackend::new()));
    let id = StudentId::parse("reader").unwrap();
    let writer = {
        let store = Arc::clone(&store);
        let id = id.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                store
                    .apply(&id, Observation::new(Arm(2), Reward::Correct))
                    .unwrap();
            }
        })
    };
    let mut last = 0;
    for _ in 0..200 {
        let snapshot = store.get(&id).unwrap();
        assert!(snapshot.is_consistent());
        assert!(snapshot.total_pulls() >= last, "history went backwards");
        last = snapshot.total_pulls();
    }
    writer.join().unwrap();
    assert_eq!(store.get(&id).unwrap().total_pulls(), 200);
}

#[test]
fn separate_stores_on_one_directory_lose_no_updates() {
    // Each thread opens its own store, as separate processes would: nothing
    // but the backend's lock file orders their writes.
    let dir = std::env::temp_dir().join(format!(
        "lernstufe_concurrency_multi_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let dir = dir.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = BanditStore::new(FileBackend::open(&dir).unwrap());
                let id = StudentId::parse("shared-dir").unwrap();
                barrier.wait();
                for i in 0..PER_THREAD {
                    let arm = Arm(u8::try_from(t % 5 + 1).unwrap());
                    let reward = if i % 2 == 0 {
                        Reward::Correct
                    } else {
                        Reward::Incorrect
                    };
                    store.apply(&id, Observation::new(arm, reward)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let store = BanditStore::new(FileBackend::open(&dir).unwrap());
    let state = store.get(&StudentId::parse("shared-dir").unwrap()).unwrap();
    assert_nothing_lost(&state);
    let _ = std::fs::remove_dir_all(&dir);
}
