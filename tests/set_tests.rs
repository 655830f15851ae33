use proptest::prelude::*;
use shardkit::LockFreeSet;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug, Clone)]
enum Op {
    Add(u16),
    Remove(u16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u16..256).prop_map(Op::Add),
        (0u16..256).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn single_thread_matches_btreeset(ops in prop::collection::vec(op(), 0..400)) {
        let set = LockFreeSet::new();
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(k) => prop_assert_eq!(set.add(k), model.insert(k)),
                Op::Remove(k) => prop_assert_eq!(set.remove(&k), model.remove(&k)),
            }
        }

        let items = set.to_vec();
        prop_assert!(items.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(items, model.iter().copied().collect::<Vec<_>>());
        prop_assert_eq!(set.len(), model.len());
    }
}

#[test]
fn test_disjoint_threads_add_then_remove() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 500;

    let set = Arc::new(LockFreeSet::new());
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let set = Arc::clone(&set);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Interleave key ranges so neighbours race on adjacent links.
                for i in 0..PER_THREAD {
                    assert!(set.add(i * THREADS + t));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(set.len(), (THREADS * PER_THREAD) as usize);
    let items = set.to_vec();
    assert_eq!(items, (0..THREADS * PER_THREAD).collect::<Vec<_>>());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    assert!(set.remove(&(i * THREADS + t)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(set.is_empty());
    assert!(set.to_vec().is_empty());
}

#[test]
fn test_racing_adds_of_same_key_have_one_winner() {
    let set = Arc::new(LockFreeSet::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let set = Arc::clone(&set);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..200u32).filter(|k| set.add(*k)).count()
            })
        })
        .collect();

    let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(wins, 200);
    assert_eq!(set.len(), 200);
}

#[test]
fn test_racing_removes_of_same_key_have_one_winner() {
    let set = Arc::new(LockFreeSet::new());
    for k in 0..200u32 {
        set.add(k);
    }
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let set = Arc::clone(&set);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..200u32).filter(|k| set.remove(k)).count()
            })
        })
        .collect();

    let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(wins, 200);
    assert!(set.is_empty());
}

#[test]
fn test_readers_see_stable_keys_during_churn() {
    let set = Arc::new(LockFreeSet::new());
    // Even keys stay put; odd keys churn.
    for k in (0..1000u32).step_by(2) {
        set.add(k);
    }

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for round in 0..20 {
                    for k in (1..1000u32).step_by(2) {
                        if round % 2 == 0 {
                            set.add(k);
                        } else {
                            set.remove(&k);
                        }
                    }
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for _ in 0..20 {
                    for k in (0..1000u32).step_by(2) {
                        assert!(set.contains(&k), "stable key {} went missing", k);
                    }
                    let snapshot = set.to_vec();
                    assert!(snapshot.windows(2).all(|w| w[0] < w[1]));
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    let items = set.to_vec();
    assert!(items.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(items.len(), set.len());
}

#[test]
fn test_custom_key_function() {
    #[derive(Debug, Clone, PartialEq)]
    struct Task {
        priority: u8,
        name: &'static str,
    }

    let tasks = LockFreeSet::with_key(|t: &Task| t.priority);
    assert!(tasks.add(Task { priority: 5, name: "compact" }));
    assert!(tasks.add(Task { priority: 1, name: "flush" }));
    assert!(!tasks.add(Task { priority: 5, name: "duplicate" }));

    let names: Vec<_> = tasks.to_vec().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["flush", "compact"]);

    // Lookup only consults the key.
    assert!(tasks.contains(&Task { priority: 1, name: "" }));
}
