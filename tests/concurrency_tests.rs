use shardkit::{ShardMap, ShardMapBuilder};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_inserts() {
    let map = Arc::new(ShardMap::new());
    let mut handles = vec![];

    // Spawn 10 threads, each inserting 100 items
    for thread_id in 0..10 {
        let map = Arc::clone(&map);
        let handle = thread::spawn(move || {
            for i in 0..100 {
                let key = format!("thread_{}_key_{}", thread_id, i);
                map.insert(key, i);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Verify all items are present
    assert_eq!(map.len(), 1000);
}

#[test]
fn test_concurrent_reads() {
    let map = Arc::new(ShardMap::new());

    for i in 0..100 {
        map.insert(format!("key_{}", i), i);
    }

    let mut handles = vec![];

    // Spawn 20 threads, each reading all items
    for _ in 0..20 {
        let map = Arc::clone(&map);
        let handle = thread::spawn(move || {
            for i in 0..100 {
                let key = format!("key_{}", i);
                let value = map.get(&key).unwrap();
                assert_eq!(*value, i);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_upserts_lose_nothing() {
    let map = Arc::new(ShardMap::new());
    let mut handles = vec![];

    // 10 threads, each adding 1 to the same counter 100 times
    for _ in 0..10 {
        let map = Arc::clone(&map);
        let handle = thread::spawn(move || {
            for _ in 0..100 {
                map.upsert("counter".to_string(), 1u64, |old, new| {
                    old.copied().unwrap_or(0) + new
                });
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*map.get(&"counter".to_string()).unwrap(), 1000);
}

#[test]
fn test_concurrent_insert_if_absent_single_winner() {
    let map = Arc::new(ShardMap::new());
    let mut handles = vec![];

    for thread_id in 0..8 {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            (0..100)
                .filter(|i| map.insert_if_absent(*i, thread_id))
                .count()
        }));
    }

    let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(wins, 100);
    assert_eq!(map.len(), 100);
}

#[test]
fn test_concurrent_mixed_operations() {
    let map = Arc::new(ShardMap::new());
    let mut handles = vec![];

    // Spawn writers
    for thread_id in 0..5 {
        let map = Arc::clone(&map);
        let handle = thread::spawn(move || {
            for i in 0..100 {
                let key = format!("key_{}_{}", thread_id, i);
                map.insert(key, i);
            }
            // Drop every even key again
            for i in (0..100).step_by(2) {
                let key = format!("key_{}_{}", thread_id, i);
                assert!(map.pop(&key).is_some());
            }
        });
        handles.push(handle);
    }

    // Spawn readers
    for _ in 0..5 {
        let map = Arc::clone(&map);
        let handle = thread::spawn(move || {
            for _ in 0..200 {
                for i in 0..10 {
                    let key = format!("key_{}_{}", i % 5, i);
                    map.get(&key); // May or may not exist, that's ok
                }
                let _ = map.len();
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Quiescent: count is exactly inserted minus removed
    assert_eq!(map.len(), 5 * 50);
}

#[test]
fn test_clear_group_while_writing() {
    let map: Arc<ShardMap<u32, u32>> = Arc::new(
        ShardMapBuilder::new()
            .group_count(4)
            .unwrap()
            .replica_count(2)
            .unwrap()
            .hasher(|k: &u32| *k)
            .build()
            .unwrap(),
    );

    // Writers only touch group 0 (k % 4 == 0) and group 2.
    let writers: Vec<_> = [0u32, 2]
        .into_iter()
        .map(|group| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..500 {
                    map.insert(i * 4 + group, i);
                }
            })
        })
        .collect();

    let clearer = {
        let map = Arc::clone(&map);
        thread::spawn(move || {
            for _ in 0..50 {
                map.clear_group(0).unwrap();
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    clearer.join().unwrap();

    // Group 2 was never cleared, so none of its writes are lost.
    assert_eq!(map.stats().group_sizes()[2], 500);
    assert_eq!(map.stats().group_sizes()[1], 0);
}
