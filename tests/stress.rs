use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use paste::paste;
use stripemap::{Builder, HashMap};

const ITERATIONS: i32 = 100_000;

fn spin_read(map: &HashMap<i32, String>, key: i32) -> String {
    loop {
        if let Some(value) = map.get(&key) {
            return value;
        }
    }
}

// Two readers spin on disjoint key ranges until the values written by
// three concurrent writers appear; every observed value must match the
// writer's pattern for that range exactly.
macro_rules! generate_parallel_write_read_test {
    ($name:ident, $map_init:expr) => {
        paste! {
            #[test]
            fn [<parallel_write_read_values_ $name>]() {
                let map: Arc<HashMap<i32, String>> = Arc::new($map_init);

                let reader_a = {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..ITERATIONS {
                            let value = spin_read(&map, i);
                            assert_eq!(value, format!("AAAAAAA = {i}"));
                        }
                    })
                };

                let reader_b = {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..ITERATIONS {
                            let key = i + ITERATIONS;
                            let value = spin_read(&map, key);
                            assert_eq!(value, format!("BBBBBBB = {key}"));
                        }
                    })
                };

                let writers: Vec<_> = [("AAAAAAA", 0), ("BBBBBBB", 1), ("CCCCCCC", 2)]
                    .into_iter()
                    .map(|(pattern, range)| {
                        let map = Arc::clone(&map);
                        thread::spawn(move || {
                            for i in 0..ITERATIONS {
                                let key = i + range * ITERATIONS;
                                map.insert(key, format!("{pattern} = {key}"));
                            }
                        })
                    })
                    .collect();

                reader_a.join().expect("reader A failed");
                reader_b.join().expect("reader B failed");
                for writer in writers {
                    writer.join().expect("writer failed");
                }
            }
        }
    };
}

generate_parallel_write_read_test!(growing_shards, HashMap::new(64, 256));
generate_parallel_write_read_test!(
    fixed_shards,
    Builder::new()
        .num_shards(256)
        .initial_capacity(256)
        .grow_shards_on_resize(false)
        .build()
);

// One reader spins on each key in order while a writer keeps
// re-inserting the range and removing twenty keys behind its cursor.
// Every key must still be observed with its expected value at least
// once.
#[test]
fn parallel_write_remove_read_values() {
    let map: Arc<HashMap<i32, String>> = Arc::new(HashMap::new(64, 256));
    let reader_done = Arc::new(AtomicBool::new(false));

    let reader = {
        let map = Arc::clone(&map);
        let reader_done = Arc::clone(&reader_done);
        thread::spawn(move || {
            for i in 0..ITERATIONS {
                let value = spin_read(&map, i);
                assert_eq!(value, format!("AAAAAAA = {i}"));
            }
            reader_done.store(true, Ordering::Relaxed);
        })
    };

    let writer = {
        let map = Arc::clone(&map);
        let reader_done = Arc::clone(&reader_done);
        thread::spawn(move || {
            while !reader_done.load(Ordering::Relaxed) {
                for i in 0..ITERATIONS {
                    map.insert(i, format!("AAAAAAA = {i}"));
                    // Keys below zero were never inserted; removing them
                    // is a no-op, as in the steady state.
                    map.remove(&(i - 20));
                }
            }
        })
    };

    reader.join().expect("reader failed");
    writer.join().expect("writer failed");
}

#[test]
fn distinct_ranges_keep_every_write() {
    let num_writers = 4;
    let keys_per_writer = 25_000;
    let map: Arc<HashMap<i32, i32>> = Arc::new(HashMap::new(16, 64));

    let writers: Vec<_> = (0..num_writers)
        .map(|w| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..keys_per_writer {
                    let key = w * keys_per_writer + i;
                    map.insert(key, w);
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().expect("writer failed");
    }

    assert_eq!(map.len(), (num_writers * keys_per_writer) as usize);
    for w in 0..num_writers {
        for i in 0..keys_per_writer {
            assert_eq!(map.get(&(w * keys_per_writer + i)), Some(w));
        }
    }
}

// Mixed churn over a small key space: heavy same-shard contention plus
// repeated resizes, checked only for termination and sane bookkeeping.
#[test]
fn mixed_churn_terminates() {
    let num_threads = 8;
    let key_space = 512;
    let map: Arc<HashMap<i32, i32>> = Arc::new(HashMap::new(2, 2));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..50_000 {
                    let key = (i * (t + 1)) % key_space;
                    match i % 3 {
                        0 => {
                            map.insert(key, t);
                        }
                        1 => {
                            map.get(&key);
                        }
                        _ => {
                            map.remove(&key);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("churn thread failed");
    }

    assert!(map.len() <= key_space as usize);
    for key in 0..key_space {
        if let Some(value) = map.get(&key) {
            assert!((0..num_threads).contains(&value));
        }
    }
}
