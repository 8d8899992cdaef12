mod common;

use std::sync::Arc;
use std::thread;

use common::TestContext;
use pyrite::concurrency::transaction::Transaction;
use pyrite::container::hash_function::{HashFunction, KeyHasher};
use pyrite::container::linear_probe_hash_table::LinearProbeHashTable;
use pyrite::storage::index::int_comparator::IntComparator;
use pyrite::storage::page::page_types::hash_table_page_defs::block_array_size;

/// Places every non-negative key at slot `key % capacity`, so tests can
/// construct probe chains deliberately.
struct IdentityHasher;

impl KeyHasher<i32> for IdentityHasher {
    fn get_hash(&self, key: &i32) -> u64 {
        *key as u64
    }
}

#[test]
fn insert_and_lookup() {
    let ctx = TestContext::new("insert_and_lookup", 10);
    let table = LinearProbeHashTable::new(
        "insert_and_lookup",
        ctx.bpm.clone(),
        IntComparator::new(),
        4,
        HashFunction::<i32>::new(),
    );
    let txn = Transaction::new(0);

    let num_keys = 500;
    for i in 0..num_keys {
        assert!(table.insert(&txn, &i, &(i * 10)));
        let mut res = vec![];
        assert!(table.get_value(&txn, &i, &mut res));
        assert_eq!(res, vec![i * 10]);
    }

    // Still all present after the fact.
    for i in 0..num_keys {
        let mut res = vec![];
        assert!(table.get_value(&txn, &i, &mut res));
        assert_eq!(res, vec![i * 10]);
    }

    let mut res = vec![];
    assert!(!table.get_value(&txn, &(num_keys + 1), &mut res));
    assert!(res.is_empty());
}

#[test]
fn duplicate_pairs_are_rejected() {
    let ctx = TestContext::new("duplicates", 10);
    let table = LinearProbeHashTable::new(
        "duplicates",
        ctx.bpm.clone(),
        IntComparator::new(),
        2,
        HashFunction::<i32>::new(),
    );
    let txn = Transaction::new(0);

    assert!(table.insert(&txn, &5, &50));
    assert!(!table.insert(&txn, &5, &50));
    // Same key, distinct value: allowed.
    assert!(table.insert(&txn, &5, &51));

    let mut res = vec![];
    assert!(table.get_value(&txn, &5, &mut res));
    res.sort();
    assert_eq!(res, vec![50, 51]);
}

#[test]
fn colliding_keys_probe_linearly() {
    let ctx = TestContext::new("collisions", 10);
    let table: LinearProbeHashTable<i32, i32, IntComparator, HashFunction<i32>> =
        LinearProbeHashTable::new(
            "collisions",
            ctx.bpm.clone(),
            IntComparator::new(),
            2,
            HashFunction::<i32>::new(),
        );
    let txn = Transaction::new(0);
    let capacity = table.get_size() as i32;
    assert_eq!(capacity as usize, 2 * block_array_size::<i32, i32>());

    // Recreate the table with a deterministic hasher so all three keys land
    // on the same starting slot and chain from there.
    let table = LinearProbeHashTable::new(
        "collisions_identity",
        ctx.bpm.clone(),
        IntComparator::new(),
        2,
        IdentityHasher,
    );
    let colliding = [5, 5 + capacity, 5 + 2 * capacity];
    for &key in &colliding {
        assert!(table.insert(&txn, &key, &(key * 10)));
    }

    // Each probe walks the shared chain but only reports its own key.
    for &key in &colliding {
        let mut res = vec![];
        assert!(table.get_value(&txn, &key, &mut res));
        assert_eq!(res, vec![key * 10]);
    }
}

#[test]
fn probe_wraps_around_the_slot_space() {
    let ctx = TestContext::new("wraparound", 10);
    let table = LinearProbeHashTable::new(
        "wraparound",
        ctx.bpm.clone(),
        IntComparator::new(),
        2,
        IdentityHasher,
    );
    let txn = Transaction::new(0);
    let capacity = table.get_size() as i32;

    // Last logical slot, then a collider that has to wrap to slot 0 of the
    // first block.
    let last = capacity - 1;
    let collider = last + capacity;
    assert!(table.insert(&txn, &last, &1));
    assert!(table.insert(&txn, &collider, &2));

    let mut res = vec![];
    assert!(table.get_value(&txn, &collider, &mut res));
    assert_eq!(res, vec![2]);
}

#[test]
fn remove_tombstones_and_reclaims() {
    let ctx = TestContext::new("tombstones", 10);
    let table = LinearProbeHashTable::new(
        "tombstones",
        ctx.bpm.clone(),
        IntComparator::new(),
        2,
        IdentityHasher,
    );
    let txn = Transaction::new(0);
    let capacity = table.get_size() as i32;

    assert!(table.insert(&txn, &1, &10));
    assert!(table.insert(&txn, &(1 + capacity), &20));

    // Removing the head of the chain must not cut off the collider behind it.
    assert!(table.remove(&txn, &1, &10));
    let mut res = vec![];
    assert!(!table.get_value(&txn, &1, &mut res));
    let mut res = vec![];
    assert!(table.get_value(&txn, &(1 + capacity), &mut res));
    assert_eq!(res, vec![20]);

    // A second remove of the same pair hits the tombstone and fails.
    assert!(!table.remove(&txn, &1, &10));
    // Removing a pair that was never there fails too.
    assert!(!table.remove(&txn, &99, &990));
    assert!(!table.remove(&txn, &(1 + capacity), &999));

    // The tombstone is reclaimable.
    assert!(table.insert(&txn, &1, &11));
    let mut res = vec![];
    assert!(table.get_value(&txn, &1, &mut res));
    assert_eq!(res, vec![11]);
}

#[test]
fn full_table_resizes_automatically() {
    let ctx = TestContext::new("auto_resize", 10);
    let table = LinearProbeHashTable::new(
        "auto_resize",
        ctx.bpm.clone(),
        IntComparator::new(),
        1,
        IdentityHasher,
    );
    let txn = Transaction::new(0);
    let capacity = table.get_size() as i32;
    assert_eq!(capacity as usize, block_array_size::<i32, i32>());

    // Fill every slot, then one more: the last insert has to grow the table.
    for i in 0..=capacity {
        assert!(table.insert(&txn, &i, &(i * 2)));
    }
    assert!(table.get_size() >= 2 * capacity as usize);

    for i in 0..=capacity {
        let mut res = vec![];
        assert!(table.get_value(&txn, &i, &mut res));
        assert_eq!(res, vec![i * 2]);
    }
}

#[test]
fn explicit_resize_preserves_all_pairs() {
    let ctx = TestContext::new("resize_preserves", 10);
    let table = LinearProbeHashTable::new(
        "resize_preserves",
        ctx.bpm.clone(),
        IntComparator::new(),
        1,
        HashFunction::<i32>::new(),
    );
    let txn = Transaction::new(0);

    for i in 0..50 {
        assert!(table.insert(&txn, &i, &i));
    }
    assert!(table.insert(&txn, &7, &70));

    let old_size = table.get_size();
    table.resize(old_size);
    assert_eq!(table.get_size(), 2 * old_size);

    for i in 0..50 {
        let mut res = vec![];
        assert!(table.get_value(&txn, &i, &mut res));
        if i == 7 {
            res.sort();
            assert_eq!(res, vec![7, 70]);
        } else {
            assert_eq!(res, vec![i]);
        }
    }

    // Duplicate detection still works against the rebuilt table.
    assert!(!table.insert(&txn, &7, &70));
}

#[test]
fn concurrent_inserts_from_disjoint_ranges() {
    let ctx = TestContext::new("concurrent_inserts", 32);
    let table = Arc::new(LinearProbeHashTable::new(
        "concurrent_inserts",
        ctx.bpm.clone(),
        IntComparator::new(),
        8,
        HashFunction::<i32>::new(),
    ));

    let num_threads = 4;
    let keys_per_thread = 200;
    let mut handles = vec![];
    for t in 0..num_threads {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let txn = Transaction::new(t as u64);
            let base = t * 1000;
            for i in 0..keys_per_thread {
                let key = base + i;
                assert!(table.insert(&txn, &key, &(key * 10)));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let txn = Transaction::new(99);
    for t in 0..num_threads {
        let base = t * 1000;
        for i in 0..keys_per_thread {
            let key = base + i;
            let mut res = vec![];
            assert!(table.get_value(&txn, &key, &mut res));
            assert_eq!(res, vec![key * 10]);
        }
    }
}

#[test]
fn concurrent_readers_and_removers() {
    let ctx = TestContext::new("concurrent_mixed", 32);
    let table = Arc::new(LinearProbeHashTable::new(
        "concurrent_mixed",
        ctx.bpm.clone(),
        IntComparator::new(),
        8,
        HashFunction::<i32>::new(),
    ));

    let txn = Transaction::new(0);
    for i in 0..400 {
        assert!(table.insert(&txn, &i, &i));
    }

    let mut handles = vec![];
    // Two removers split the even keys between them.
    for t in 0..2 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let txn = Transaction::new(t as u64 + 1);
            let mut start = t * 2;
            while start < 400 {
                assert!(table.remove(&txn, &(start as i32), &(start as i32)));
                start += 4;
            }
        }));
    }
    // Two readers watch odd keys, which nobody removes.
    for t in 0..2 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let txn = Transaction::new(t as u64 + 3);
            for round in 0..10 {
                for key in (1..400).step_by(2) {
                    let mut res = vec![];
                    assert!(table.get_value(&txn, &key, &mut res), "round {round}");
                    assert_eq!(res, vec![key]);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let txn = Transaction::new(9);
    for key in (0..400).step_by(2) {
        let mut res = vec![];
        assert!(!table.get_value(&txn, &key, &mut res));
    }
}
