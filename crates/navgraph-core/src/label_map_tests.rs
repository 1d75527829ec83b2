//! Tests for `label_map` module

use super::label_map::*;
use crate::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

// -------------------------------------------------------------------------
// Basic functionality tests
// -------------------------------------------------------------------------

#[test]
fn test_label_map_new_is_empty() {
    let map = LabelMap::new();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
}

#[test]
fn test_label_map_insert_and_lookup() {
    // Arrange
    let map = LabelMap::new();

    // Act
    map.insert(42, 7).expect("insert");

    // Assert
    assert_eq!(map.lookup(42).ok(), Some(7));
    assert_eq!(map.label_of(7), Some(42));
    assert!(map.contains(42));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_label_map_duplicate_insert_fails() {
    let map = LabelMap::new();
    map.insert(42, 0).expect("first insert");

    let err = map.insert(42, 1).unwrap_err();

    assert!(matches!(err, Error::DuplicateLabel(42)));
    assert_eq!(map.lookup(42).ok(), Some(0));
    assert_eq!(map.label_of(1), None);
}

#[test]
fn test_label_map_lookup_missing_is_not_found() {
    let map = LabelMap::new();
    assert!(matches!(map.lookup(5), Err(Error::NotFound(5))));
}

#[test]
fn test_label_map_remove_drops_both_directions() {
    let map = LabelMap::new();
    map.insert(1, 10).expect("insert");

    let id = map.remove(1).expect("remove");

    assert_eq!(id, 10);
    assert!(!map.contains(1));
    assert_eq!(map.label_of(10), None);
    assert!(matches!(map.remove(1), Err(Error::NotFound(1))));
}

#[test]
fn test_label_map_label_can_return_after_remove() {
    let map = LabelMap::new();
    map.insert(1, 0).expect("insert");
    map.remove(1).expect("remove");

    map.insert(1, 5).expect("reinsert");

    assert_eq!(map.lookup(1).ok(), Some(5));
    assert_eq!(map.label_of(0), None);
}

#[test]
fn test_label_map_register_skips_allocation_for_duplicates() {
    let map = LabelMap::new();
    let calls = AtomicUsize::new(0);
    let allocate = || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(3)
    };

    map.register(9, allocate).expect("first register");
    let second = map.register(9, || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(4)
    });

    assert!(matches!(second, Err(Error::DuplicateLabel(9))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_label_map_register_propagates_allocation_error() {
    let map = LabelMap::new();

    let result = map.register(1, || Err(Error::CapacityExceeded { capacity: 0 }));

    assert!(matches!(result, Err(Error::CapacityExceeded { capacity: 0 })));
    assert!(!map.contains(1));
}

#[test]
fn test_label_map_from_pairs_rejects_duplicates() {
    assert!(LabelMap::from_pairs([(1, 0), (2, 1)]).is_ok());
    assert!(matches!(
        LabelMap::from_pairs([(1, 0), (1, 1)]),
        Err(Error::DuplicateLabel(1))
    ));
}

#[test]
fn test_label_map_clear() {
    let map = LabelMap::from_pairs([(1, 0), (2, 1)]).expect("build");
    map.clear();
    assert!(map.is_empty());
    assert_eq!(map.label_of(0), None);
}

// -------------------------------------------------------------------------
// Concurrency tests
// -------------------------------------------------------------------------

#[test]
fn test_label_map_concurrent_same_label_single_winner() {
    // Arrange
    let map = Arc::new(LabelMap::new());
    let next = Arc::new(AtomicUsize::new(0));

    // Act
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let map = Arc::clone(&map);
            let next = Arc::clone(&next);
            thread::spawn(move || {
                map.register(77, || Ok(next.fetch_add(1, Ordering::SeqCst)))
                    .is_ok()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .filter(|won| *won)
        .count();

    // Assert
    assert_eq!(winners, 1);
    assert_eq!(next.load(Ordering::SeqCst), 1);
    assert_eq!(map.len(), 1);
}

#[test]
fn test_label_map_concurrent_distinct_labels() {
    let map = Arc::new(LabelMap::new());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..250u64 {
                    let label = t * 1000 + i;
                    map.insert(label, label as usize).expect("insert");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("thread");
    }

    assert_eq!(map.len(), 1000);
    assert_eq!(map.lookup(3249).ok(), Some(3249));
}
