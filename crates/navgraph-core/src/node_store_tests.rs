//! Tests for `node_store` module

use super::node_store::*;
use crate::error::Error;
use std::collections::HashSet;

fn node(label: u64, level: usize) -> Node {
    Node::new(label, level, vec![label as u8; 4].into_boxed_slice())
}

#[test]
fn test_new_store_has_capacity_and_no_nodes() {
    let store = NodeStore::with_capacity(3).expect("store");
    assert_eq!(store.capacity(), 3);
    assert_eq!(store.allocated(), 0);
    assert!(!store.is_mapped());
    assert!(store.vector(0).is_none());
}

#[test]
fn test_push_assigns_sequential_ids() {
    let store = NodeStore::with_capacity(3).expect("store");

    assert_eq!(store.push(node(10, 0)).ok(), Some(0));
    assert_eq!(store.push(node(11, 2)).ok(), Some(1));

    assert_eq!(store.allocated(), 2);
    assert_eq!(store.label(1), Some(11));
    assert_eq!(store.level(1), Some(2));
    assert_eq!(store.vector(1), Some(&[11u8; 4][..]));
}

#[test]
fn test_push_beyond_capacity_fails() {
    // Arrange
    let store = NodeStore::with_capacity(1).expect("store");
    store.push(node(1, 0)).expect("first");

    // Act
    let err = store.push(node(2, 0)).unwrap_err();

    // Assert
    assert!(matches!(err, Error::CapacityExceeded { capacity: 1 }));
    assert_eq!(store.allocated(), 1);
}

#[test]
fn test_reserve_grows_and_never_shrinks() {
    let mut store = NodeStore::with_capacity(1).expect("store");
    store.push(node(1, 0)).expect("push");

    store.reserve(4).expect("grow");
    assert_eq!(store.capacity(), 4);
    store.reserve(2).expect("no-op");
    assert_eq!(store.capacity(), 4);

    // existing node survives the reallocation
    assert_eq!(store.label(0), Some(1));
    assert_eq!(store.push(node(2, 0)).ok(), Some(1));
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_reserve_beyond_id_width_fails() {
    let mut store = NodeStore::with_capacity(0).expect("store");
    let err = store
        .reserve(crate::config::MAX_CAPACITY + 1)
        .unwrap_err();
    assert!(matches!(err, Error::AllocationFailure(_)));
}

#[test]
fn test_neighbors_follow_links() {
    let store = NodeStore::with_capacity(3).expect("store");
    let a = store.push(node(1, 1)).expect("a");
    let b = store.push(node(2, 0)).expect("b");

    store
        .links(a, 0)
        .expect("layer 0")
        .write()
        .extend([b]);
    store.links(a, 1).expect("layer 1").write().push(b);

    let mut out = vec![99];
    store.neighbors(a, 0, &mut out);
    assert_eq!(out, vec![b]);
    store.neighbors(a, 1, &mut out);
    assert_eq!(out, vec![b]);

    // b does not reach layer 1
    store.neighbors(b, 1, &mut out);
    assert!(out.is_empty());
    assert!(store.links(b, 1).is_none());
}

#[test]
fn test_from_nodes_keeps_order_and_links() {
    let nodes = vec![
        Node::with_links(5, vec![0u8; 4].into_boxed_slice(), vec![vec![1]]),
        Node::with_links(6, vec![1u8; 4].into_boxed_slice(), vec![vec![0], vec![]]),
    ];

    let store = NodeStore::from_nodes(nodes, 1).expect("store");

    assert_eq!(store.capacity(), 2, "capacity grows to fit the nodes");
    assert_eq!(store.allocated(), 2);
    assert_eq!(store.label(1), Some(6));
    assert_eq!(store.level(1), Some(1));
    let mut out = Vec::new();
    store.neighbors(0, 0, &mut out);
    assert_eq!(out, vec![1]);
}

#[test]
fn test_node_without_links_gets_layer_zero() {
    let node = Node::with_links(1, Vec::new().into_boxed_slice(), Vec::new());
    assert_eq!(node.level(), 0);
}

#[test]
fn test_concurrent_push_hands_out_unique_ids() {
    let store = NodeStore::with_capacity(400).expect("store");

    let ids: Vec<NodeId> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let store = &store;
                s.spawn(move || {
                    (0..100u64)
                        .map(|i| store.push(node(t * 100 + i, 0)).expect("push"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread"))
            .collect()
    });

    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 400);
    assert!(store.push(node(0, 0)).is_err());
}
