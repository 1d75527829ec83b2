//! Recall quality validation for the HNSW index.
//!
//! Ground truth comes from a brute-force scan over the same vectors with
//! the same metric, so these tests measure graph quality only.
//!
//! # Recall Definition
//!
//! Recall@k = |retrieved ∩ ground_truth| / k
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test recall_validation -- --nocapture
//! ```

use navgraph_core::{Index, IndexConfig, MetricKind, ScalarKind};
use std::collections::HashSet;

/// Compute recall@k between retrieved results and ground truth.
#[allow(clippy::cast_precision_loss)]
fn compute_recall(retrieved: &[u64], ground_truth: &[u64], k: usize) -> f64 {
    let k = k.min(retrieved.len()).min(ground_truth.len());
    if k == 0 {
        return 0.0;
    }

    let retrieved_set: HashSet<_> = retrieved.iter().take(k).collect();
    let ground_truth_set: HashSet<_> = ground_truth.iter().take(k).collect();

    let intersection = retrieved_set.intersection(&ground_truth_set).count();
    intersection as f64 / k as f64
}

/// Deterministic vectors in [-1, 1).
#[allow(clippy::cast_precision_loss)]
fn generate_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut x = seed;
    (0..count)
        .map(|_| {
            (0..dim)
                .map(|_| {
                    x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                    ((x >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
                })
                .collect()
        })
        .collect()
}

fn l2sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        1.0 - dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Brute-force top-k labels (label = position in `vectors`).
fn ground_truth(
    vectors: &[Vec<f32>],
    query: &[f32],
    k: usize,
    distance: fn(&[f32], &[f32]) -> f32,
) -> Vec<u64> {
    let mut scored: Vec<(u64, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u64, distance(query, v)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.into_iter().take(k).map(|(label, _)| label).collect()
}

fn average_recall(
    metric: MetricKind,
    distance: fn(&[f32], &[f32]) -> f32,
    count: usize,
    dim: usize,
    k: usize,
) -> f64 {
    let vectors = generate_vectors(count, dim, 42);
    let queries = generate_vectors(50, dim, 4242);
    let index = Index::create(
        IndexConfig::new(metric, ScalarKind::F32, dim)
            .with_capacity(count)
            .with_expansion(128, 128),
    )
    .expect("create");
    for (i, v) in vectors.iter().enumerate() {
        index.add(i as u64, v).expect("add");
    }

    let total: f64 = queries
        .iter()
        .map(|q| {
            let hits: Vec<u64> = index
                .search(q, k)
                .expect("search")
                .iter()
                .map(|h| h.label)
                .collect();
            compute_recall(&hits, &ground_truth(&vectors, q, k, distance), k)
        })
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let avg = total / queries.len() as f64;
    println!("{metric} recall@{k} on {count}x{dim}: {avg:.3}");
    avg
}

#[test]
fn test_compute_recall_helper() {
    assert!((compute_recall(&[1, 2, 3], &[3, 2, 1], 3) - 1.0).abs() < f64::EPSILON);
    assert!((compute_recall(&[1, 5], &[1, 2], 2) - 0.5).abs() < f64::EPSILON);
    assert!(compute_recall(&[], &[1], 1).abs() < f64::EPSILON);
}

#[test]
fn test_recall_l2sq_at_10() {
    let recall = average_recall(MetricKind::L2sq, l2sq, 1000, 32, 10);
    assert!(recall >= 0.9, "recall@10 too low: {recall:.3}");
}

#[test]
fn test_recall_cosine_at_10() {
    let recall = average_recall(MetricKind::Cos, cosine_distance, 1000, 32, 10);
    assert!(recall >= 0.9, "recall@10 too low: {recall:.3}");
}

#[test]
fn test_exact_on_tiny_index() {
    // With ef above the node count the beam covers the whole graph.
    let recall = average_recall(MetricKind::L2sq, l2sq, 60, 8, 5);
    assert!(recall >= 0.99, "recall@5: {recall:.3}");
}
