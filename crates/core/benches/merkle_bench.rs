//! Merkle kernel performance benchmarks.
//!
//! Measures root-only computation versus full-tree construction across
//! batch sizes representative of a sealer pass.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use originseal_core::merkle::{build_merkle_tree, compute_merkle_root, with_prefix};
use sha2::{Digest, Sha256};

fn leaf(index: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("leaf-{index}").as_bytes());
    with_prefix(&hex::encode(hasher.finalize()))
}

fn leaves(count: u64) -> Vec<String> {
    (0..count).map(leaf).collect()
}

fn bench_compute_merkle_root(c: &mut Criterion) {
    for size in [1, 10, 100, 1_000, 10_000] {
        let batch = leaves(size);
        c.bench_with_input(BenchmarkId::new("compute_merkle_root", size), &batch, |b, batch| {
            b.iter(|| black_box(compute_merkle_root(batch).unwrap()));
        });
    }
}

fn bench_build_merkle_tree(c: &mut Criterion) {
    for size in [1, 10, 100, 1_000, 10_000] {
        let batch = leaves(size);
        c.bench_with_input(BenchmarkId::new("build_merkle_tree", size), &batch, |b, batch| {
            b.iter(|| black_box(build_merkle_tree(batch).unwrap()));
        });
    }
}

criterion_group!(benches, bench_compute_merkle_root, bench_build_merkle_tree);
criterion_main!(benches);
