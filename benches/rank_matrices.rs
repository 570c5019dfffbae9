//! Benchmarks for rank-matrix materialization.
//!
//! Measures:
//! - Cold registry: rule matrices, exact inverses and lifted operators
//! - Warm registry: cache hits only
//! - Product change of basis at growing gradings

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rankmat::prelude::*;

/// `CC -> CC + D`, so the inverses are not trivially the identity.
fn shearing_rule() -> TableRule {
    let cc: Word = "CC".parse().unwrap();
    let d: Word = "D".parse().unwrap();
    TableRule::new().with(cc.clone(), [cc, d].into_iter().collect())
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    group.sample_size(10); // smaller sample for speed

    for top in [6usize, 9, 12] {
        group.bench_function(BenchmarkId::new("c_rule", top), |b| {
            b.iter(|| {
                let matrices = RankMatrices::new(shearing_rule(), Collaborators::concatenation());
                black_box(matrices.c_rule().get(top).unwrap())
            })
        });
    }

    let matrices = RankMatrices::new(shearing_rule(), Collaborators::concatenation());
    matrices.d_rule().get(10).unwrap();
    group.bench_function(BenchmarkId::new("d_rule", "warm"), |b| {
        b.iter(|| black_box(matrices.d_rule().get(10).unwrap()))
    });

    group.finish();
}

fn bench_products(c: &mut Criterion) {
    let mut group = c.benchmark_group("doit");
    group.sample_size(10);

    let matrices = RankMatrices::new(shearing_rule(), Collaborators::concatenation());
    for (n, m) in [(2usize, 2usize), (3, 3), (4, 4), (5, 5)] {
        group.bench_function(BenchmarkId::new("product_stats", format!("{}x{}", n, m)), |b| {
            b.iter(|| black_box(matrices.product_stats(n, m).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_materialize, bench_products);
criterion_main!(benches);
