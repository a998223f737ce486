//! Benchmarks for KNN imputation, single-family grid search and the KS drift test
//!
//! Run with: cargo bench --bench training_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use faer::Mat;
use rand::prelude::*;
use rand::SeedableRng;

use phishguard::ml::{GridSearch, ImputerWeights, KnnImputer, ModelFamily};
use phishguard::pipeline::ks_2samp;

/// Discrete {-1, 0, 1} features with a label driven by the first two columns.
/// Every 13th cell of column 1 is missing.
fn generate_features(n_rows: usize, n_features: usize, seed: u64) -> (Mat<f64>, Vec<f64>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let cells: Vec<f64> = (0..n_rows * n_features)
        .map(|_| rng.gen_range(-1i32..=1) as f64)
        .collect();
    let x = Mat::from_fn(n_rows, n_features, |i, j| {
        if j == 1 && i % 13 == 0 {
            f64::NAN
        } else {
            cells[i * n_features + j]
        }
    });
    let y = (0..n_rows)
        .map(|i| if cells[i * n_features] + cells[i * n_features + 1] >= 0.0 { 1.0 } else { 0.0 })
        .collect();
    (x, y)
}

fn feature_names(n: usize) -> Vec<String> {
    (0..n).map(|j| format!("feature_{}", j)).collect()
}

fn benchmark_imputation(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_imputation");

    for n_rows in [500, 2_000, 5_000] {
        let (x, _) = generate_features(n_rows, 30, 42);
        let names = feature_names(30);
        group.throughput(Throughput::Elements(n_rows as u64));

        group.bench_with_input(BenchmarkId::new("fit_transform", n_rows), &x, |b, x| {
            b.iter(|| {
                let mut imputer = KnnImputer::new(3, ImputerWeights::Uniform);
                black_box(imputer.fit_transform(black_box(x), &names).ok())
            })
        });
    }

    group.finish();
}

fn benchmark_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let (x, y) = generate_features(1_000, 30, 7);
    let x = Mat::from_fn(x.nrows(), x.ncols(), |i, j| if x[(i, j)].is_nan() { 0.0 } else { x[(i, j)] });

    for family in [
        ModelFamily::DecisionTree,
        ModelFamily::LogisticRegression,
        ModelFamily::KNearestNeighbors,
    ] {
        group.bench_with_input(BenchmarkId::new("search", family.name()), &family, |b, &family| {
            b.iter(|| black_box(GridSearch::new(family, 3, 42).search(black_box(&x), &y).ok()))
        });
    }

    group.finish();
}

fn benchmark_ks_test(c: &mut Criterion) {
    let mut group = c.benchmark_group("ks_2samp");

    for n in [1_000, 10_000, 100_000] {
        let mut rng = rand::rngs::StdRng::seed_from_u64(n as u64);
        let a: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
        let b: Vec<f64> = (0..n / 4).map(|_| rng.gen::<f64>() * 1.1).collect();
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("continuous", n), &(a, b), |bench, (a, b)| {
            bench.iter(|| black_box(ks_2samp(black_box(a), black_box(b))))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_imputation, benchmark_grid_search, benchmark_ks_test);
criterion_main!(benches);
