//! Benchmarks for the in-memory hash join.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use joinery::core::{Scalar, TabularDataset};
use joinery::join::{hash_join, JoinOptions, JoinType};

fn keyed(rows: usize, as_strings: bool) -> TabularDataset {
    TabularDataset::from_values(
        &["id", "value"],
        (0..rows)
            .map(|i| {
                let key = if as_strings {
                    Scalar::from(i.to_string())
                } else {
                    Scalar::Int(i as i64)
                };
                vec![key, Scalar::Float(i as f64)]
            })
            .collect(),
    )
}

fn bench_join_types(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_join_types");
    let left = keyed(10_000, false);
    let right = keyed(8_000, false);

    for how in [JoinType::Inner, JoinType::Left, JoinType::Right, JoinType::Outer] {
        let options = JoinOptions::new("id").how(how);
        group.bench_with_input(BenchmarkId::from_parameter(how), &options, |b, options| {
            b.iter(|| hash_join(black_box(&left), black_box(&right), options));
        });
    }

    group.finish();
}

fn bench_join_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_join_sizes");

    for rows in [1_000, 10_000, 100_000] {
        let left = keyed(rows, false);
        let right = keyed(rows, false);
        let options = JoinOptions::new("id");
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| hash_join(black_box(&left), black_box(&right), &options));
        });
    }

    group.finish();
}

fn bench_coerced_keys(c: &mut Criterion) {
    let left = keyed(10_000, false);
    let right = keyed(10_000, true);
    let options = JoinOptions::new("id");

    c.bench_function("hash_join_int_to_string_keys", |b| {
        b.iter(|| hash_join(black_box(&left), black_box(&right), &options));
    });
}

criterion_group!(benches, bench_join_types, bench_join_sizes, bench_coerced_keys);
criterion_main!(benches);
