//! Benchmarks for ColumnProfiler and join suggestion performance.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use joinery::analyzers::{ColumnProfiler, JoinSuggestionEngine};
use joinery::core::{Scalar, TabularDataset};
use std::time::Duration;

const CITIES: [&str; 6] = ["Oslo", "Bergen", "Lima", "Quito", "Perth", "Lagos"];

fn customers(rows: usize) -> TabularDataset {
    TabularDataset::from_values(
        &["id", "email", "city", "signed_up", "score", "notes"],
        (0..rows)
            .map(|i| {
                vec![
                    Scalar::Int(i as i64),
                    Scalar::from(format!("user{}@example.com", i % 500)),
                    Scalar::from(CITIES[i % CITIES.len()]),
                    Scalar::from(format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1)),
                    Scalar::Float((i % 97) as f64 * 1.5),
                    if i % 10 == 0 {
                        Scalar::Null
                    } else {
                        Scalar::from(format!("free text note number {}", i % 300))
                    },
                ]
            })
            .collect(),
    )
}

fn orders(rows: usize) -> TabularDataset {
    TabularDataset::from_values(
        &["order_no", "customer_id", "total"],
        (0..rows)
            .map(|i| {
                vec![
                    Scalar::Int(i as i64),
                    Scalar::Int((i % 1000) as i64),
                    Scalar::Float(i as f64 * 0.25),
                ]
            })
            .collect(),
    )
}

fn bench_profile_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile_dataset");
    group.measurement_time(Duration::from_secs(8));

    for rows in [1_000, 10_000, 50_000] {
        let dataset = customers(rows);
        let profiler = ColumnProfiler::new();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &dataset, |b, dataset| {
            b.iter(|| profiler.profile_dataset(black_box(dataset), None));
        });
    }

    group.finish();
}

fn bench_profiler_configurations(c: &mut Criterion) {
    let mut group = c.benchmark_group("profiler_configurations");
    let dataset = customers(10_000);

    let configs = vec![
        ("default", ColumnProfiler::new()),
        ("small_sample", ColumnProfiler::builder().sample_size(1).build()),
        (
            "strict_patterns",
            ColumnProfiler::builder().pattern_threshold(0.99).build(),
        ),
    ];

    for (name, profiler) in configs {
        group.bench_with_input(BenchmarkId::new("config", name), &dataset, |b, dataset| {
            b.iter(|| profiler.profile_dataset(black_box(dataset), None));
        });
    }

    group.finish();
}

fn bench_join_suggestions(c: &mut Criterion) {
    let profiler = ColumnProfiler::new();
    let left = profiler.profile_dataset(&customers(2_000), None);
    let right = profiler.profile_dataset(&orders(2_000), None);
    let engine = JoinSuggestionEngine::new();

    c.bench_function("suggest_customers_orders", |b| {
        b.iter(|| {
            engine.suggest(
                black_box(&left),
                black_box(&right),
                Some("customers"),
                Some("orders"),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_profile_dataset,
    bench_profiler_configurations,
    bench_join_suggestions
);
criterion_main!(benches);
