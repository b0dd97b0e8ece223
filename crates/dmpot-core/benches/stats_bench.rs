use criterion::{criterion_group, criterion_main, Criterion};
use dmpot_core::stats::compute_stats;
use std::hint::black_box;

fn bench_compute_stats(c: &mut Criterion) {
    // Roughly a 30-year daily record.
    let n = 11_000;
    let obs: Vec<f64> = (0..n).map(|i| 5.0 + (i as f64 * 0.01).sin() * 3.0).collect();
    let sim: Vec<f64> = (0..n)
        .map(|i| 4.8 + (i as f64 * 0.01 + 0.2).sin() * 3.1)
        .collect();

    c.bench_function("compute_stats_daily_30y", |b| {
        b.iter(|| compute_stats(black_box(&obs), black_box(&sim)))
    });
}

criterion_group!(benches, bench_compute_stats);
criterion_main!(benches);
