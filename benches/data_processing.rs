//! Benchmarks for the numeric core
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use derived_tlm::analysis::filter::median_filter;
use derived_tlm::analysis::{aggregate, nearest_union, reconcile, AlignTimes, WeightClamp};
use derived_tlm::SampleStream;

/// One day-scale stream with slightly jittered 1.025 s sampling
fn telemetry(msid: &str, n: usize, offset: f64) -> SampleStream {
    let times: Vec<f64> = (0..n)
        .map(|i| i as f64 * 1.025 + offset + 0.01 * ((i % 7) as f64))
        .collect();
    let values: Vec<f64> = times
        .iter()
        .map(|t| 290.0 + 10.0 * (t / 3600.0).sin())
        .collect();
    SampleStream::from_f64(msid, times, values, Some("K")).unwrap()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [10_000, 100_000].iter() {
        let stream = telemetry("tephin", *size, 0.0);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("short", size), &stream, |b, s| {
            b.iter(|| black_box(aggregate(s, 328.0, false, WeightClamp::default()).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("daily", size), &stream, |b, s| {
            b.iter(|| black_box(aggregate(s, 86400.0, true, WeightClamp::default()).unwrap()));
        });
    }

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for size in [10_000, 100_000].iter() {
        let model: Vec<f64> = (0..*size).map(|i| 100.0 + (i as f64 / 500.0).sin()).collect();
        // Every 50th sample drops to zero
        let raw: Vec<f64> = model
            .iter()
            .enumerate()
            .map(|(i, m)| if i % 50 == 0 { 0.0 } else { m + 0.5 })
            .collect();
        let corrected: Vec<f64> = raw.iter().map(|v| v * 1.02).collect();
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("two_candidates", size), size, |b, _| {
            b.iter(|| black_box(reconcile(&[&raw, &corrected], &model, 5.0).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("median_filter_7", size), &raw, |b, raw| {
            b.iter(|| black_box(median_filter(raw, 7)));
        });
    }

    group.finish();
}

fn bench_alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("alignment");
    let size = 50_000;
    let streams: Vec<SampleStream> = (0..4)
        .map(|k| telemetry(&format!("aoattqt{}", k + 1), size, 0.1 * k as f64))
        .collect();
    let refs: Vec<&SampleStream> = streams.iter().collect();
    group.throughput(Throughput::Elements(size as u64));

    group.bench_function("nearest_union_4", |b| {
        b.iter(|| black_box(nearest_union(&refs, AlignTimes::Reference(0), true).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_reconcile, bench_alignment);
criterion_main!(benches);
