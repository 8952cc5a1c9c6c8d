// Benchmarks for the SPSC ring behind the logger
//
// Tests:
// - Push/pop round trip
// - Bursts of log-sized entries
// - Report snapshots as queue elements
// - Full and empty fast paths

use common::lf_queue::channel;
use common::stats::{LatencyAccumulator, ReportKind, ReportSnapshot};
use common::time::Nanos;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark single push/pop operations
fn bench_push_pop_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_single_ops");
    group.throughput(Throughput::Elements(1));

    group.bench_function("push_pop_roundtrip", |b| {
        let (producer, consumer) = channel::<u64, 1024>();
        let mut counter = 0u64;
        b.iter(|| {
            let _ = producer.push(black_box(counter));
            counter = counter.wrapping_add(1);
            black_box(consumer.pop())
        });
    });

    group.finish();
}

/// Burst of N entries followed by a drain, as the writer thread sees them
fn bench_burst_then_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_burst");

    for burst_size in [8usize, 32, 128] {
        group.throughput(Throughput::Elements(burst_size as u64));

        group.bench_with_input(
            BenchmarkId::new("burst_then_drain", burst_size),
            &burst_size,
            |b, &size| {
                let (producer, consumer) = channel::<u64, 4096>();
                b.iter(|| {
                    for i in 0..size {
                        let _ = producer.push(black_box(i as u64));
                    }
                    while let Some(item) = consumer.pop() {
                        black_box(item);
                    }
                });
            },
        );
    }

    group.finish();
}

/// Report snapshots travel through the logger queue by value
fn bench_report_elements(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_reports");
    let ops = 64;
    group.throughput(Throughput::Elements(ops as u64));

    let mut stats = LatencyAccumulator::new();
    for latency in [1_200u64, 900, 4_500] {
        stats.record(40, latency);
    }
    let report = ReportSnapshot {
        kind: ReportKind::Periodic,
        generated_at: Nanos(0),
        stats: stats.snapshot(),
    };

    group.bench_function("report_snapshot", |b| {
        let (producer, consumer) = channel::<ReportSnapshot, 1024>();
        b.iter(|| {
            for _ in 0..ops {
                let _ = producer.push(black_box(report));
            }
            for _ in 0..ops {
                black_box(consumer.pop());
            }
        });
    });

    group.finish();
}

/// Empty pop and full push are the idle and overload paths
fn bench_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_edges");

    group.bench_function("pop_empty", |b| {
        let (_producer, consumer) = channel::<u64, 1024>();
        b.iter(|| black_box(consumer.pop()));
    });

    group.bench_function("push_full", |b| {
        let (producer, _consumer) = channel::<u64, 64>();
        while producer.push(0).is_ok() {}
        b.iter(|| black_box(producer.push(black_box(999))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_push_pop_single,
    bench_burst_then_drain,
    bench_report_elements,
    bench_edges,
);

criterion_main!(benches);
