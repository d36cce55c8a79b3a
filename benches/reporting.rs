//! Performance benchmarks for the report kernels.
//!
//! Run with: `cargo bench --bench reporting`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Snapshot diff | <100µs | 200-line snapshots |
//! | Timeline | <10ms | 100 revisions, parse included |
//! | Cached report | <5µs | LRU hit |

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use slip_insights::report::top_customers;
use slip_insights::{
    aggregate, build_timeline, diff, Bucket, CacheConfig, Reducer, ReportCache, RevisionRecord,
    SlipId, SlipLineRecord, SlipRecord, Snapshot, SnapshotLine, TimedValue,
};

fn make_snapshot(lines: usize, qty_offset: f64) -> Snapshot {
    Snapshot {
        customer_name: "Acme".to_string(),
        lines: (0..lines)
            .map(|i| {
                SnapshotLine::new(
                    Some((i % 50) as i64 + 1),
                    "",
                    format!("Box {}", i % 7),
                    (i % 3).to_string(),
                    i as f64 + qty_offset,
                )
            })
            .collect(),
        ..Snapshot::default()
    }
}

fn make_slips(count: usize) -> Vec<SlipRecord> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            SlipRecord::new(
                SlipId::new(i as i64 + 1),
                format!("PS-{:06}", i + 1),
                start + ChronoDuration::hours(i as i64 * 7),
                format!("Customer {}", i % 40),
            )
            .with_line(SlipLineRecord::new(1, Some((i % 25) as i64), (i % 13) as f64))
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");

    for lines in [10, 50, 200] {
        let prev = make_snapshot(lines, 0.0);
        let next = make_snapshot(lines, 1.0);

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &lines, |b, _| {
            b.iter(|| diff(black_box(&prev), black_box(&next)))
        });
    }

    group.finish();
}

fn bench_timeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline");
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for versions in [10u32, 100] {
        let revisions: Vec<_> = (1..=versions)
            .map(|v| {
                let blob = make_snapshot(20, f64::from(v % 3)).to_json().unwrap();
                RevisionRecord::new(i64::from(v), SlipId::new(1), v, created, blob)
            })
            .collect();

        group.throughput(Throughput::Elements(u64::from(versions)));
        group.bench_with_input(
            BenchmarkId::new("revisions", versions),
            &revisions,
            |b, revisions| b.iter(|| build_timeline(black_box(revisions))),
        );
    }

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let slips = make_slips(10_000);
    let mut group = c.benchmark_group("aggregate");

    for bucket in [Bucket::Daily, Bucket::Weekly, Bucket::Monthly] {
        group.bench_with_input(
            BenchmarkId::new("bucket", format!("{:?}", bucket)),
            &bucket,
            |b, &bucket| {
                b.iter(|| {
                    aggregate(
                        slips.iter().map(|s| TimedValue::new(s.slip_date, s.total_qty())),
                        bucket,
                        Reducer::Sum,
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let slips = make_slips(10_000);
    c.bench_function("top_customers", |b| {
        b.iter(|| top_customers(black_box(&slips), 25))
    });
}

fn bench_cache(c: &mut Criterion) {
    let cache: ReportCache<serde_json::Value> = ReportCache::new(CacheConfig {
        max_entries: 1_000,
        ttl: Duration::from_secs(600),
        enabled: true,
    });
    cache.insert("/api/reports/overview?from=2024-01-01", serde_json::json!({"rows": []}));

    c.bench_function("cache_hit", |b| {
        b.iter(|| {
            let value = cache.get(black_box("/api/reports/overview?from=2024-01-01"));
            assert!(value.is_some());
            value
        })
    });

    let keys: Vec<String> = (0..5_000)
        .map(|i| format!("/api/reports/overview?from=2024-01-01&limit={}", i))
        .collect();
    c.bench_function("cache_miss_insert", |b| {
        let mut idx = 0;
        b.iter(|| {
            let key = &keys[idx % keys.len()];
            idx += 1;
            cache.get_or_compute(key, || serde_json::json!({"rows": [idx]}))
        })
    });
}

criterion_group!(
    benches,
    bench_diff,
    bench_timeline,
    bench_aggregate,
    bench_ranking,
    bench_cache,
);
criterion_main!(benches);
