// Accrual walk benchmarks for the Nauh reward ledger.
//
// Measures the cost of settling a single account across a growing number of
// rate checkpoints, and the fast path for a settlement with no new
// checkpoints since the last one.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use nauh_protocol::rewards::{CheckpointLog, SettlementCursor};

/// Builds a log with `n` checkpoints spaced one hour apart.
fn build_log(n: usize) -> CheckpointLog {
    let mut log = CheckpointLog::genesis(100, 0);
    for i in 1..n {
        let rate = 100 + (i as u128 % 17);
        log.append(rate, i as u64 * 3_600).expect("monotonic append");
    }
    log
}

fn bench_accrue_full_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("accrual/full_history");
    for n in [1usize, 16, 256, 4_096] {
        let log = build_log(n);
        let now = n as u64 * 3_600;
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| log.accrue(50_000_000_000_000_000_000, SettlementCursor::default(), now));
        });
    }
    group.finish();
}

fn bench_accrue_settled_cursor(c: &mut Criterion) {
    let log = build_log(4_096);
    let now = 4_096 * 3_600;
    let cursor = log.cursor_at(now - 60);

    c.bench_function("accrual/settled_cursor", |b| {
        b.iter(|| log.accrue(50_000_000_000_000_000_000, cursor, now));
    });
}

criterion_group!(benches, bench_accrue_full_history, bench_accrue_settled_cursor);
criterion_main!(benches);
