//! Benchmarks for register frame encoding
//!
//! Measures the cost of building burst payloads and splitting them into
//! bulk-transfer chunks.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use protocol::{Register, chunks, encode_pairs, encode_write};

fn benchmark_single_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_frames");

    group.bench_function("encode_write", |b| {
        b.iter(|| encode_write(black_box(Register::Data.address()), black_box(0x7f)))
    });

    group.finish();
}

fn benchmark_bursts(c: &mut Criterion) {
    let mut group = c.benchmark_group("bursts");

    for pairs in [32usize, 256, 4096] {
        group.throughput(Throughput::Bytes((pairs * 2) as u64));
        group.bench_with_input(BenchmarkId::new("encode_and_chunk", pairs), &pairs, |b, &n| {
            b.iter(|| {
                let payload = encode_pairs((0..n).map(|i| (0u8, i as u8)));
                chunks(black_box(&payload)).count()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_single_frames, benchmark_bursts);
criterion_main!(benches);
