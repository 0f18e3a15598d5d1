//! # Double Buffer Benchmark
//!
//! Append cost into the write slot, swap cost, and arena reset.
//!
//! Run with: `cargo bench --package magnet_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use magnet_core::{Arena, DoubleBuffer};

fn bench_append_and_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_then_swap");

    for appends in [16usize, 256, 4096] {
        let buffer: DoubleBuffer<Vec<u64>> =
            DoubleBuffer::new(Vec::with_capacity(appends), Vec::with_capacity(appends));

        group.bench_with_input(BenchmarkId::from_parameter(appends), &appends, |b, &appends| {
            b.iter(|| {
                for i in 0..appends {
                    buffer.write_handle().push(i as u64);
                }
                buffer.swap_buffers();
                let consumed = {
                    let mut read = buffer.read_handle_mut();
                    let sum: u64 = read.iter().sum();
                    read.clear();
                    sum
                };
                black_box(consumed)
            });
        });
    }

    group.finish();
}

fn bench_arena_fill_reset(c: &mut Criterion) {
    let mut arena = Arena::new(64 * 1024);
    let block = [0xABu8; 64];

    c.bench_function("arena_fill_64b_blocks_then_reset", |b| {
        b.iter(|| {
            while arena.alloc_copy(&block).is_ok() {}
            let used = arena.used();
            arena.reset();
            black_box(used)
        });
    });
}

criterion_group!(benches, bench_append_and_swap, bench_arena_fill_reset);
criterion_main!(benches);
