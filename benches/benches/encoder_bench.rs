//! # TASM Encoder Benchmarks
//!
//! Measures lexing, encoding and the `.tim` store.
//!
//! Run: `cargo bench --bench encoder_bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tim_core::prelude::*;

fn source(lines: usize) -> String {
    let mut src = String::from("@entrypoint 1\n");
    for i in 0..lines {
        match i % 4 {
            0 => src.push_str(&format!("push {}\n", i)),
            1 => src.push_str("mov r3 top\n"),
            2 => src.push_str(&format!("push_str \"line {}\"\n", i)),
            _ => src.push_str("add\n"),
        }
    }
    src.push_str("halt\n");
    src
}

fn bench_encoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoder");

    for lines in [64usize, 512, 1000] {
        let src = source(lines);
        group.throughput(Throughput::Bytes(src.len() as u64));

        group.bench_with_input(BenchmarkId::new("tokenize", lines), &src, |b, src| {
            b.iter(|| black_box(tokenize(src).unwrap()))
        });

        let tokens = tokenize(&src).unwrap();
        group.bench_with_input(BenchmarkId::new("encode", lines), &tokens, |b, tokens| {
            b.iter(|| black_box(encode(tokens).unwrap()))
        });
    }

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("bytecode_store");
    let program = assemble(&source(1000)).unwrap();
    let bytes = program.to_bytes();

    group.bench_function("to_bytes", |b| b.iter(|| black_box(program.to_bytes())));
    group.bench_function("from_bytes", |b| {
        b.iter(|| black_box(Program::from_bytes(&bytes).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_encoder, bench_store);
criterion_main!(benches);
