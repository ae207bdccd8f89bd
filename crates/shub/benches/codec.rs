// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec Benchmark
//!
//! Measures encode/decode latency for the SHUB wire format with scalar
//! and record payloads. Isolates codec overhead without network I/O.

#![allow(clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shub::codec::{decode, encode, encode_vec, Message, Value};
use std::hint::black_box as bb;

fn scalar_message() -> Message {
    Message::new("sensors/temp", Value::Float(21.5))
}

fn record_message(fields: usize) -> Message {
    let fields = (0..fields)
        .map(|i| (format!("f{}", i), Value::Integer(i as i64)))
        .collect();
    Message::new("sensors/block", Value::Record(fields))
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_encode");
    let mut buf = [0u8; 1472];

    let scalar = scalar_message();
    group.bench_function("scalar", |b| {
        b.iter(|| bb(encode(bb(&scalar), &mut buf).expect("encode")));
    });

    for fields in [4usize, 16, 64] {
        let msg = record_message(fields);
        group.bench_with_input(BenchmarkId::new("record", fields), &msg, |b, msg| {
            b.iter(|| bb(encode(bb(msg), &mut buf).expect("encode")));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_decode");

    let scalar = encode_vec(&scalar_message()).expect("encode");
    group.bench_function("scalar", |b| {
        b.iter(|| bb(decode(bb(&scalar)).expect("decode")));
    });

    for fields in [4usize, 16, 64] {
        let datagram = encode_vec(&record_message(fields)).expect("encode");
        group.bench_with_input(
            BenchmarkId::new("record", fields),
            &datagram,
            |b, datagram| {
                b.iter(|| bb(decode(bb(datagram)).expect("decode")));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
