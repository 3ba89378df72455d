// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Throughput benchmarks for the digest and cipher backends
//!
//! Run with: cargo bench --package q-crypto

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use q_crypto::{AesCbc, CipherAlgo, Crc32, HashAlgo, Sha3_256};

fn bench_digests(c: &mut Criterion) {
    let data = vec![0xA5u8; 4096];
    let mut group = c.benchmark_group("digest_4kb");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("crc32", |b| {
        let mut digest = Crc32::new();
        let mut out = [0u8; 4];
        b.iter(|| {
            digest.init();
            digest.update(black_box(&data));
            digest.finalize(&mut out)
        });
    });

    group.bench_function("sha3_256", |b| {
        let mut digest = Sha3_256::new();
        let mut out = [0u8; 32];
        b.iter(|| {
            digest.init();
            digest.update(black_box(&data));
            digest.finalize(&mut out)
        });
    });
    group.finish();
}

fn bench_aes_cbc(c: &mut Criterion) {
    let mut group = c.benchmark_group("aes_cbc_decrypt_4kb");
    group.throughput(Throughput::Bytes(4096));

    for key_len in [16usize, 32] {
        let key = vec![0x11u8; key_len];
        group.bench_function(format!("aes{}", key_len * 8), |b| {
            let mut cipher = AesCbc::new();
            let mut data = vec![0u8; 4096];
            b.iter(|| {
                cipher.init(&key, &[0u8; 16]).unwrap();
                cipher.decrypt(black_box(&mut data)).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_digests, bench_aes_cbc);
criterion_main!(benches);
