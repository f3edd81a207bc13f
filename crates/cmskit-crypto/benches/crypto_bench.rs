//! Key-wrap and KDF benchmarks.
//!
//! Run with: cargo bench -p cmskit-crypto

use cmskit_crypto::aes::AesKey;
use cmskit_crypto::modes::{pwri, tdes_wrap, wrap};
use cmskit_crypto::pbkdf2::pbkdf2;
use cmskit_crypto::x963kdf::X963Kdf;
use cmskit_types::HashAlgId;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

// ---------------------------------------------------------------------------
// Key wrap benchmarks
// ---------------------------------------------------------------------------

fn bench_key_wrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("key-wrap");

    for kek_len in [16usize, 32] {
        let kek = vec![0x42u8; kek_len];
        let cek = [0x24u8; 32];
        let wrapped = wrap::key_wrap(&kek, &cek).unwrap();

        group.bench_with_input(BenchmarkId::new("aes-kw/wrap", kek_len * 8), &kek_len, |b, _| {
            b.iter(|| wrap::key_wrap(&kek, &cek).unwrap());
        });
        group.bench_with_input(
            BenchmarkId::new("aes-kw/unwrap", kek_len * 8),
            &kek_len,
            |b, _| {
                b.iter(|| wrap::key_unwrap(&kek, &wrapped).unwrap());
            },
        );
    }

    let tdes_kek = [0x11u8; 24];
    let tdes_cek = [0x22u8; 24];
    let tdes_wrapped = tdes_wrap::key_wrap(&tdes_kek, &tdes_cek).unwrap();
    group.bench_function("3des-kw/unwrap", |b| {
        b.iter(|| tdes_wrap::key_unwrap(&tdes_kek, &tdes_wrapped).unwrap());
    });

    let kek = AesKey::new(&[0x33u8; 16]).unwrap();
    let iv = [0u8; 16];
    let pwri_wrapped = pwri::key_wrap(&kek, &iv, &[0x44u8; 16]).unwrap();
    group.bench_function("pwri/unwrap", |b| {
        b.iter(|| pwri::key_unwrap(&kek, &iv, &pwri_wrapped).unwrap());
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// KDF benchmarks
// ---------------------------------------------------------------------------

fn bench_kdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdf");

    let z = [0x5au8; 32];
    let info = [0u8; 40];
    for hash in [HashAlgId::Sha256, HashAlgId::Sha512] {
        let kdf = X963Kdf::new(hash);
        group.bench_function(format!("x963/{}", hash.name()), |b| {
            b.iter(|| kdf.derive_vec(&z, &info, 32).unwrap());
        });
    }

    for iterations in [2048u32, 10000] {
        group.bench_with_input(
            BenchmarkId::new("pbkdf2-sha1", iterations),
            &iterations,
            |b, &n| {
                b.iter(|| pbkdf2(HashAlgId::Sha1, b"password", b"saltsalt", n, 16).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_key_wrap, bench_kdf);
criterion_main!(benches);
