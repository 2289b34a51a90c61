use criterion::{black_box, criterion_group, criterion_main, Criterion};
use raptorq_core::field::gf256;

fn bench_gf_mul(c: &mut Criterion) {
    c.bench_function("gf256 mul", |b| {
        b.iter(|| {
            let mut acc = 0u8;
            for a in 1u8..=10 {
                for b_ in 1u8..=10 {
                    acc ^= gf256::mul(a, b_);
                }
            }
            black_box(acc);
        })
    });
}

fn bench_fma_slice(c: &mut Criterion) {
    let src: Vec<u8> = (0..1024).map(|i| i as u8).collect();
    let mut dst = vec![0u8; 1024];
    c.bench_function("gf256 fma_slice", |b| {
        b.iter(|| {
            gf256::fma_slice(black_box(&mut dst), black_box(&src), black_box(0x9A));
        });
    });
}

criterion_group!(benches, bench_gf_mul, bench_fma_slice);
criterion_main!(benches);
