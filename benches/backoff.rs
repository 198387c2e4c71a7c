#![deny(warnings)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use tripwire::HybridBackoff;

fn recovery_timeout(c: &mut Criterion) {
    let mut rng = XorShiftRng::seed_from_u64(0);
    let plain = HybridBackoff {
        jitter_enabled: false,
        ..HybridBackoff::default()
    };
    let jittered = HybridBackoff::default();

    c.bench_function("recovery_timeout", |b| {
        b.iter(|| {
            for breaks in 0..10 {
                black_box(plain.timeout_minutes(black_box(breaks), &mut rng));
            }
        })
    });

    c.bench_function("recovery_timeout_jittered", |b| {
        b.iter(|| {
            for breaks in 0..10 {
                black_box(jittered.timeout_minutes(black_box(breaks), &mut rng));
            }
        })
    });
}

criterion_group!(benches, recovery_timeout);
criterion_main!(benches);
