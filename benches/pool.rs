use client_pool::{ClientPool, PoolConfiguration};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn get_and_release(c: &mut Criterion) {
    let config = PoolConfiguration::new().with_max_active(8).with_max_idle(8);
    let pool = ClientPool::new(|| Ok(vec![0u8; 64]), |_| Ok(()), config);

    c.bench_function("get_release_idle", |b| {
        b.iter(|| {
            let client = pool.get(false).unwrap();
            black_box(client.len());
            client.close().unwrap();
        })
    });

    c.bench_function("get_release_force_new", |b| {
        b.iter(|| {
            let mut client = pool.get(true).unwrap();
            client.mark_unusable();
            client.close().unwrap();
        })
    });
}

criterion_group!(benches, get_and_release);
criterion_main!(benches);
