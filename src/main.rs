// client_pool demo
// Pools a fake connection type and prints pool state along the way.
// Set RUST_LOG=client_pool=trace to see pool events.

use client_pool::{ClientPool, PoolConfiguration, PoolError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct FakeConnection {
    id: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== client_pool demo ===");

    let next_id = AtomicUsize::new(1);
    let config = PoolConfiguration::new()
        .with_max_active(2)
        .with_max_idle(1)
        .with_idle_timeout(Duration::from_secs(240))
        .with_max_live_time(Duration::from_secs(3600));

    let pool = ClientPool::new(
        move || {
            Ok(FakeConnection {
                id: next_id.fetch_add(1, Ordering::Relaxed),
            })
        },
        |conn: FakeConnection| {
            println!("  Closing connection {}", conn.id);
            Ok(())
        },
        config,
    );

    let first = match pool.get(false) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("  Failed to get connection: {}", err);
            return;
        }
    };
    println!("  Got connection {}", first.id);

    if let Ok(second) = pool.get(false) {
        println!("  Got connection {}", second.id);
        match pool.get(false) {
            Err(PoolError::Exhausted) => println!("  Third get: pool exhausted"),
            Err(err) => println!("  Third get failed: {}", err),
            Ok(conn) => println!("  Unexpected connection {}", conn.id),
        }
    }

    if let Err(err) = first.close() {
        eprintln!("  Failed to release connection: {}", err);
    }
    println!("  Active: {}, Idle: {}", pool.active_count(), pool.idle_count());

    pool.release();
    println!("  Released pool, active after release: {}", pool.active_count());

    for (key, value) in pool.export_metrics() {
        println!("    {}: {}", key, value);
    }
}
