//! # client_pool
//!
//! Generic, thread-safe pool for expensive client handles such as database
//! connections or RPC channels. The pool knows nothing about what it pools:
//! clients are created and destroyed by caller-supplied hooks.
//!
//! ## Features
//!
//! - Bounded concurrent access (`max_active`), fail-fast or blocking on exhaustion
//! - LIFO reuse of idle clients, capped by `max_idle`
//! - Optional test-on-borrow health check before reuse
//! - Idle-timeout pruning and jittered max-lifetime rotation
//! - Graceful draining with `release()`
//! - Automatic return of clients via RAII (Drop trait)
//! - Bounded and async acquisition
//! - Metrics, Prometheus export and health status
//!
//! ## Quick Start
//!
//! ```rust
//! use client_pool::{ClientPool, PoolConfiguration};
//!
//! let config = PoolConfiguration::new().with_max_active(4).with_max_idle(2);
//! let pool = ClientPool::new(|| Ok(vec![0u8; 16]), |_| Ok(()), config);
//! {
//!     let client = pool.get(false).unwrap();
//!     println!("Got client with {} bytes", client.len());
//!     // Client automatically returned when `client` goes out of scope
//! }
//! assert_eq!(pool.idle_count(), 1);
//! pool.release();
//! ```

mod pool;
mod config;
mod metrics;
mod health;
mod eviction;
mod errors;

pub use pool::{ClientPool, PooledClient};
pub use config::{CloseFn, DialFn, PoolConfiguration, TestOnBorrowFn};
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use health::HealthStatus;
pub use eviction::LifetimeJitter;
pub use errors::{HookError, PoolError, PoolResult, SharedHookError};
