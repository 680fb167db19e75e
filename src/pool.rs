//! Core client pool implementation

use crate::config::{CloseFn, DialFn, PoolConfiguration};
use crate::errors::{HookError, PoolError, PoolResult};
use crate::eviction::{is_past_lifetime, IdleEntry, JitterSource};
use crate::health::HealthStatus;
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics};

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// State guarded by the pool mutex
struct PoolState<C> {
    /// Clients that exist, checked out or idle
    active: usize,
    /// Most recently released at the front
    idle: VecDeque<IdleEntry<C>>,
    closed: bool,
}

impl<C> PoolState<C> {
    fn release_slot(&mut self) {
        debug_assert!(self.active > 0, "active client count underflow");
        self.active -= 1;
    }
}

struct Shared<C> {
    state: Mutex<PoolState<C>>,
    /// Signalled whenever `active` drops or an idle client shows up
    waiters: Condvar,
    dial: DialFn<C>,
    close: CloseFn<C>,
    config: PoolConfiguration<C>,
    jitter: JitterSource,
    metrics: MetricsTracker,
}

impl<C> Shared<C> {
    fn destroy(&self, client: C) -> Result<(), HookError> {
        MetricsTracker::incr(&self.metrics.destroyed);
        let result = (self.close)(client);
        if result.is_err() {
            MetricsTracker::incr(&self.metrics.close_failures);
        }
        result
    }

    /// Destroy a client whose close error is not reported to any caller
    fn destroy_quietly(&self, client: C, reason: &'static str) {
        if let Err(err) = self.destroy(client) {
            warn!(reason, error = %err, "failed to close pooled client");
        }
    }

    /// Decide whether an idle client may be handed out again
    fn check_idle(&self, entry: &IdleEntry<C>) -> Result<(), &'static str> {
        if let Some(test) = &self.config.test_on_borrow
            && let Err(err) = test(&entry.client, entry.last_released_at)
        {
            MetricsTracker::incr(&self.metrics.validation_failures);
            debug!(error = %err, "idle client failed test-on-borrow");
            return Err("test-on-borrow failed");
        }

        if let Some(max_live_time) = self.config.max_live_time {
            let lifetime = self.jitter.extend(max_live_time);
            if is_past_lifetime(entry.first_created_at, lifetime, Instant::now()) {
                MetricsTracker::incr(&self.metrics.lifetime_expirations);
                trace!(?lifetime, "idle client exceeded max live time");
                return Err("max live time exceeded");
            }
        }

        Ok(())
    }

    /// Return a client to the pool, or destroy it when forced, closed or over `max_idle`
    fn put(&self, client: C, first_created_at: Instant, force_close: bool) -> PoolResult<()> {
        let mut state = self.state.lock();
        let evicted = if !state.closed && !force_close {
            state.idle.push_front(IdleEntry::new(client, first_created_at));
            if state.idle.len() > self.config.max_idle {
                state.idle.pop_back().map(|entry| entry.client)
            } else {
                None
            }
        } else {
            Some(client)
        };

        let Some(evicted) = evicted else {
            self.waiters.notify_one();
            trace!(idle = state.idle.len(), "client returned to pool");
            return Ok(());
        };

        state.release_slot();
        self.waiters.notify_one();
        drop(state);
        self.destroy(evicted).map_err(PoolError::close)
    }

    /// Destroy idle clients at the back of the list whose idle timeout has passed
    fn prune_idle(&self, state: &mut MutexGuard<'_, PoolState<C>>, timeout: Duration) {
        loop {
            let stale = state
                .idle
                .back()
                .is_some_and(|entry| entry.is_idle_expired(timeout, Instant::now()));
            if !stale {
                break;
            }
            let Some(entry) = state.idle.pop_back() else {
                break;
            };
            state.release_slot();
            self.waiters.notify_one();
            MetricsTracker::incr(&self.metrics.idle_timeouts);
            MutexGuard::unlocked(state, || self.destroy_quietly(entry.client, "idle timeout"));
        }
    }
}

impl<C> Drop for Shared<C> {
    fn drop(&mut self) {
        let idle = std::mem::take(&mut self.state.get_mut().idle);
        for entry in idle {
            self.destroy_quietly(entry.client, "pool dropped");
        }
    }
}

/// A checked-out client. Returns to the pool on `close()` or when dropped.
pub struct PooledClient<C> {
    client: Option<C>,
    first_created_at: Instant,
    unusable: bool,
    pool: Arc<Shared<C>>,
}

impl<C> PooledClient<C> {
    fn new(client: C, first_created_at: Instant, pool: Arc<Shared<C>>) -> Self {
        Self {
            client: Some(client),
            first_created_at,
            unusable: false,
            pool,
        }
    }

    /// Borrow the underlying client
    pub fn raw_client(&self) -> &C {
        self
    }

    /// Destroy the client on release instead of returning it to the pool
    pub fn mark_unusable(&mut self) {
        self.unusable = true;
    }

    /// Whether the client will be destroyed on release
    pub fn is_unusable(&self) -> bool {
        self.unusable
    }

    /// When the underlying client was dialed
    pub fn first_created_at(&self) -> Instant {
        self.first_created_at
    }

    /// Release the client back to the pool.
    ///
    /// If the client is destroyed instead (marked unusable, pool closed or
    /// idle list full), the close hook's error is returned.
    pub fn close(mut self) -> PoolResult<()> {
        match self.client.take() {
            Some(client) => self.pool.put(client, self.first_created_at, self.unusable),
            None => Ok(()),
        }
    }
}

impl<C> Deref for PooledClient<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("Client already released")
    }
}

impl<C> DerefMut for PooledClient<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut().expect("Client already released")
    }
}

impl<C> Drop for PooledClient<C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take()
            && let Err(err) = self.pool.put(client, self.first_created_at, self.unusable)
        {
            warn!(error = %err, "failed to release dropped client");
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for PooledClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledClient")
            .field("client", &self.client)
            .field("age", &self.first_created_at.elapsed())
            .field("unusable", &self.unusable)
            .finish_non_exhaustive()
    }
}

/// Thread-safe pool of clients created on demand by a dial hook
///
/// # Examples
///
/// ```
/// use client_pool::{ClientPool, PoolConfiguration, PoolError};
///
/// let config = PoolConfiguration::new().with_max_active(1).with_max_idle(1);
/// let pool = ClientPool::new(|| Ok(String::from("conn")), |_| Ok(()), config);
///
/// let client = pool.get(false).unwrap();
/// assert_eq!(client.as_str(), "conn");
/// assert!(matches!(pool.get(false), Err(PoolError::Exhausted)));
///
/// client.close().unwrap();
/// assert_eq!(pool.idle_count(), 1);
/// ```
pub struct ClientPool<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for ClientPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> ClientPool<C> {
    /// Create a new pool from a dial hook, a close hook and a configuration
    pub fn new<D, F>(dial: D, close: F, config: PoolConfiguration<C>) -> Self
    where
        D: Fn() -> Result<C, HookError> + Send + Sync + 'static,
        F: Fn(C) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let jitter = JitterSource::new(config.jitter.clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    active: 0,
                    idle: VecDeque::new(),
                    closed: false,
                }),
                waiters: Condvar::new(),
                dial: Arc::new(dial),
                close: Arc::new(close),
                config,
                jitter,
                metrics: MetricsTracker::new(),
            }),
        }
    }

    /// Get a client, reusing an idle one unless `force_new` is set.
    ///
    /// With `wait` enabled this blocks until a client is available, without
    /// a time limit.
    pub fn get(&self, force_new: bool) -> PoolResult<PooledClient<C>> {
        self.acquire(force_new, None)
    }

    /// Like [`get`](Self::get), but gives up after `timeout` when blocked
    pub fn get_timeout(&self, force_new: bool, timeout: Duration) -> PoolResult<PooledClient<C>> {
        self.acquire(force_new, Some(timeout))
    }

    fn acquire(&self, force_new: bool, timeout: Option<Duration>) -> PoolResult<PooledClient<C>> {
        let shared = &self.shared;
        let config = &shared.config;
        // A deadline past the end of representable time waits without bound
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

        let mut state = shared.state.lock();
        loop {
            if state.closed {
                return Err(PoolError::Closed);
            }

            if let Some(idle_timeout) = config.idle_timeout {
                shared.prune_idle(&mut state, idle_timeout);
            }

            if !force_new {
                while let Some(entry) = state.idle.pop_front() {
                    drop(state);
                    match shared.check_idle(&entry) {
                        Ok(()) => {
                            MetricsTracker::incr(&shared.metrics.reused);
                            trace!("reusing idle client");
                            return Ok(PooledClient::new(
                                entry.client,
                                entry.first_created_at,
                                Arc::clone(shared),
                            ));
                        }
                        Err(reason) => {
                            shared.destroy_quietly(entry.client, reason);
                            state = shared.state.lock();
                            state.release_slot();
                            shared.waiters.notify_one();
                        }
                    }
                }
            }

            if state.closed {
                return Err(PoolError::Closed);
            }

            if !config.is_bounded() || state.active < config.max_active {
                state.active += 1;
                drop(state);
                return match (shared.dial)() {
                    Ok(client) => {
                        MetricsTracker::incr(&shared.metrics.dialed);
                        debug!("dialed new client");
                        Ok(PooledClient::new(client, Instant::now(), Arc::clone(shared)))
                    }
                    Err(err) => {
                        MetricsTracker::incr(&shared.metrics.dial_failures);
                        debug!(error = %err, "failed to dial client");
                        let mut state = shared.state.lock();
                        state.release_slot();
                        shared.waiters.notify_one();
                        Err(PoolError::dial(err))
                    }
                };
            }

            if !config.wait {
                MetricsTracker::incr(&shared.metrics.exhausted_events);
                return Err(PoolError::Exhausted);
            }

            MetricsTracker::incr(&shared.metrics.wait_events);
            match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    if shared.waiters.wait_until(&mut state, deadline).timed_out() {
                        return Err(PoolError::Timeout(timeout));
                    }
                }
                _ => shared.waiters.wait(&mut state),
            }
        }
    }

    /// Close the pool: destroy idle clients and fail every later `get`.
    ///
    /// Checked-out clients are destroyed as their holders release them.
    pub fn release(&self) {
        let idle = {
            let mut state = self.shared.state.lock();
            let idle = std::mem::take(&mut state.idle);
            state.closed = true;
            debug_assert!(state.active >= idle.len(), "idle clients exceed active count");
            state.active -= idle.len();
            self.shared.waiters.notify_all();
            idle
        };

        debug!(idle = idle.len(), "releasing client pool");
        for entry in idle {
            self.shared.destroy_quietly(entry.client, "pool released");
        }
    }

    /// Whether `release` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Number of clients that exist, checked out or idle
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active
    }

    /// Number of idle clients
    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// The configuration the pool was built with
    pub fn config(&self) -> &PoolConfiguration<C> {
        &self.shared.config
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let (active, idle) = {
            let state = self.shared.state.lock();
            (state.active, state.idle.len())
        };
        self.shared
            .metrics
            .get_metrics(active, idle, self.shared.config.max_active)
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        let state = self.shared.state.lock();
        HealthStatus::new(
            state.idle.len(),
            state.active,
            self.shared.config.max_active,
            state.closed,
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }
}

impl<C: Send + 'static> ClientPool<C> {
    /// Get a client without blocking the async runtime.
    ///
    /// The wait is bounded by the configured operation timeout, if any.
    pub async fn get_async(&self, force_new: bool) -> PoolResult<PooledClient<C>> {
        let pool = self.clone();
        let timeout = self.shared.config.operation_timeout;

        tokio::task::spawn_blocking(move || pool.acquire(force_new, timeout))
            .await
            .map_err(|_| PoolError::Cancelled)?
    }
}

impl<C> fmt::Debug for ClientPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ClientPool")
            .field("active", &state.active)
            .field("idle", &state.idle.len())
            .field("closed", &state.closed)
            .field("config", &self.shared.config)
            .finish()
    }
}
