//! Pool configuration options

use crate::errors::HookError;
use crate::eviction::LifetimeJitter;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Factory creating one new client
pub type DialFn<C> = Arc<dyn Fn() -> Result<C, HookError> + Send + Sync>;

/// Health check run on an idle client before it is handed out again.
/// The second argument is the instant the client was last returned to the pool.
pub type TestOnBorrowFn<C> = Arc<dyn Fn(&C, Instant) -> Result<(), HookError> + Send + Sync>;

/// Destructor for one client
pub type CloseFn<C> = Arc<dyn Fn(C) -> Result<(), HookError> + Send + Sync>;

/// Configuration for client pool behavior
///
/// # Examples
///
/// ```
/// use client_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<i32>::new()
///     .with_max_idle(4)
///     .with_max_active(16)
///     .with_idle_timeout(Duration::from_secs(240))
///     .with_max_live_time(Duration::from_secs(3600))
///     .with_wait(true);
///
/// assert_eq!(config.max_idle, 4);
/// assert_eq!(config.max_active, 16);
/// assert!(config.wait);
/// ```
pub struct PoolConfiguration<C> {
    /// Maximum number of idle clients kept by the pool
    pub max_idle: usize,

    /// Maximum number of clients allocated at a given time, 0 means unbounded
    pub max_active: usize,

    /// Close clients after remaining idle for this long
    pub idle_timeout: Option<Duration>,

    /// Close clients once they are this old (plus jitter)
    pub max_live_time: Option<Duration>,

    /// Block on exhaustion instead of failing fast
    pub wait: bool,

    /// Optional validation run before an idle client is reused
    pub test_on_borrow: Option<TestOnBorrowFn<C>>,

    /// Spread applied to `max_live_time`
    pub jitter: LifetimeJitter,

    /// Timeout for async operations
    pub operation_timeout: Option<Duration>,
}

impl<C> Default for PoolConfiguration<C> {
    fn default() -> Self {
        Self {
            max_idle: 8,
            max_active: 0,
            idle_timeout: None,
            max_live_time: None,
            wait: false,
            test_on_borrow: None,
            jitter: LifetimeJitter::default(),
            operation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl<C> Clone for PoolConfiguration<C> {
    fn clone(&self) -> Self {
        Self {
            max_idle: self.max_idle,
            max_active: self.max_active,
            idle_timeout: self.idle_timeout,
            max_live_time: self.max_live_time,
            wait: self.wait,
            test_on_borrow: self.test_on_borrow.clone(),
            jitter: self.jitter.clone(),
            operation_timeout: self.operation_timeout,
        }
    }
}

impl<C> fmt::Debug for PoolConfiguration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("max_idle", &self.max_idle)
            .field("max_active", &self.max_active)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_live_time", &self.max_live_time)
            .field("wait", &self.wait)
            .field("test_on_borrow", &self.test_on_borrow.is_some())
            .field("jitter", &self.jitter)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl<C> PoolConfiguration<C> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of idle clients
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the maximum number of clients, 0 for no limit
    ///
    /// # Examples
    ///
    /// ```
    /// use client_pool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<i32>::new().with_max_active(2);
    /// assert!(config.is_bounded());
    ///
    /// let config = PoolConfiguration::<i32>::new().with_max_active(0);
    /// assert!(!config.is_bounded());
    /// ```
    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    /// Set idle timeout, a zero duration disables it
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Set maximum client lifetime, a zero duration disables it
    pub fn with_max_live_time(mut self, max_live_time: Duration) -> Self {
        self.max_live_time = (!max_live_time.is_zero()).then_some(max_live_time);
        self
    }

    /// Block callers when the pool is exhausted
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Validate idle clients before reuse
    pub fn with_test_on_borrow<F>(mut self, test: F) -> Self
    where
        F: Fn(&C, Instant) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.test_on_borrow = Some(Arc::new(test));
        self
    }

    /// Set the lifetime jitter policy
    pub fn with_jitter(mut self, jitter: LifetimeJitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Whether `max_active` limits the number of clients
    pub fn is_bounded(&self) -> bool {
        self.max_active > 0
    }
}
