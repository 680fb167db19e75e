//! Idle-timeout and max-lifetime eviction for pooled clients

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Lifetimes at or below this threshold get the short jitter window
const SHORT_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Upper bound (exclusive, whole seconds) of the short jitter window
const SHORT_JITTER_SECS: u64 = 30;

/// Upper bound (exclusive, whole seconds) of the long jitter window
const LONG_JITTER_SECS: u64 = 60;

/// Spread added to `max_live_time` so that clients created together do not
/// all expire together
///
/// # Examples
///
/// ```
/// use client_pool::{LifetimeJitter, PoolConfiguration};
/// use std::time::Duration;
///
/// // Reproducible jitter
/// let config = PoolConfiguration::<i32>::new()
///     .with_max_live_time(Duration::from_secs(600))
///     .with_jitter(LifetimeJitter::Standard { seed: Some(7) });
/// assert_eq!(config.jitter, LifetimeJitter::Standard { seed: Some(7) });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifetimeJitter {
    /// Random whole seconds: up to 30s for lifetimes of at most five
    /// minutes, up to 60s otherwise
    Standard {
        /// Seed for the pool-owned generator, entropy when `None`
        seed: Option<u64>,
    },

    /// Always add the same amount
    Fixed(Duration),

    /// Expire exactly at `max_live_time`
    Disabled,
}

impl Default for LifetimeJitter {
    fn default() -> Self {
        LifetimeJitter::Standard { seed: None }
    }
}

/// Per-pool jitter source, owns its generator
pub(crate) struct JitterSource {
    policy: LifetimeJitter,
    rng: Mutex<StdRng>,
}

impl JitterSource {
    pub fn new(policy: LifetimeJitter) -> Self {
        let rng = match policy {
            LifetimeJitter::Standard { seed: Some(seed) } => StdRng::seed_from_u64(seed),
            _ => StdRng::from_entropy(),
        };
        Self {
            policy,
            rng: Mutex::new(rng),
        }
    }

    /// `max_live_time` extended by this pool's jitter
    pub fn extend(&self, max_live_time: Duration) -> Duration {
        match self.policy {
            LifetimeJitter::Disabled => max_live_time,
            LifetimeJitter::Fixed(extra) => max_live_time.saturating_add(extra),
            LifetimeJitter::Standard { .. } => {
                let window = if max_live_time <= SHORT_LIFETIME {
                    SHORT_JITTER_SECS
                } else {
                    LONG_JITTER_SECS
                };
                let extra = self.rng.lock().gen_range(0..window);
                max_live_time.saturating_add(Duration::from_secs(extra))
            }
        }
    }
}

/// One idle client held by the pool
pub(crate) struct IdleEntry<C> {
    pub client: C,
    /// Set once when the client was dialed
    pub first_created_at: Instant,
    /// Updated each time the client is returned
    pub last_released_at: Instant,
}

impl<C> IdleEntry<C> {
    pub fn new(client: C, first_created_at: Instant) -> Self {
        Self {
            client,
            first_created_at,
            last_released_at: Instant::now(),
        }
    }

    /// Idle for at least `timeout` as of `now`. A timeout past the end of
    /// representable time never expires.
    pub fn is_idle_expired(&self, timeout: Duration, now: Instant) -> bool {
        self.last_released_at
            .checked_add(timeout)
            .is_some_and(|expiry| expiry <= now)
    }
}

/// Whether a client created at `first_created_at` has outlived `lifetime`
pub(crate) fn is_past_lifetime(first_created_at: Instant, lifetime: Duration, now: Instant) -> bool {
    first_created_at
        .checked_add(lifetime)
        .is_some_and(|expiry| expiry <= now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_jitter_short_window() {
        let source = JitterSource::new(LifetimeJitter::Standard { seed: Some(1) });
        let base = Duration::from_secs(60);
        for _ in 0..200 {
            let extended = source.extend(base);
            assert!(extended >= base);
            assert!(extended < base + Duration::from_secs(30));
        }
    }

    #[test]
    fn test_standard_jitter_long_window() {
        let source = JitterSource::new(LifetimeJitter::Standard { seed: Some(2) });
        let base = Duration::from_secs(3600);
        let mut widest = Duration::ZERO;
        for _ in 0..500 {
            let extra = source.extend(base) - base;
            assert!(extra < Duration::from_secs(60));
            widest = widest.max(extra);
        }
        assert!(widest >= Duration::from_secs(30));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let a = JitterSource::new(LifetimeJitter::Standard { seed: Some(42) });
        let b = JitterSource::new(LifetimeJitter::Standard { seed: Some(42) });
        let base = Duration::from_secs(600);
        let first: Vec<_> = (0..20).map(|_| a.extend(base)).collect();
        let second: Vec<_> = (0..20).map(|_| b.extend(base)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_and_disabled() {
        let base = Duration::from_secs(10);
        assert_eq!(JitterSource::new(LifetimeJitter::Disabled).extend(base), base);
        assert_eq!(
            JitterSource::new(LifetimeJitter::Fixed(Duration::from_secs(3))).extend(base),
            Duration::from_secs(13)
        );
    }

    #[test]
    fn test_idle_expiry() {
        let entry = IdleEntry::new((), Instant::now());
        let now = entry.last_released_at;
        assert!(!entry.is_idle_expired(Duration::from_secs(1), now));
        assert!(entry.is_idle_expired(Duration::from_secs(1), now + Duration::from_secs(1)));
    }

    #[test]
    fn test_huge_durations_never_expire() {
        let entry = IdleEntry::new((), Instant::now());
        let later = entry.last_released_at + Duration::from_secs(3600);
        assert!(!entry.is_idle_expired(Duration::MAX, later));
        assert!(!is_past_lifetime(entry.first_created_at, Duration::MAX, later));

        let source = JitterSource::new(LifetimeJitter::Standard { seed: Some(3) });
        assert_eq!(source.extend(Duration::MAX), Duration::MAX);
        let fixed = JitterSource::new(LifetimeJitter::Fixed(Duration::from_secs(1)));
        assert_eq!(fixed.extend(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_lifetime() {
        let created = Instant::now();
        let hour = Duration::from_secs(3600);
        assert!(!is_past_lifetime(created, hour, created + Duration::from_secs(10)));
        assert!(is_past_lifetime(created, hour, created + hour));
    }
}
