//! Metrics collection and export for client pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use client_pool::{ClientPool, PoolConfiguration};
///
/// let pool = ClientPool::new(|| Ok(1u32), |_| Ok(()), PoolConfiguration::default());
///
/// {
///     let _client = pool.get(false).unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_dialed, 1);
///     assert_eq!(metrics.active_clients, 1);
/// }
/// assert_eq!(pool.metrics().idle_clients, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Clients successfully created by the dial hook
    pub total_dialed: usize,

    /// Failed dial attempts
    pub dial_failures: usize,

    /// Idle clients handed out again
    pub total_reused: usize,

    /// Clients passed to the close hook
    pub total_destroyed: usize,

    /// Idle clients rejected by test-on-borrow
    pub validation_failures: usize,

    /// Idle clients rotated out for exceeding their lifetime
    pub lifetime_expirations: usize,

    /// Idle clients pruned by the idle timeout
    pub idle_timeouts: usize,

    /// Fail-fast acquisitions on an exhausted pool
    pub exhausted_events: usize,

    /// Times a caller blocked waiting for a client
    pub wait_events: usize,

    /// Errors returned by the close hook
    pub close_failures: usize,

    /// Current active clients (checked out or idle)
    pub active_clients: usize,

    /// Current idle clients
    pub idle_clients: usize,

    /// Pool utilization ratio (0.0 to 1.0), 0 when unbounded
    pub utilization: f64,

    /// Maximum active clients, 0 when unbounded
    pub max_active: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_dialed".to_string(), self.total_dialed.to_string());
        metrics.insert("dial_failures".to_string(), self.dial_failures.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("lifetime_expirations".to_string(), self.lifetime_expirations.to_string());
        metrics.insert("idle_timeouts".to_string(), self.idle_timeouts.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("wait_events".to_string(), self.wait_events.to_string());
        metrics.insert("close_failures".to_string(), self.close_failures.to_string());
        metrics.insert("active_clients".to_string(), self.active_clients.to_string());
        metrics.insert("idle_clients".to_string(), self.idle_clients.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_active".to_string(), self.max_active.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use client_pool::{ClientPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ClientPool::new(|| Ok(()), |_| Ok(()), PoolConfiguration::default());
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("redis", Some(&tags)).unwrap();
    /// assert!(output.contains("clientpool_clients_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let registry = Registry::new();
        let labels = Self::format_labels(pool_name, tags);
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("clientpool_clients_active", "Current active clients", metrics.active_clients),
            ("clientpool_clients_idle", "Current idle clients", metrics.idle_clients),
            ("clientpool_clients_max_active", "Maximum active clients", metrics.max_active),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let utilization = Gauge::with_opts(opts("clientpool_utilization", "Pool utilization ratio"))?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        let counters = [
            ("clientpool_dialed_total", "Clients dialed", metrics.total_dialed),
            ("clientpool_dial_failures_total", "Failed dials", metrics.dial_failures),
            ("clientpool_reused_total", "Idle clients reused", metrics.total_reused),
            ("clientpool_destroyed_total", "Clients destroyed", metrics.total_destroyed),
            ("clientpool_validation_failures_total", "Test-on-borrow failures", metrics.validation_failures),
            ("clientpool_lifetime_expirations_total", "Clients rotated by lifetime", metrics.lifetime_expirations),
            ("clientpool_idle_timeouts_total", "Clients pruned by idle timeout", metrics.idle_timeouts),
            ("clientpool_events_exhausted_total", "Pool exhausted events", metrics.exhausted_events),
            ("clientpool_events_wait_total", "Blocking waits", metrics.wait_events),
            ("clientpool_close_failures_total", "Close hook failures", metrics.close_failures),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn format_labels(
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        labels
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub dialed: AtomicUsize,
    pub dial_failures: AtomicUsize,
    pub reused: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub lifetime_expirations: AtomicUsize,
    pub idle_timeouts: AtomicUsize,
    pub exhausted_events: AtomicUsize,
    pub wait_events: AtomicUsize,
    pub close_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, active: usize, idle: usize, max_active: usize) -> PoolMetrics {
        let utilization = if max_active > 0 {
            active as f64 / max_active as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_dialed: self.dialed.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            total_reused: self.reused.load(Ordering::Relaxed),
            total_destroyed: self.destroyed.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            lifetime_expirations: self.lifetime_expirations.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            wait_events: self.wait_events.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            active_clients: active,
            idle_clients: idle,
            utilization,
            max_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization() {
        let tracker = MetricsTracker::new();
        MetricsTracker::incr(&tracker.dialed);
        MetricsTracker::incr(&tracker.dialed);

        let metrics = tracker.get_metrics(2, 1, 4);
        assert_eq!(metrics.total_dialed, 2);
        assert!((metrics.utilization - 0.5).abs() < f64::EPSILON);

        let unbounded = tracker.get_metrics(2, 1, 0);
        assert_eq!(unbounded.utilization, 0.0);
    }

    #[test]
    fn test_export_keys() {
        let exported = MetricsTracker::new().get_metrics(1, 0, 2).export();
        assert_eq!(exported.get("active_clients").map(String::as_str), Some("1"));
        assert_eq!(exported.get("utilization").map(String::as_str), Some("0.50"));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_export() {
        let tracker = MetricsTracker::new();
        MetricsTracker::incr(&tracker.exhausted_events);
        let metrics = tracker.get_metrics(3, 1, 3);

        let output = MetricsExporter::export_prometheus(&metrics, "mysql", None).unwrap();
        assert!(output.contains("# TYPE clientpool_clients_active gauge"));
        assert!(output.contains("clientpool_clients_active{pool=\"mysql\"} 3"));
        assert!(output.contains("clientpool_events_exhausted_total{pool=\"mysql\"} 1"));
    }
}
