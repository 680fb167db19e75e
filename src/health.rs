//! Health monitoring for client pools

/// Health status of a client pool
///
/// # Examples
///
/// ```
/// use client_pool::{ClientPool, PoolConfiguration};
///
/// let config = PoolConfiguration::new().with_max_active(4);
/// let pool = ClientPool::new(|| Ok("conn"), |_| Ok(()), config);
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_clients, 0);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0), 0 when unbounded
    pub utilization: f64,

    /// Idle clients count
    pub idle_clients: usize,

    /// Active clients count
    pub active_clients: usize,

    /// Maximum active clients, 0 when unbounded
    pub max_active: usize,

    /// Whether the pool has been released
    pub closed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(idle: usize, active: usize, max_active: usize, closed: bool) -> Self {
        let utilization = if max_active > 0 {
            active as f64 / max_active as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if closed {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if idle == 0 && active > 0 {
            warnings.push("No idle clients".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_clients: idle,
            active_clients: active,
            max_active,
            closed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
