// Delivery configuration knobs
//
// DeliveryConfig is an env-driven configuration struct that can be:
// - Created directly for standalone usage and tests
// - Loaded from environment variables in the server and subscriber binaries
//
// All knobs are simple scalars; none of them participate in the hard logic.

use std::time::Duration;

/// Tunables for the distribution pipeline
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// How long event records are retained before the sweeper may evict them
    pub retention_secs: u64,
    /// Interval between sweeper passes
    pub sweep_interval_secs: u64,
    /// Interval between poll-fallback snapshot fetches
    pub poll_interval_secs: u64,
    /// Pause before dispatching revalidation callbacks, absorbing upstream
    /// read-after-write lag
    pub settling_delay_ms: u64,
    /// Hard per-call deadline for revalidation callbacks
    pub revalidation_timeout_secs: u64,
    /// Top-N window size pushed to subscribers on each store change
    pub push_window: usize,
    /// Consecutive connect failures before the subscriber falls back to polling
    pub fallback_threshold: u32,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl DeliveryConfig {
    /// Load configuration from environment variables, falling back to the
    /// reference defaults for anything unset
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            retention_secs: env_u64("FRESHWIRE_RETENTION_SECS", defaults.retention_secs),
            sweep_interval_secs: env_u64(
                "FRESHWIRE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            poll_interval_secs: env_u64("FRESHWIRE_POLL_INTERVAL_SECS", defaults.poll_interval_secs),
            settling_delay_ms: env_u64("FRESHWIRE_SETTLING_DELAY_MS", defaults.settling_delay_ms),
            revalidation_timeout_secs: env_u64(
                "FRESHWIRE_REVALIDATION_TIMEOUT_SECS",
                defaults.revalidation_timeout_secs,
            ),
            push_window: env_u64("FRESHWIRE_PUSH_WINDOW", defaults.push_window as u64) as usize,
            fallback_threshold: env_u64(
                "FRESHWIRE_FALLBACK_THRESHOLD",
                defaults.fallback_threshold as u64,
            ) as u32,
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settling_delay(&self) -> Duration {
        Duration::from_millis(self.settling_delay_ms)
    }

    pub fn revalidation_timeout(&self) -> Duration {
        Duration::from_secs(self.revalidation_timeout_secs)
    }

    /// Set the settling delay
    pub fn with_settling_delay(mut self, delay: Duration) -> Self {
        self.settling_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the revalidation timeout
    pub fn with_revalidation_timeout(mut self, timeout: Duration) -> Self {
        self.revalidation_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the retention window
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_secs = retention.as_secs();
        self
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            sweep_interval_secs: 300,
            poll_interval_secs: 5,
            settling_delay_ms: 2000,
            revalidation_timeout_secs: 5,
            push_window: 10,
            fallback_threshold: 5,
        }
    }
}
