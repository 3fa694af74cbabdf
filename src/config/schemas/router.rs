/// Decision router configuration
use crate::config_struct;
use crate::ensure_config;
use crate::errors::RiskResult;

config_struct! {
    pub struct RouterConfig {
        /// Decisions retained for outcome feedback
        history_capacity: usize = 1000,
        /// Per-source deadline; a source that misses it abstains
        source_timeout_ms: u64 = 5000,
        /// Routing calls kept for latency statistics
        latency_window: usize = 100,
        /// p99 latency that triggers a warning
        latency_warn_ms: f64 = 250.0,
    }
}

impl RouterConfig {
    pub fn validate(&self) -> RiskResult<()> {
        ensure_config!(
            self.history_capacity > 0,
            "router.history_capacity",
            "must be positive"
        );
        ensure_config!(
            self.source_timeout_ms > 0,
            "router.source_timeout_ms",
            "must be positive"
        );
        ensure_config!(
            self.latency_window > 0,
            "router.latency_window",
            "must be positive"
        );
        ensure_config!(
            self.latency_warn_ms > 0.0,
            "router.latency_warn_ms",
            "must be positive, got {}",
            self.latency_warn_ms
        );
        Ok(())
    }
}
