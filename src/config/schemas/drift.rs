/// Feature drift monitor configuration
use crate::config_struct;
use crate::ensure_config;
use crate::errors::RiskResult;

use super::MAX_WINDOW_MINUTES;

config_struct! {
    pub struct DriftConfig {
        /// Features whose absence vetoes trading outright
        critical_features: Vec<String> = vec![
            "price".to_string(),
            "volume".to_string(),
            "atr".to_string(),
        ],
        /// Threshold for the simplified KS statistic
        ks_threshold: f64 = 0.3,
        /// Threshold for the simplified PSI statistic
        psi_threshold: f64 = 0.25,
        /// Drift violations tolerated before trading is denied
        max_drift_violations: usize = 2,
        /// Values required to freeze a baseline
        min_baseline_data_points: usize = 50,
        /// Recent values required before drift is evaluated
        min_drift_data_points: usize = 20,
        /// Cap on the rolling window length per feature
        max_recent_values: usize = 500,
        /// Time window for recent values
        rolling_window_minutes: i64 = 60,
    }
}

impl DriftConfig {
    pub fn validate(&self) -> RiskResult<()> {
        ensure_config!(
            !self.critical_features.is_empty(),
            "drift.critical_features",
            "critical feature list must not be empty"
        );
        ensure_config!(
            self.critical_features.iter().all(|f| !f.trim().is_empty()),
            "drift.critical_features",
            "critical feature names must not be blank"
        );
        ensure_config!(
            self.ks_threshold > 0.0 && self.ks_threshold.is_finite(),
            "drift.ks_threshold",
            "must be positive, got {}",
            self.ks_threshold
        );
        ensure_config!(
            self.psi_threshold > 0.0 && self.psi_threshold.is_finite(),
            "drift.psi_threshold",
            "must be positive, got {}",
            self.psi_threshold
        );
        ensure_config!(
            self.min_baseline_data_points >= 2,
            "drift.min_baseline_data_points",
            "must be at least 2, got {}",
            self.min_baseline_data_points
        );
        ensure_config!(
            self.min_drift_data_points >= 2,
            "drift.min_drift_data_points",
            "must be at least 2, got {}",
            self.min_drift_data_points
        );
        ensure_config!(
            self.max_recent_values >= self.min_drift_data_points,
            "drift.max_recent_values",
            "must be >= min_drift_data_points ({}), got {}",
            self.min_drift_data_points,
            self.max_recent_values
        );
        ensure_config!(
            self.rolling_window_minutes > 0
                && self.rolling_window_minutes <= MAX_WINDOW_MINUTES,
            "drift.rolling_window_minutes",
            "must be in [1, {}], got {}",
            MAX_WINDOW_MINUTES,
            self.rolling_window_minutes
        );
        Ok(())
    }
}
