/// Correlation-aware position cap configuration
use crate::config_struct;
use crate::ensure_config;
use crate::errors::RiskResult;

use super::MAX_WINDOW_MINUTES;

config_struct! {
    pub struct CorrelationConfig {
        /// |correlation| above this starts reducing size
        correlation_threshold: f64 = 0.7,
        /// Sliding window for price history
        correlation_window_minutes: i64 = 30,
        /// Minimum prices per symbol before a correlation is computed
        min_data_points: usize = 10,
        /// Correlation assumed when data is insufficient or degenerate
        safe_correlation_value: f64 = 0.0,
        /// Reduction applied at |correlation| == 1.0
        max_reduction_amount: f64 = 0.8,
        /// Floor for the returned multiplier
        min_reduction_factor: f64 = 0.3,
        /// Multiplier returned when the calculation fails
        default_reduction_factor: f64 = 0.5,
        /// Hard cap on retained prices per symbol
        max_history_points: usize = 5000,
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> RiskResult<()> {
        ensure_config!(
            self.correlation_threshold > 0.0 && self.correlation_threshold < 1.0,
            "correlation.correlation_threshold",
            "must be in (0, 1), got {}",
            self.correlation_threshold
        );
        ensure_config!(
            self.correlation_window_minutes > 0
                && self.correlation_window_minutes <= MAX_WINDOW_MINUTES,
            "correlation.correlation_window_minutes",
            "must be in [1, {}], got {}",
            MAX_WINDOW_MINUTES,
            self.correlation_window_minutes
        );
        ensure_config!(
            self.min_data_points >= 3,
            "correlation.min_data_points",
            "at least 3 prices are needed for two returns, got {}",
            self.min_data_points
        );
        ensure_config!(
            (-1.0..=1.0).contains(&self.safe_correlation_value),
            "correlation.safe_correlation_value",
            "must be in [-1, 1], got {}",
            self.safe_correlation_value
        );
        ensure_config!(
            self.max_reduction_amount > 0.0 && self.max_reduction_amount <= 1.0,
            "correlation.max_reduction_amount",
            "must be in (0, 1], got {}",
            self.max_reduction_amount
        );
        ensure_config!(
            self.min_reduction_factor > 0.0 && self.min_reduction_factor <= 1.0,
            "correlation.min_reduction_factor",
            "must be in (0, 1], got {}",
            self.min_reduction_factor
        );
        ensure_config!(
            self.default_reduction_factor >= self.min_reduction_factor
                && self.default_reduction_factor < 1.0,
            "correlation.default_reduction_factor",
            "must be in [min_reduction_factor, 1), got {}",
            self.default_reduction_factor
        );
        ensure_config!(
            self.max_history_points >= self.min_data_points,
            "correlation.max_history_points",
            "must be >= min_data_points ({}), got {}",
            self.min_data_points,
            self.max_history_points
        );
        Ok(())
    }
}
