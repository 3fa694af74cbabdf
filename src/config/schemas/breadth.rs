/// Breadth reallocation configuration
use crate::config_struct;
use crate::ensure_config;
use crate::errors::RiskResult;

use super::MAX_WINDOW_MINUTES;

/// Tolerance for the weight-sum check
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

config_struct! {
    pub struct BreadthConfig {
        /// First symbol of the reallocation pair
        primary_symbol: String = "ES".to_string(),
        /// Second symbol of the reallocation pair
        secondary_symbol: String = "NQ".to_string(),
        advance_decline_weight: f64 = 0.4,
        volume_weight: f64 = 0.3,
        momentum_weight: f64 = 0.3,
        min_allocation_factor: f64 = 0.5,
        max_allocation_factor: f64 = 1.5,
        /// Metrics older than this are treated as missing
        max_metric_age_minutes: i64 = 15,
    }
}

impl BreadthConfig {
    pub fn weight_sum(&self) -> f64 {
        self.advance_decline_weight + self.volume_weight + self.momentum_weight
    }

    pub fn validate(&self) -> RiskResult<()> {
        ensure_config!(
            !self.primary_symbol.trim().is_empty() && !self.secondary_symbol.trim().is_empty(),
            "breadth.symbols",
            "both paired symbols must be set"
        );
        ensure_config!(
            !self.primary_symbol.eq_ignore_ascii_case(&self.secondary_symbol),
            "breadth.symbols",
            "paired symbols must differ, got {} twice",
            self.primary_symbol
        );
        for (field, weight) in [
            ("breadth.advance_decline_weight", self.advance_decline_weight),
            ("breadth.volume_weight", self.volume_weight),
            ("breadth.momentum_weight", self.momentum_weight),
        ] {
            ensure_config!(
                weight >= 0.0 && weight.is_finite(),
                field,
                "weight must be non-negative, got {}",
                weight
            );
        }
        ensure_config!(
            (self.weight_sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
            "breadth.weights",
            "weights must sum to 1.0, got {:.6}",
            self.weight_sum()
        );
        ensure_config!(
            self.min_allocation_factor > 0.0 && self.min_allocation_factor <= 1.0,
            "breadth.min_allocation_factor",
            "must be in (0, 1], got {}",
            self.min_allocation_factor
        );
        ensure_config!(
            self.max_allocation_factor >= 1.0 && self.max_allocation_factor.is_finite(),
            "breadth.max_allocation_factor",
            "must be >= 1, got {}",
            self.max_allocation_factor
        );
        ensure_config!(
            self.max_metric_age_minutes > 0
                && self.max_metric_age_minutes <= MAX_WINDOW_MINUTES,
            "breadth.max_metric_age_minutes",
            "must be in [1, {}], got {}",
            MAX_WINDOW_MINUTES,
            self.max_metric_age_minutes
        );
        Ok(())
    }
}
