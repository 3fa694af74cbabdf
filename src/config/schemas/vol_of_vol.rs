/// Vol-of-vol guard configuration
use crate::config_struct;
use crate::ensure_config;
use crate::errors::RiskResult;

use super::MAX_WINDOW_MINUTES;

config_struct! {
    pub struct VolOfVolConfig {
        /// Standard deviation of ATR above which a spike is flagged
        vol_of_vol_threshold: f64 = 0.02,
        /// Sliding window for ATR history
        window_minutes: i64 = 60,
        /// Minimum ATR samples before vol-of-vol is computed
        min_data_points: usize = 12,
        /// Vol-of-vol assumed while data is insufficient
        safe_vol_of_vol_value: f64 = 0.0,
        /// Position size multiplier during a spike (< 1.0)
        spike_position_size_multiplier: f64 = 0.5,
        /// Stop-loss distance multiplier during a spike (> 1.0)
        spike_stop_loss_multiplier: f64 = 1.5,
        /// Entry offset tightening during a spike (< 1.0)
        spike_offset_tightening: f64 = 0.7,
        /// Hard cap on retained ATR samples per symbol
        max_history_points: usize = 5000,
    }
}

impl VolOfVolConfig {
    pub fn validate(&self) -> RiskResult<()> {
        ensure_config!(
            self.vol_of_vol_threshold > 0.0 && self.vol_of_vol_threshold.is_finite(),
            "vol_of_vol.vol_of_vol_threshold",
            "must be positive, got {}",
            self.vol_of_vol_threshold
        );
        ensure_config!(
            self.window_minutes > 0 && self.window_minutes <= MAX_WINDOW_MINUTES,
            "vol_of_vol.window_minutes",
            "must be in [1, {}], got {}",
            MAX_WINDOW_MINUTES,
            self.window_minutes
        );
        ensure_config!(
            self.min_data_points >= 2,
            "vol_of_vol.min_data_points",
            "must be at least 2, got {}",
            self.min_data_points
        );
        ensure_config!(
            self.safe_vol_of_vol_value >= 0.0 && self.safe_vol_of_vol_value.is_finite(),
            "vol_of_vol.safe_vol_of_vol_value",
            "must be a non-negative number, got {}",
            self.safe_vol_of_vol_value
        );
        ensure_config!(
            self.spike_position_size_multiplier > 0.0 && self.spike_position_size_multiplier < 1.0,
            "vol_of_vol.spike_position_size_multiplier",
            "must be in (0, 1), got {}",
            self.spike_position_size_multiplier
        );
        ensure_config!(
            self.spike_stop_loss_multiplier > 1.0 && self.spike_stop_loss_multiplier.is_finite(),
            "vol_of_vol.spike_stop_loss_multiplier",
            "must be greater than 1, got {}",
            self.spike_stop_loss_multiplier
        );
        ensure_config!(
            self.spike_offset_tightening > 0.0 && self.spike_offset_tightening < 1.0,
            "vol_of_vol.spike_offset_tightening",
            "must be in (0, 1), got {}",
            self.spike_offset_tightening
        );
        ensure_config!(
            self.max_history_points >= self.min_data_points,
            "vol_of_vol.max_history_points",
            "must be >= min_data_points ({}), got {}",
            self.min_data_points,
            self.max_history_points
        );
        Ok(())
    }
}
