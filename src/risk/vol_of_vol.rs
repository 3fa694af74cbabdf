//! Vol-of-vol guard
//!
//! Tracks ATR per symbol and treats a jump in the dispersion of ATR as a
//! volatility spike: smaller size, wider stops, tighter entry offsets. Errors
//! are treated as a spike.

use super::rolling::{std_dev, symbol_key, RollingSeries};
use crate::clock::Clock;
use crate::config::VolOfVolConfig;
use crate::errors::{RiskCoreError, RiskResult};
use crate::logger::{self, LogTag};
use chrono::Duration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolOfVolAdjustment {
    pub position_size_multiplier: f64,
    pub stop_loss_multiplier: f64,
    pub offset_tightening: f64,
    pub is_volatility_spike: bool,
    pub vol_of_vol_value: f64,
}

impl VolOfVolAdjustment {
    /// No adjustment
    pub fn identity(vol_of_vol_value: f64) -> Self {
        Self {
            position_size_multiplier: 1.0,
            stop_loss_multiplier: 1.0,
            offset_tightening: 1.0,
            is_volatility_spike: false,
            vol_of_vol_value,
        }
    }

    pub fn spike(config: &VolOfVolConfig, vol_of_vol_value: f64) -> Self {
        Self {
            position_size_multiplier: config.spike_position_size_multiplier,
            stop_loss_multiplier: config.spike_stop_loss_multiplier,
            offset_tightening: config.spike_offset_tightening,
            is_volatility_spike: true,
            vol_of_vol_value,
        }
    }
}

pub struct VolOfVolGuardService {
    config: VolOfVolConfig,
    clock: Arc<dyn Clock>,
    atr_history: Mutex<HashMap<String, RollingSeries<f64>>>,
}

impl VolOfVolGuardService {
    pub fn new(config: VolOfVolConfig, clock: Arc<dyn Clock>) -> RiskResult<Self> {
        config.validate()?;
        logger::info(
            LogTag::VolOfVol,
            &format!(
                "Vol-of-vol guard ready: threshold={} window={}m min_points={}",
                config.vol_of_vol_threshold, config.window_minutes, config.min_data_points
            ),
        );
        Ok(Self {
            config,
            clock,
            atr_history: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &VolOfVolConfig {
        &self.config
    }

    /// Record `current_atr` and return the adjustment for `symbol`
    pub async fn calculate_vol_of_vol_adjustment(
        &self,
        symbol: &str,
        current_atr: f64,
    ) -> VolOfVolAdjustment {
        let result = {
            let mut history = self.atr_history.lock();
            self.record_and_measure(&mut history, symbol, current_atr)
        };

        match result {
            Ok(vol_of_vol) if vol_of_vol > self.config.vol_of_vol_threshold => {
                logger::warning(
                    LogTag::VolOfVol,
                    &format!(
                        "Volatility spike on {}: vol-of-vol {:.4} > {:.4}, size x{:.2} stop x{:.2}",
                        symbol,
                        vol_of_vol,
                        self.config.vol_of_vol_threshold,
                        self.config.spike_position_size_multiplier,
                        self.config.spike_stop_loss_multiplier
                    ),
                );
                VolOfVolAdjustment::spike(&self.config, vol_of_vol)
            }
            Ok(vol_of_vol) => {
                logger::debug(
                    LogTag::VolOfVol,
                    &format!("{} vol-of-vol {:.4}: no adjustment", symbol, vol_of_vol),
                );
                VolOfVolAdjustment::identity(vol_of_vol)
            }
            Err(e) => {
                logger::error(
                    LogTag::VolOfVol,
                    &format!(
                        "[AUDIT-VIOLATION] Vol-of-vol calculation failed for {}: {} - assuming spike",
                        symbol, e
                    ),
                );
                VolOfVolAdjustment::spike(&self.config, f64::NAN)
            }
        }
    }

    /// Vol-of-vol over the current window without recording anything
    pub async fn current_vol_of_vol(&self, symbol: &str) -> Option<f64> {
        let now = self.clock.now();
        let mut history = self.atr_history.lock();
        let series = history.get_mut(&symbol_key(symbol))?;
        series.prune(now);
        if series.len() < self.config.min_data_points {
            return None;
        }
        std_dev(&series.values())
    }

    pub async fn sample_count(&self, symbol: &str) -> usize {
        self.atr_history
            .lock()
            .get(&symbol_key(symbol))
            .map_or(0, |s| s.len())
    }

    fn record_and_measure(
        &self,
        history: &mut HashMap<String, RollingSeries<f64>>,
        symbol: &str,
        current_atr: f64,
    ) -> RiskResult<f64> {
        let key = symbol_key(symbol);
        if key.is_empty() {
            return Err(RiskCoreError::InvalidArgument("empty symbol".to_string()));
        }
        if !current_atr.is_finite() || current_atr < 0.0 {
            return Err(RiskCoreError::InvalidArgument(format!(
                "ATR must be a non-negative number, got {}",
                current_atr
            )));
        }

        let now = self.clock.now();
        let window = Duration::minutes(self.config.window_minutes);
        let series = history
            .entry(key.clone())
            .or_insert_with(|| RollingSeries::new(window, self.config.max_history_points));
        series.upsert_latest(current_atr, now);
        series.prune(now);

        if series.len() < self.config.min_data_points {
            logger::debug(
                LogTag::VolOfVol,
                &format!(
                    "Insufficient ATR history for {} ({} < {}), using safe vol-of-vol {}",
                    key,
                    series.len(),
                    self.config.min_data_points,
                    self.config.safe_vol_of_vol_value
                ),
            );
            return Ok(self.config.safe_vol_of_vol_value);
        }

        let vol_of_vol = std_dev(&series.values())
            .ok_or_else(|| RiskCoreError::Computation("empty ATR series".to_string()))?;
        if !vol_of_vol.is_finite() {
            return Err(RiskCoreError::Computation(format!(
                "vol-of-vol is not finite for {}",
                key
            )));
        }
        Ok(vol_of_vol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn service() -> (VolOfVolGuardService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap(),
        ));
        let svc = VolOfVolGuardService::new(VolOfVolConfig::default(), clock.clone()).unwrap();
        (svc, clock)
    }

    async fn push(svc: &VolOfVolGuardService, clock: &ManualClock, atr: f64) -> VolOfVolAdjustment {
        clock.advance(Duration::seconds(60));
        svc.calculate_vol_of_vol_adjustment("ES", atr).await
    }

    #[tokio::test]
    async fn test_flat_atr_then_alternating_spike() {
        let (svc, clock) = service();

        let mut last = VolOfVolAdjustment::identity(0.0);
        for _ in 0..12 {
            last = push(&svc, &clock, 5.0).await;
        }
        assert!(!last.is_volatility_spike);
        assert_eq!(last.vol_of_vol_value, 0.0);
        assert_eq!(last, VolOfVolAdjustment::identity(0.0));

        for i in 0..12 {
            last = push(&svc, &clock, if i % 2 == 0 { 5.0 } else { 25.0 }).await;
        }
        assert!(last.is_volatility_spike);
        assert!(last.vol_of_vol_value > 5.0);
        assert_eq!(last.position_size_multiplier, 0.5);
        assert_eq!(last.stop_loss_multiplier, 1.5);
        assert_eq!(last.offset_tightening, 0.7);
    }

    #[tokio::test]
    async fn test_insufficient_samples_never_spike() {
        let (svc, clock) = service();
        for i in 0..11 {
            let adj = push(&svc, &clock, if i % 2 == 0 { 1.0 } else { 50.0 }).await;
            assert!(!adj.is_volatility_spike);
            assert_eq!(adj.vol_of_vol_value, 0.0);
        }
        assert_eq!(svc.current_vol_of_vol("ES").await, None);
    }

    #[tokio::test]
    async fn test_repeated_call_without_elapsed_time_is_idempotent() {
        let (svc, clock) = service();
        for i in 0..15 {
            push(&svc, &clock, 5.0 + i as f64 * 0.1).await;
        }
        clock.advance(Duration::seconds(60));
        let first = svc.calculate_vol_of_vol_adjustment("ES", 6.0).await;
        let second = svc.calculate_vol_of_vol_adjustment("ES", 6.0).await;
        assert_eq!(first.vol_of_vol_value, second.vol_of_vol_value);
        assert_eq!(svc.sample_count("es").await, 16);
    }

    #[tokio::test]
    async fn test_old_samples_leave_the_window() {
        let (svc, clock) = service();
        for i in 0..12 {
            push(&svc, &clock, if i % 2 == 0 { 5.0 } else { 25.0 }).await;
        }
        assert!(svc.current_vol_of_vol("ES").await.unwrap() > 1.0);

        clock.advance(Duration::minutes(61));
        let adj = svc.calculate_vol_of_vol_adjustment("ES", 5.0).await;
        assert!(!adj.is_volatility_spike);
        assert_eq!(svc.sample_count("ES").await, 1);
    }

    #[tokio::test]
    async fn test_invalid_atr_fails_closed_as_spike() {
        let (svc, _clock) = service();
        let adj = svc.calculate_vol_of_vol_adjustment("ES", f64::NAN).await;
        assert!(adj.is_volatility_spike);
        assert!(adj.vol_of_vol_value.is_nan());
        assert_eq!(adj.position_size_multiplier, 0.5);

        let adj = svc.calculate_vol_of_vol_adjustment("", 5.0).await;
        assert!(adj.is_volatility_spike);
    }

    #[tokio::test]
    async fn test_safe_value_override_is_used_while_warming_up() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        let config = VolOfVolConfig {
            safe_vol_of_vol_value: 0.5,
            ..VolOfVolConfig::default()
        };
        let svc = VolOfVolGuardService::new(config, clock).unwrap();
        let adj = svc.calculate_vol_of_vol_adjustment("NQ", 20.0).await;
        assert!(adj.is_volatility_spike);
        assert_eq!(adj.vol_of_vol_value, 0.5);
    }
}
