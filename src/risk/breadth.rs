//! Breadth reallocation between a fixed symbol pair
//!
//! Breadth is an enhancement, not a hard guard: missing data or a failed
//! calculation yields the neutral multiplier 1.0.

use super::rolling::symbol_key;
use crate::clock::Clock;
use crate::config::BreadthConfig;
use crate::errors::{RiskCoreError, RiskResult};
use crate::logger::{self, LogTag};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Pair risk budget stays constant at a neutral 50/50 split
const PAIR_BUDGET_SCALE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthMetrics {
    pub symbol: String,
    /// Advance/decline ratio in [-1, 1]
    pub advance_decline_ratio: f64,
    /// Volume relative to normal, >= 0
    pub volume_ratio: f64,
    /// Momentum in [-1, 1]
    pub momentum_score: f64,
    pub last_update: DateTime<Utc>,
}

pub struct BreadthReallocationService {
    config: BreadthConfig,
    clock: Arc<dyn Clock>,
    metrics: Mutex<HashMap<String, BreadthMetrics>>,
}

impl BreadthReallocationService {
    /// Create the service; weights that do not sum to 1.0 refuse to start
    pub fn new(config: BreadthConfig, clock: Arc<dyn Clock>) -> RiskResult<Self> {
        config.validate()?;
        logger::info(
            LogTag::Breadth,
            &format!(
                "Breadth reallocation ready for {}/{} (allocation {:.2}..{:.2})",
                config.primary_symbol,
                config.secondary_symbol,
                config.min_allocation_factor,
                config.max_allocation_factor
            ),
        );
        Ok(Self {
            config,
            clock,
            metrics: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &BreadthConfig {
        &self.config
    }

    /// Replace the breadth observation for `symbol`
    ///
    /// Invalid observations are rejected with an error rather than dropped.
    pub async fn update_breadth_metrics(
        &self,
        symbol: &str,
        advance_decline_ratio: f64,
        volume_ratio: f64,
        momentum_score: f64,
    ) -> RiskResult<()> {
        let key = symbol_key(symbol);
        let validation = validate_observation(&key, advance_decline_ratio, volume_ratio, momentum_score);
        if let Err(e) = validation {
            logger::error(
                LogTag::Breadth,
                &format!("Rejected breadth update for '{}': {}", symbol, e),
            );
            return Err(e);
        }

        let metrics = BreadthMetrics {
            symbol: key.clone(),
            advance_decline_ratio,
            volume_ratio,
            momentum_score,
            last_update: self.clock.now(),
        };
        self.metrics.lock().insert(key.clone(), metrics);

        logger::debug(
            LogTag::Breadth,
            &format!(
                "{} breadth: ad={:.3} vol={:.3} mom={:.3}",
                key, advance_decline_ratio, volume_ratio, momentum_score
            ),
        );
        Ok(())
    }

    /// Size multiplier for `symbol` relative to its pair partner
    pub async fn calculate_position_multiplier(&self, symbol: &str, base_size: f64) -> f64 {
        let result = {
            let metrics = self.metrics.lock();
            self.multiplier_locked(&metrics, symbol, base_size)
        };

        match result {
            Ok(multiplier) => multiplier,
            Err(e) => {
                logger::error(
                    LogTag::Breadth,
                    &format!(
                        "[AUDIT-VIOLATION] Breadth multiplier failed for {}: {} - using neutral 1.0",
                        symbol, e
                    ),
                );
                1.0
            }
        }
    }

    pub async fn get_metrics(&self, symbol: &str) -> Option<BreadthMetrics> {
        self.metrics.lock().get(&symbol_key(symbol)).cloned()
    }

    /// Weighted strength score in [0, 1]
    pub fn strength_score(&self, metrics: &BreadthMetrics) -> f64 {
        let ad = (metrics.advance_decline_ratio + 1.0) / 2.0;
        let volume = (metrics.volume_ratio / 2.0).clamp(0.0, 1.0);
        let momentum = (metrics.momentum_score + 1.0) / 2.0;
        self.config.advance_decline_weight * ad
            + self.config.volume_weight * volume
            + self.config.momentum_weight * momentum
    }

    fn multiplier_locked(
        &self,
        metrics: &HashMap<String, BreadthMetrics>,
        symbol: &str,
        base_size: f64,
    ) -> RiskResult<f64> {
        if !base_size.is_finite() {
            return Err(RiskCoreError::InvalidArgument(format!(
                "base size must be finite, got {}",
                base_size
            )));
        }

        let key = symbol_key(symbol);
        let primary = symbol_key(&self.config.primary_symbol);
        let secondary = symbol_key(&self.config.secondary_symbol);
        if key != primary && key != secondary {
            logger::debug(
                LogTag::Breadth,
                &format!("{} is outside the {}/{} pair, neutral", key, primary, secondary),
            );
            return Ok(1.0);
        }

        let now = self.clock.now();
        let max_age = Duration::minutes(self.config.max_metric_age_minutes);
        let fresh = |k: &str| {
            metrics
                .get(k)
                .filter(|m| now - m.last_update <= max_age)
        };
        let (Some(primary_metrics), Some(secondary_metrics)) = (fresh(&primary), fresh(&secondary))
        else {
            logger::debug(
                LogTag::Breadth,
                &format!("Breadth for {}/{} incomplete or stale, neutral", primary, secondary),
            );
            return Ok(1.0);
        };

        let primary_strength = self.strength_score(primary_metrics);
        let secondary_strength = self.strength_score(secondary_metrics);
        let total_strength = primary_strength + secondary_strength;
        if !total_strength.is_finite() {
            return Err(RiskCoreError::Computation(format!(
                "total breadth strength is not finite for {}/{}",
                primary, secondary
            )));
        }
        if total_strength <= 0.0 {
            return Ok(1.0);
        }

        let symbol_strength = if key == primary {
            primary_strength
        } else {
            secondary_strength
        };
        let allocation_factor = symbol_strength / total_strength;
        let multiplier = (allocation_factor * PAIR_BUDGET_SCALE).clamp(
            self.config.min_allocation_factor,
            self.config.max_allocation_factor,
        );

        logger::debug(
            LogTag::Breadth,
            &format!(
                "{} strength {:.3}/{:.3} allocation {:.3} multiplier {:.3} (base {:.2})",
                key, symbol_strength, total_strength, allocation_factor, multiplier, base_size
            ),
        );
        Ok(multiplier)
    }
}

fn validate_observation(
    key: &str,
    advance_decline_ratio: f64,
    volume_ratio: f64,
    momentum_score: f64,
) -> RiskResult<()> {
    if key.is_empty() {
        return Err(RiskCoreError::InvalidArgument("empty symbol".to_string()));
    }
    if !advance_decline_ratio.is_finite() || !(-1.0..=1.0).contains(&advance_decline_ratio) {
        return Err(RiskCoreError::InvalidArgument(format!(
            "advance/decline ratio must be in [-1, 1], got {}",
            advance_decline_ratio
        )));
    }
    if !volume_ratio.is_finite() || volume_ratio < 0.0 {
        return Err(RiskCoreError::InvalidArgument(format!(
            "volume ratio must be >= 0, got {}",
            volume_ratio
        )));
    }
    if !momentum_score.is_finite() || !(-1.0..=1.0).contains(&momentum_score) {
        return Err(RiskCoreError::InvalidArgument(format!(
            "momentum score must be in [-1, 1], got {}",
            momentum_score
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn service_with(config: BreadthConfig) -> (BreadthReallocationService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()));
        let svc = BreadthReallocationService::new(config, clock.clone()).unwrap();
        (svc, clock)
    }

    fn service() -> (BreadthReallocationService, Arc<ManualClock>) {
        service_with(BreadthConfig::default())
    }

    #[tokio::test]
    async fn test_equal_strength_is_neutral() {
        let (svc, _clock) = service();
        svc.update_breadth_metrics("ES", 0.2, 1.1, 0.3).await.unwrap();
        svc.update_breadth_metrics("NQ", 0.2, 1.1, 0.3).await.unwrap();

        assert!((svc.calculate_position_multiplier("ES", 1.0).await - 1.0).abs() < 1e-12);
        assert!((svc.calculate_position_multiplier("NQ", 1.0).await - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_double_strength_shifts_allocation() {
        let (svc, _clock) = service();
        svc.update_breadth_metrics("ES", 1.0, 2.0, 1.0).await.unwrap();
        svc.update_breadth_metrics("NQ", 0.0, 1.0, 0.0).await.unwrap();

        let es = svc.calculate_position_multiplier("ES", 2.0).await;
        let nq = svc.calculate_position_multiplier("NQ", 2.0).await;
        assert!((es - 4.0 / 3.0).abs() < 1e-9);
        assert!((nq - 2.0 / 3.0).abs() < 1e-9);
        assert!((es + nq - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_allocation_is_bounded() {
        let (svc, _clock) = service_with(BreadthConfig {
            max_allocation_factor: 1.2,
            min_allocation_factor: 0.9,
            ..BreadthConfig::default()
        });
        svc.update_breadth_metrics("ES", 1.0, 2.0, 1.0).await.unwrap();
        svc.update_breadth_metrics("NQ", 0.0, 1.0, 0.0).await.unwrap();

        assert_eq!(svc.calculate_position_multiplier("ES", 1.0).await, 1.2);
        assert_eq!(svc.calculate_position_multiplier("NQ", 1.0).await, 0.9);
    }

    #[tokio::test]
    async fn test_missing_or_stale_partner_is_neutral() {
        let (svc, clock) = service();
        svc.update_breadth_metrics("ES", 1.0, 2.0, 1.0).await.unwrap();
        assert_eq!(svc.calculate_position_multiplier("ES", 1.0).await, 1.0);

        svc.update_breadth_metrics("NQ", -1.0, 0.0, -1.0).await.unwrap();
        assert!(svc.calculate_position_multiplier("ES", 1.0).await > 1.0);

        clock.advance(Duration::minutes(16));
        assert_eq!(svc.calculate_position_multiplier("ES", 1.0).await, 1.0);
    }

    #[tokio::test]
    async fn test_last_value_wins() {
        let (svc, _clock) = service();
        svc.update_breadth_metrics("es", 0.5, 1.0, 0.5).await.unwrap();
        svc.update_breadth_metrics("ES", -0.5, 1.0, -0.5).await.unwrap();
        let metrics = svc.get_metrics("Es").await.unwrap();
        assert_eq!(metrics.symbol, "ES");
        assert_eq!(metrics.advance_decline_ratio, -0.5);
        assert_eq!(metrics.momentum_score, -0.5);
    }

    #[tokio::test]
    async fn test_invalid_update_propagates_and_keeps_previous() {
        let (svc, _clock) = service();
        svc.update_breadth_metrics("ES", 0.1, 1.0, 0.1).await.unwrap();

        assert!(svc.update_breadth_metrics("ES", 1.5, 1.0, 0.0).await.is_err());
        assert!(svc.update_breadth_metrics("ES", 0.0, -0.1, 0.0).await.is_err());
        assert!(svc.update_breadth_metrics("ES", 0.0, 1.0, f64::NAN).await.is_err());
        assert!(svc.update_breadth_metrics("", 0.0, 1.0, 0.0).await.is_err());

        assert_eq!(svc.get_metrics("ES").await.unwrap().advance_decline_ratio, 0.1);
    }

    #[tokio::test]
    async fn test_symbol_outside_pair_is_neutral() {
        let (svc, _clock) = service();
        svc.update_breadth_metrics("ES", 1.0, 2.0, 1.0).await.unwrap();
        svc.update_breadth_metrics("NQ", 0.0, 1.0, 0.0).await.unwrap();
        assert_eq!(svc.calculate_position_multiplier("CL", 1.0).await, 1.0);
        assert_eq!(svc.calculate_position_multiplier("ES", f64::INFINITY).await, 1.0);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let config = BreadthConfig {
            advance_decline_weight: 0.5,
            volume_weight: 0.5,
            momentum_weight: 0.5,
            ..BreadthConfig::default()
        };
        let err = BreadthReallocationService::new(config, clock).err().unwrap();
        assert!(err.is_configuration());
    }
}
