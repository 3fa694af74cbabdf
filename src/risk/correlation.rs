//! Correlation-aware position cap
//!
//! Keeps a rolling price history per symbol and scales position size down when
//! two instruments move together. The cap fails closed: any calculation error
//! returns the configured default reduction, never "no constraint".

use super::rolling::{pearson, simple_returns, symbol_key, RollingSeries};
use crate::clock::Clock;
use crate::config::CorrelationConfig;
use crate::errors::{RiskCoreError, RiskResult};
use crate::logger::{self, LogTag};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CorrelationCapService {
    config: CorrelationConfig,
    clock: Arc<dyn Clock>,
    prices: Mutex<HashMap<String, RollingSeries<f64>>>,
}

impl CorrelationCapService {
    /// Create the service; an invalid configuration refuses to start
    pub fn new(config: CorrelationConfig, clock: Arc<dyn Clock>) -> RiskResult<Self> {
        config.validate()?;
        logger::info(
            LogTag::Correlation,
            &format!(
                "Correlation cap ready: threshold={:.2} window={}m min_points={}",
                config.correlation_threshold,
                config.correlation_window_minutes,
                config.min_data_points
            ),
        );
        Ok(Self {
            config,
            clock,
            prices: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Record a price and prune entries outside the correlation window
    pub async fn update_price_data(&self, symbol: &str, price: f64, timestamp: DateTime<Utc>) {
        let key = symbol_key(symbol);
        if key.is_empty() || !price.is_finite() {
            logger::warning(
                LogTag::Correlation,
                &format!("Ignoring invalid price update: symbol='{}' price={}", symbol, price),
            );
            return;
        }

        let now = self.clock.now();
        let window = Duration::minutes(self.config.correlation_window_minutes);
        let max_len = self.config.max_history_points;

        let mut prices = self.prices.lock();
        let series = prices
            .entry(key)
            .or_insert_with(|| RollingSeries::new(window, max_len));
        series.push(price, timestamp);
        series.prune(now);
    }

    /// Position-size multiplier for holding `symbol_a` and `symbol_b` together
    ///
    /// Returns a value in `[min_reduction_factor, 1.0]`.
    pub async fn check_correlation_constraint(
        &self,
        symbol_a: &str,
        symbol_b: &str,
        size_a: f64,
        size_b: f64,
    ) -> f64 {
        let result = {
            let mut prices = self.prices.lock();
            self.evaluate_locked(&mut prices, symbol_a, symbol_b, size_a, size_b)
        };

        match result {
            Ok(multiplier) => multiplier,
            Err(e) => {
                logger::error(
                    LogTag::Correlation,
                    &format!(
                        "[AUDIT-VIOLATION] Correlation check failed for {}/{}: {} - applying default reduction {:.2}",
                        symbol_a, symbol_b, e, self.config.default_reduction_factor
                    ),
                );
                self.config.default_reduction_factor
            }
        }
    }

    /// Current correlation between two symbols, if enough data exists
    pub async fn get_correlation(&self, symbol_a: &str, symbol_b: &str) -> Option<f64> {
        let mut prices = self.prices.lock();
        self.prune_all(&mut prices);
        let a = prices.get(&symbol_key(symbol_a))?;
        let b = prices.get(&symbol_key(symbol_b))?;
        if a.len() < self.config.min_data_points || b.len() < self.config.min_data_points {
            return None;
        }
        pearson(&simple_returns(&a.values()), &simple_returns(&b.values()))
    }

    pub async fn tracked_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.prices.lock().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    fn evaluate_locked(
        &self,
        prices: &mut HashMap<String, RollingSeries<f64>>,
        symbol_a: &str,
        symbol_b: &str,
        size_a: f64,
        size_b: f64,
    ) -> RiskResult<f64> {
        let key_a = symbol_key(symbol_a);
        let key_b = symbol_key(symbol_b);
        if key_a.is_empty() || key_b.is_empty() {
            return Err(RiskCoreError::InvalidArgument("empty symbol".to_string()));
        }
        if key_a == key_b {
            return Err(RiskCoreError::InvalidArgument(format!(
                "cannot correlate {} with itself",
                key_a
            )));
        }
        if !size_a.is_finite() || !size_b.is_finite() {
            return Err(RiskCoreError::InvalidArgument(format!(
                "non-finite position size ({}, {})",
                size_a, size_b
            )));
        }

        self.prune_all(prices);
        let correlation = self.correlation_locked(prices, &key_a, &key_b)?;
        if !correlation.is_finite() {
            return Err(RiskCoreError::Computation(format!(
                "correlation is not finite: {}",
                correlation
            )));
        }

        let multiplier = progressive_reduction(&self.config, correlation);
        if multiplier < 1.0 {
            logger::info(
                LogTag::Correlation,
                &format!(
                    "{}/{} correlation {:.3} > {:.2}: size multiplier {:.3} (sizes {:.2}/{:.2})",
                    key_a,
                    key_b,
                    correlation,
                    self.config.correlation_threshold,
                    multiplier,
                    size_a,
                    size_b
                ),
            );
        } else {
            logger::debug(
                LogTag::Correlation,
                &format!("{}/{} correlation {:.3}: no constraint", key_a, key_b, correlation),
            );
        }
        Ok(multiplier)
    }

    fn correlation_locked(
        &self,
        prices: &HashMap<String, RollingSeries<f64>>,
        key_a: &str,
        key_b: &str,
    ) -> RiskResult<f64> {
        let need = self.config.min_data_points;
        let have_a = prices.get(key_a).map_or(0, |s| s.len());
        let have_b = prices.get(key_b).map_or(0, |s| s.len());
        if have_a < need || have_b < need {
            logger::debug(
                LogTag::Correlation,
                &format!(
                    "Insufficient data for {}/{} ({}/{} < {}), using safe correlation {:.2}",
                    key_a, key_b, have_a, have_b, need, self.config.safe_correlation_value
                ),
            );
            return Ok(self.config.safe_correlation_value);
        }

        let (Some(series_a), Some(series_b)) = (prices.get(key_a), prices.get(key_b)) else {
            return Err(RiskCoreError::InvalidState(format!(
                "price series for {}/{} disappeared under lock",
                key_a, key_b
            )));
        };

        let returns_a = simple_returns(&series_a.values());
        let returns_b = simple_returns(&series_b.values());
        Ok(pearson(&returns_a, &returns_b).unwrap_or(self.config.safe_correlation_value))
    }

    fn prune_all(&self, prices: &mut HashMap<String, RollingSeries<f64>>) {
        let now = self.clock.now();
        for series in prices.values_mut() {
            series.prune(now);
        }
        prices.retain(|_, series| !series.is_empty());
    }
}

/// Multiplier for a given correlation under the progressive reduction rule
///
/// `|corr| <= threshold` gives 1.0; above it the reduction grows linearly up
/// to `max_reduction_amount` at `|corr| == 1`, floored at `min_reduction_factor`.
pub fn progressive_reduction(config: &CorrelationConfig, correlation: f64) -> f64 {
    let abs_corr = correlation.abs().min(1.0);
    if abs_corr <= config.correlation_threshold {
        return 1.0;
    }
    let reduction_ratio =
        (abs_corr - config.correlation_threshold) / (1.0 - config.correlation_threshold);
    (1.0 - reduction_ratio * config.max_reduction_amount)
        .max(config.min_reduction_factor)
        .min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const ES: [f64; 11] = [
        5800.0, 5801.0, 5799.0, 5803.0, 5805.0, 5802.0, 5804.0, 5806.0, 5803.0, 5807.0, 5809.0,
    ];

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap()
    }

    fn service() -> (CorrelationCapService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let svc = CorrelationCapService::new(CorrelationConfig::default(), clock.clone()).unwrap();
        (svc, clock)
    }

    async fn feed(svc: &CorrelationCapService, clock: &ManualClock, a: &[f64], b: &[f64]) {
        for (i, (pa, pb)) in a.iter().zip(b).enumerate() {
            let ts = t0() + Duration::seconds(i as i64 * 30);
            clock.set(ts);
            svc.update_price_data("ES", *pa, ts).await;
            svc.update_price_data("NQ", *pb, ts).await;
        }
    }

    #[tokio::test]
    async fn test_lockstep_pair_hits_min_reduction() {
        let (svc, clock) = service();
        let nq: Vec<f64> = ES.iter().map(|p| p * 3.5).collect();
        feed(&svc, &clock, &ES, &nq).await;

        let corr = svc.get_correlation("ES", "NQ").await.unwrap();
        assert!((corr - 1.0).abs() < 1e-9);

        let multiplier = svc.check_correlation_constraint("ES", "NQ", 1.0, 1.0).await;
        assert_eq!(multiplier, svc.config().min_reduction_factor);
    }

    #[tokio::test]
    async fn test_symbols_are_case_insensitive() {
        let (svc, clock) = service();
        let nq: Vec<f64> = ES.iter().map(|p| p * 3.5).collect();
        feed(&svc, &clock, &ES, &nq).await;

        let upper = svc.check_correlation_constraint("ES", "NQ", 1.0, 1.0).await;
        let lower = svc.check_correlation_constraint("es", " nq ", 1.0, 1.0).await;
        assert_eq!(upper, lower);
        assert_eq!(svc.tracked_symbols().await, vec!["ES", "NQ"]);
    }

    #[tokio::test]
    async fn test_insufficient_data_is_unconstrained() {
        let (svc, clock) = service();
        feed(&svc, &clock, &ES[..5], &ES[..5]).await;
        assert_eq!(svc.check_correlation_constraint("ES", "NQ", 1.0, 1.0).await, 1.0);
        assert_eq!(svc.get_correlation("ES", "NQ").await, None);
    }

    #[tokio::test]
    async fn test_flat_series_falls_back_to_safe_value() {
        let (svc, clock) = service();
        let flat = [5000.0; 11];
        feed(&svc, &clock, &ES, &flat).await;
        assert_eq!(svc.check_correlation_constraint("ES", "NQ", 1.0, 1.0).await, 1.0);
    }

    #[tokio::test]
    async fn test_window_expiry_drops_constraint() {
        let (svc, clock) = service();
        let nq: Vec<f64> = ES.iter().map(|p| p * 3.5).collect();
        feed(&svc, &clock, &ES, &nq).await;
        assert!(svc.check_correlation_constraint("ES", "NQ", 1.0, 1.0).await < 1.0);

        clock.advance(Duration::minutes(31));
        assert_eq!(svc.check_correlation_constraint("ES", "NQ", 1.0, 1.0).await, 1.0);
        assert!(svc.tracked_symbols().await.is_empty());
    }

    #[tokio::test]
    async fn test_anti_correlation_also_reduces() {
        let (svc, clock) = service();
        let mirror: Vec<f64> = ES.iter().map(|p| 11600.0 - p).collect();
        feed(&svc, &clock, &ES, &mirror).await;
        let corr = svc.get_correlation("ES", "NQ").await.unwrap();
        assert!(corr < -0.99);
        assert_eq!(
            svc.check_correlation_constraint("ES", "NQ", 1.0, -1.0).await,
            svc.config().min_reduction_factor
        );
    }

    #[test]
    fn test_oversized_window_refuses_to_start() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
        let config = CorrelationConfig {
            correlation_window_minutes: 1_000_000_000_000,
            ..CorrelationConfig::default()
        };
        let err = CorrelationCapService::new(config, clock).err().unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_closed() {
        let (svc, clock) = service();
        feed(&svc, &clock, &ES, &ES).await;
        let default = svc.config().default_reduction_factor;
        assert_eq!(svc.check_correlation_constraint("", "NQ", 1.0, 1.0).await, default);
        assert_eq!(svc.check_correlation_constraint("ES", "es", 1.0, 1.0).await, default);
        assert_eq!(
            svc.check_correlation_constraint("ES", "NQ", f64::NAN, 1.0).await,
            default
        );
    }

    #[tokio::test]
    async fn test_result_is_bounded_for_random_walks() {
        let (svc, clock) = service();
        let mut rng = StdRng::seed_from_u64(7);
        let min = svc.config().min_reduction_factor;
        for round in 0..20 {
            let mut a = 5800.0;
            let mut b = 20000.0;
            for i in 0..15 {
                let shock: f64 = rng.gen_range(-2.0..2.0);
                let noise: f64 = rng.gen_range(-2.0..2.0);
                a += shock;
                b += shock * 3.5 * (round as f64 / 20.0) + noise;
                let ts = clock.now() + Duration::seconds(i + 1);
                clock.set(ts);
                svc.update_price_data("ES", a, ts).await;
                svc.update_price_data("NQ", b, ts).await;
            }
            let m = svc.check_correlation_constraint("ES", "NQ", 1.0, 1.0).await;
            assert!((min..=1.0).contains(&m), "multiplier {} out of bounds", m);
        }
    }

    #[test]
    fn test_progressive_reduction_is_monotonic() {
        let config = CorrelationConfig::default();
        let mut previous = 1.0;
        for step in 0..=100 {
            let corr = step as f64 / 100.0;
            let m = progressive_reduction(&config, corr);
            assert!(m <= previous + 1e-12, "multiplier rose at corr {}", corr);
            assert!(m >= config.min_reduction_factor && m <= 1.0);
            assert_eq!(m, progressive_reduction(&config, -corr));
            previous = m;
        }
        assert_eq!(progressive_reduction(&config, 0.7), 1.0);
        assert!((progressive_reduction(&config, 0.85) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_refuses_to_start() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
        let config = CorrelationConfig {
            correlation_threshold: 1.2,
            ..CorrelationConfig::default()
        };
        assert!(CorrelationCapService::new(config, clock).is_err());
    }
}
