use super::stats::{drift_scores, BaselineStats};
use crate::clock::Clock;
use crate::config::DriftConfig;
use crate::errors::{RiskCoreError, RiskResult};
use crate::logger::{self, LogTag};
use crate::risk::rolling::RollingSeries;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Feature tag used for the synthetic violation on a failed check
pub const DRIFT_CHECK_FAILED: &str = "DRIFT_CHECK_FAILED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftViolation {
    pub feature: String,
    pub ks_statistic: f64,
    pub psi_statistic: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDriftResult {
    pub allow_trading: bool,
    pub missing_features: Vec<String>,
    pub drift_violations: Vec<DriftViolation>,
    /// Features with enough data to be evaluated
    pub features_evaluated: usize,
    pub checked_at: DateTime<Utc>,
}

impl FeatureDriftResult {
    fn fail_closed(reason: String, checked_at: DateTime<Utc>) -> Self {
        Self {
            allow_trading: false,
            missing_features: Vec::new(),
            drift_violations: vec![DriftViolation {
                feature: DRIFT_CHECK_FAILED.to_string(),
                ks_statistic: f64::NAN,
                psi_statistic: f64::NAN,
                reason,
            }],
            features_evaluated: 0,
            checked_at,
        }
    }
}

/// Per-feature lifecycle: NoBaseline -> BaselineSet -> (Stable | Drifting)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureDriftStatus {
    NoBaseline,
    BaselineSet,
    Stable,
    Drifting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDriftSnapshot {
    pub feature: String,
    pub status: FeatureDriftStatus,
    pub baseline: Option<BaselineStats>,
    pub recent_count: usize,
    pub drift_score: f64,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct FeatureDriftState {
    baseline: Option<BaselineStats>,
    recent: RollingSeries<f64>,
    last_check: Option<DateTime<Utc>>,
    drift_score: f64,
    drifting: Option<bool>,
}

impl FeatureDriftState {
    fn new(config: &DriftConfig) -> Self {
        Self {
            baseline: None,
            recent: RollingSeries::new(
                Duration::minutes(config.rolling_window_minutes),
                config.max_recent_values,
            ),
            last_check: None,
            drift_score: 0.0,
            drifting: None,
        }
    }

    fn is_baseline_set(&self) -> bool {
        self.baseline.is_some()
    }

    fn status(&self) -> FeatureDriftStatus {
        match (self.baseline, self.drifting) {
            (None, _) => FeatureDriftStatus::NoBaseline,
            (Some(_), None) => FeatureDriftStatus::BaselineSet,
            (Some(_), Some(false)) => FeatureDriftStatus::Stable,
            (Some(_), Some(true)) => FeatureDriftStatus::Drifting,
        }
    }
}

pub struct FeatureDriftMonitor {
    config: DriftConfig,
    critical_features: Vec<String>,
    clock: Arc<dyn Clock>,
    features: Mutex<HashMap<String, FeatureDriftState>>,
}

impl FeatureDriftMonitor {
    /// Create the monitor; an empty critical-feature list refuses to start
    pub fn new(config: DriftConfig, clock: Arc<dyn Clock>) -> RiskResult<Self> {
        config.validate()?;
        let mut critical_features: Vec<String> =
            config.critical_features.iter().map(|f| feature_key(f)).collect();
        critical_features.sort();
        critical_features.dedup();

        logger::info(
            LogTag::Drift,
            &format!(
                "Drift monitor ready: critical={:?} ks>{} psi>{} tolerance={}",
                critical_features,
                config.ks_threshold,
                config.psi_threshold,
                config.max_drift_violations
            ),
        );
        Ok(Self {
            config,
            critical_features,
            clock,
            features: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Freeze the baseline for `feature`
    ///
    /// A baseline is set once; re-registration requires [`Self::clear_feature`].
    pub async fn update_feature_baseline(&self, feature: &str, values: &[f64]) -> RiskResult<()> {
        let key = feature_key(feature);
        if key.is_empty() {
            return Err(RiskCoreError::InvalidArgument("empty feature name".to_string()));
        }
        if values.len() < self.config.min_baseline_data_points {
            return Err(RiskCoreError::InsufficientData {
                subject: format!("baseline for {}", key),
                have: values.len(),
                need: self.config.min_baseline_data_points,
            });
        }
        let stats = BaselineStats::from_values(values)?;

        let mut features = self.features.lock();
        let state = features
            .entry(key.clone())
            .or_insert_with(|| FeatureDriftState::new(&self.config));
        if state.is_baseline_set() {
            return Err(RiskCoreError::InvalidState(format!(
                "baseline for {} is already set",
                key
            )));
        }
        state.baseline = Some(stats);

        logger::info(
            LogTag::Drift,
            &format!(
                "Baseline set for {}: mean={:.4} std={:.4} median={:.4} n={}",
                key, stats.mean, stats.std_dev, stats.median, stats.count
            ),
        );
        Ok(())
    }

    /// Append a live value to the rolling window of `feature`
    pub async fn add_feature_value(&self, feature: &str, value: f64) -> RiskResult<()> {
        let key = feature_key(feature);
        if key.is_empty() {
            return Err(RiskCoreError::InvalidArgument("empty feature name".to_string()));
        }
        if !value.is_finite() {
            return Err(RiskCoreError::InvalidArgument(format!(
                "non-finite value {} for {}",
                value, key
            )));
        }

        let now = self.clock.now();
        let mut features = self.features.lock();
        let state = features
            .entry(key)
            .or_insert_with(|| FeatureDriftState::new(&self.config));
        state.recent.push(value, now);
        state.recent.prune(now);
        Ok(())
    }

    /// Record every finite value of a feature map
    pub async fn add_feature_values(&self, values: &HashMap<String, f64>) -> usize {
        let mut recorded = 0;
        for (feature, value) in values {
            if self.add_feature_value(feature, *value).await.is_ok() {
                recorded += 1;
            }
        }
        recorded
    }

    /// Decide whether trading may continue given the live feature map
    pub async fn check_feature_drift(
        &self,
        current_features: &HashMap<String, f64>,
    ) -> FeatureDriftResult {
        let now = self.clock.now();
        let outcome = {
            let mut features = self.features.lock();
            self.check_locked(&mut features, current_features, now)
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                logger::error(
                    LogTag::Drift,
                    &format!("[AUDIT-VIOLATION] Drift check failed: {} - trading denied", e),
                );
                FeatureDriftResult::fail_closed(e.to_string(), now)
            }
        }
    }

    pub async fn feature_status(&self, feature: &str) -> Option<FeatureDriftSnapshot> {
        let key = feature_key(feature);
        let features = self.features.lock();
        features.get(&key).map(|state| snapshot(&key, state))
    }

    pub async fn tracked_features(&self) -> Vec<FeatureDriftSnapshot> {
        let features = self.features.lock();
        let mut snapshots: Vec<FeatureDriftSnapshot> = features
            .iter()
            .map(|(key, state)| snapshot(key, state))
            .collect();
        snapshots.sort_by(|a, b| a.feature.cmp(&b.feature));
        snapshots
    }

    /// Forget a feature entirely, allowing a new baseline
    pub async fn clear_feature(&self, feature: &str) -> bool {
        self.features.lock().remove(&feature_key(feature)).is_some()
    }

    fn check_locked(
        &self,
        features: &mut HashMap<String, FeatureDriftState>,
        current_features: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> RiskResult<FeatureDriftResult> {
        let current: HashMap<String, f64> = current_features
            .iter()
            .map(|(name, value)| (feature_key(name), *value))
            .collect();

        let mut missing_features = Vec::new();
        for critical in &self.critical_features {
            match current.get(critical) {
                Some(value) if value.is_finite() => {}
                Some(value) => {
                    logger::error(
                        LogTag::Drift,
                        &format!("Critical feature {} is not finite ({})", critical, value),
                    );
                    missing_features.push(critical.clone());
                }
                None => {
                    logger::error(LogTag::Drift, &format!("Critical feature {} is missing", critical));
                    missing_features.push(critical.clone());
                }
            }
        }

        let mut drift_violations = Vec::new();
        let mut features_evaluated = 0;
        for (name, state) in features.iter_mut() {
            state.recent.prune(now);
            let Some(baseline) = state.baseline else {
                continue;
            };
            if state.recent.len() < self.config.min_drift_data_points {
                state.drifting = None;
                continue;
            }

            let scores = drift_scores(&baseline, &state.recent.values())?;
            features_evaluated += 1;
            state.drift_score = scores.score();
            state.last_check = Some(now);

            let ks_breach = scores.ks > self.config.ks_threshold;
            let psi_breach = scores.psi > self.config.psi_threshold;
            state.drifting = Some(ks_breach || psi_breach);
            if ks_breach || psi_breach {
                let reason = match (ks_breach, psi_breach) {
                    (true, true) => "ks and psi above threshold",
                    (true, false) => "ks above threshold",
                    _ => "psi above threshold",
                };
                logger::warning(
                    LogTag::Drift,
                    &format!(
                        "Drift on {}: ks={:.3} psi={:.3} ({})",
                        name, scores.ks, scores.psi, reason
                    ),
                );
                drift_violations.push(DriftViolation {
                    feature: name.clone(),
                    ks_statistic: scores.ks,
                    psi_statistic: scores.psi,
                    reason: reason.to_string(),
                });
            }
        }
        drift_violations.sort_by(|a, b| a.feature.cmp(&b.feature));

        let allow_trading =
            missing_features.is_empty() && drift_violations.len() <= self.config.max_drift_violations;
        if allow_trading {
            logger::debug(
                LogTag::Drift,
                &format!(
                    "Drift check passed: {} evaluated, {} violations",
                    features_evaluated,
                    drift_violations.len()
                ),
            );
        } else {
            logger::error(
                LogTag::Drift,
                &format!(
                    "Trading vetoed: missing={:?} violations={} (tolerance {})",
                    missing_features,
                    drift_violations.len(),
                    self.config.max_drift_violations
                ),
            );
        }

        Ok(FeatureDriftResult {
            allow_trading,
            missing_features,
            drift_violations,
            features_evaluated,
            checked_at: now,
        })
    }
}

fn feature_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn snapshot(key: &str, state: &FeatureDriftState) -> FeatureDriftSnapshot {
    FeatureDriftSnapshot {
        feature: key.to_string(),
        status: state.status(),
        baseline: state.baseline,
        recent_count: state.recent.len(),
        drift_score: state.drift_score,
        last_check: state.last_check,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn monitor_with(config: DriftConfig) -> (FeatureDriftMonitor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()));
        let monitor = FeatureDriftMonitor::new(config, clock.clone()).unwrap();
        (monitor, clock)
    }

    fn monitor() -> (FeatureDriftMonitor, Arc<ManualClock>) {
        monitor_with(DriftConfig::default())
    }

    fn pattern(offset: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (i % 10) as f64 + offset).collect()
    }

    fn full_features() -> HashMap<String, f64> {
        HashMap::from([
            ("price".to_string(), 5800.0),
            ("volume".to_string(), 1200.0),
            ("atr".to_string(), 5.0),
        ])
    }

    async fn seed(monitor: &FeatureDriftMonitor, clock: &ManualClock, feature: &str, offset: f64) {
        monitor.update_feature_baseline(feature, &pattern(0.0, 100)).await.unwrap();
        for value in pattern(offset, 20) {
            clock.advance(Duration::seconds(10));
            monitor.add_feature_value(feature, value).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_missing_critical_feature_always_vetoes() {
        let (monitor, clock) = monitor();
        seed(&monitor, &clock, "rsi", 0.0).await;

        for missing in ["price", "volume", "atr"] {
            let mut features = full_features();
            features.remove(missing);
            features.insert("rsi".to_string(), 55.0);
            let result = monitor.check_feature_drift(&features).await;
            assert!(!result.allow_trading);
            assert_eq!(result.missing_features, vec![missing.to_string()]);
            assert!(result.drift_violations.is_empty());
        }
    }

    #[tokio::test]
    async fn test_non_finite_critical_feature_counts_as_missing() {
        let (monitor, _clock) = monitor();
        let mut features = full_features();
        features.insert("ATR".to_string(), f64::NAN);
        features.remove("atr");
        let result = monitor.check_feature_drift(&features).await;
        assert!(!result.allow_trading);
        assert_eq!(result.missing_features, vec!["atr".to_string()]);
    }

    #[tokio::test]
    async fn test_no_baseline_with_all_critical_features_allows() {
        let (monitor, _clock) = monitor();
        let mut features = full_features();
        features.insert("Price".to_string(), 5800.0);
        features.remove("price");
        let result = monitor.check_feature_drift(&features).await;
        assert!(result.allow_trading);
        assert_eq!(result.features_evaluated, 0);
    }

    #[tokio::test]
    async fn test_stable_feature_passes() {
        let (monitor, clock) = monitor();
        seed(&monitor, &clock, "rsi", 0.0).await;
        let result = monitor.check_feature_drift(&full_features()).await;
        assert!(result.allow_trading);
        assert_eq!(result.features_evaluated, 1);
        assert_eq!(
            monitor.feature_status("rsi").await.unwrap().status,
            FeatureDriftStatus::Stable
        );
    }

    #[tokio::test]
    async fn test_violations_veto_only_beyond_tolerance() {
        let (monitor, clock) = monitor();
        seed(&monitor, &clock, "f1", 5.0).await;
        seed(&monitor, &clock, "f2", 5.0).await;

        let result = monitor.check_feature_drift(&full_features()).await;
        assert_eq!(result.drift_violations.len(), 2);
        assert!(result.allow_trading);

        seed(&monitor, &clock, "f3", 5.0).await;
        let result = monitor.check_feature_drift(&full_features()).await;
        assert_eq!(result.drift_violations.len(), 3);
        assert!(!result.allow_trading);
        let names: Vec<&str> = result.drift_violations.iter().map(|v| v.feature.as_str()).collect();
        assert_eq!(names, vec!["f1", "f2", "f3"]);

        let status = monitor.feature_status("f1").await.unwrap();
        assert_eq!(status.status, FeatureDriftStatus::Drifting);
        assert!(status.drift_score > 1.0);
    }

    #[tokio::test]
    async fn test_too_few_recent_values_are_not_evaluated() {
        let (monitor, clock) = monitor();
        monitor.update_feature_baseline("rsi", &pattern(0.0, 100)).await.unwrap();
        for value in pattern(50.0, 19) {
            clock.advance(Duration::seconds(1));
            monitor.add_feature_value("rsi", value).await.unwrap();
        }
        let result = monitor.check_feature_drift(&full_features()).await;
        assert!(result.allow_trading);
        assert_eq!(result.features_evaluated, 0);
        assert_eq!(
            monitor.feature_status("rsi").await.unwrap().status,
            FeatureDriftStatus::BaselineSet
        );
    }

    #[tokio::test]
    async fn test_recent_values_expire_with_window() {
        let (monitor, clock) = monitor_with(DriftConfig {
            max_drift_violations: 0,
            ..DriftConfig::default()
        });
        seed(&monitor, &clock, "rsi", 5.0).await;
        assert!(!monitor.check_feature_drift(&full_features()).await.allow_trading);

        assert_eq!(
            monitor.feature_status("rsi").await.unwrap().status,
            FeatureDriftStatus::Drifting
        );

        clock.advance(Duration::minutes(61));
        let result = monitor.check_feature_drift(&full_features()).await;
        assert!(result.allow_trading);
        let status = monitor.feature_status("rsi").await.unwrap();
        assert_eq!(status.recent_count, 0);
        assert_eq!(status.status, FeatureDriftStatus::BaselineSet);
    }

    #[tokio::test]
    async fn test_baseline_registration_rules() {
        let (monitor, _clock) = monitor();
        let err = monitor.update_feature_baseline("rsi", &pattern(0.0, 10)).await.unwrap_err();
        assert!(matches!(err, RiskCoreError::InsufficientData { have: 10, need: 50, .. }));
        assert_eq!(monitor.feature_status("rsi").await, None);

        monitor.update_feature_baseline("rsi", &pattern(0.0, 60)).await.unwrap();
        assert!(matches!(
            monitor.update_feature_baseline("RSI", &pattern(0.0, 60)).await,
            Err(RiskCoreError::InvalidState(_))
        ));

        assert!(monitor.clear_feature("rsi").await);
        monitor.update_feature_baseline("rsi", &pattern(1.0, 60)).await.unwrap();
        let baseline = monitor.feature_status("rsi").await.unwrap().baseline.unwrap();
        assert_eq!(baseline.count, 60);
        assert_eq!(baseline.min, 1.0);
    }

    #[tokio::test]
    async fn test_recent_window_is_capped() {
        let (monitor, clock) = monitor_with(DriftConfig {
            max_recent_values: 25,
            ..DriftConfig::default()
        });
        for value in pattern(0.0, 40) {
            clock.advance(Duration::seconds(1));
            monitor.add_feature_value("rsi", value).await.unwrap();
        }
        assert!(monitor.add_feature_value("rsi", f64::INFINITY).await.is_err());
        assert_eq!(monitor.feature_status("rsi").await.unwrap().recent_count, 25);
    }

    #[tokio::test]
    async fn test_add_feature_values_skips_non_finite() {
        let (monitor, _clock) = monitor();
        let mut values = full_features();
        values.insert("spread".to_string(), f64::NAN);
        assert_eq!(monitor.add_feature_values(&values).await, 3);
        assert_eq!(monitor.tracked_features().await.len(), 3);
    }

    #[test]
    fn test_empty_critical_list_refuses_to_start() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let config = DriftConfig {
            critical_features: Vec::new(),
            ..DriftConfig::default()
        };
        assert!(FeatureDriftMonitor::new(config, clock).err().unwrap().is_configuration());
    }

    #[tokio::test]
    async fn test_overflowing_baseline_is_refused() {
        let (monitor, clock) = monitor();
        let err = monitor.update_feature_baseline("spread", &[1e308; 60]).await.unwrap_err();
        assert!(matches!(err, RiskCoreError::InvalidArgument(_)));

        for _ in 0..20 {
            clock.advance(Duration::seconds(10));
            monitor.add_feature_value("spread", 1e308).await.unwrap();
        }
        let result = monitor.check_feature_drift(&full_features()).await;
        assert!(result.allow_trading);
        assert_eq!(
            monitor.feature_status("spread").await.unwrap().status,
            FeatureDriftStatus::NoBaseline
        );
    }

    #[tokio::test]
    async fn test_failed_check_denies_trading() {
        let (monitor, clock) = monitor();
        monitor.update_feature_baseline("spread", &pattern(0.0, 60)).await.unwrap();
        for _ in 0..20 {
            clock.advance(Duration::seconds(10));
            monitor.add_feature_value("spread", 1e308).await.unwrap();
        }

        let result = monitor.check_feature_drift(&full_features()).await;
        assert!(!result.allow_trading);
        assert!(result.missing_features.is_empty());
        assert_eq!(result.features_evaluated, 0);
        assert_eq!(result.drift_violations.len(), 1);
        assert_eq!(result.drift_violations[0].feature, DRIFT_CHECK_FAILED);
        assert!(result.drift_violations[0].ks_statistic.is_nan());
    }
}
