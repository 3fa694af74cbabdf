//! Baseline statistics and the simplified drift proxies
//!
//! The KS and PSI values here are simplified proxies, not the textbook
//! two-sample KS test or population stability index. Thresholds are tuned
//! against these exact formulas.

use crate::errors::{RiskCoreError, RiskResult};
use crate::risk::rolling::{mean, std_dev};
use serde::{Deserialize, Serialize};

/// Floor for standard deviations used as divisors
const STD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl BaselineStats {
    pub fn from_values(values: &[f64]) -> RiskResult<Self> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(RiskCoreError::InvalidArgument(format!(
                "baseline contains non-finite value {}",
                bad
            )));
        }
        let mean = mean(values).ok_or_else(|| RiskCoreError::InsufficientData {
            subject: "baseline".to_string(),
            have: 0,
            need: 1,
        })?;
        let std_dev = std_dev(values).unwrap_or(0.0);

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        if !mean.is_finite() || !std_dev.is_finite() || !median.is_finite() {
            return Err(RiskCoreError::InvalidArgument(format!(
                "baseline statistics not finite (mean={}, std={}, median={})",
                mean, std_dev, median
            )));
        }

        Ok(Self {
            mean,
            std_dev,
            median,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            count: sorted.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftScores {
    pub ks: f64,
    pub psi: f64,
}

impl DriftScores {
    /// Larger of the two proxies
    pub fn score(&self) -> f64 {
        self.ks.max(self.psi)
    }
}

/// Compare recent values against a frozen baseline
///
/// - `ks  = (|mean_r - mean_b| + |std_r - std_b|) / std_b`
/// - `psi = |mean_r - mean_b| / std_b + |ln(std_r / std_b)|`
pub fn drift_scores(baseline: &BaselineStats, recent: &[f64]) -> RiskResult<DriftScores> {
    let recent_mean = mean(recent).ok_or_else(|| RiskCoreError::InsufficientData {
        subject: "recent values".to_string(),
        have: 0,
        need: 1,
    })?;
    let recent_std = std_dev(recent).unwrap_or(0.0);

    let baseline_std = baseline.std_dev.max(STD_EPSILON);
    let mean_shift = (recent_mean - baseline.mean).abs();

    let ks = (mean_shift + (recent_std - baseline.std_dev).abs()) / baseline_std;
    let psi = mean_shift / baseline_std + (recent_std.max(STD_EPSILON) / baseline_std).ln().abs();

    if !ks.is_finite() || !psi.is_finite() {
        return Err(RiskCoreError::Computation(format!(
            "drift statistics not finite (ks={}, psi={})",
            ks, psi
        )));
    }
    Ok(DriftScores { ks, psi })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_stats() {
        let stats = BaselineStats::from_values(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.count, 4);
        assert!((stats.std_dev - 1.25f64.sqrt()).abs() < 1e-12);

        assert!(BaselineStats::from_values(&[]).is_err());
        assert!(BaselineStats::from_values(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_overflowing_baseline_is_rejected() {
        let err = BaselineStats::from_values(&[1e308; 60]).unwrap_err();
        assert!(matches!(err, RiskCoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_identical_distribution_has_zero_drift() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let baseline = BaselineStats::from_values(&values).unwrap();
        let scores = drift_scores(&baseline, &values).unwrap();
        assert!(scores.ks.abs() < 1e-12);
        assert!(scores.psi.abs() < 1e-12);
    }

    #[test]
    fn test_mean_shift_scales_by_baseline_std() {
        let baseline = BaselineStats::from_values(&[-1.0, 1.0]).unwrap();
        let scores = drift_scores(&baseline, &[1.0, 3.0]).unwrap();
        assert!((scores.ks - 2.0).abs() < 1e-12);
        assert!((scores.psi - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_variance_change_shows_in_psi_log_ratio() {
        let baseline = BaselineStats::from_values(&[-1.0, 1.0]).unwrap();
        let scores = drift_scores(&baseline, &[-2.0, 2.0]).unwrap();
        assert!((scores.ks - 1.0).abs() < 1e-12);
        assert!((scores.psi - 2f64.ln()).abs() < 1e-12);
    }
}
