//! Feature drift kill-switch
//!
//! Watches the feature vector feeding the ML decision sources and vetoes
//! trading when a critical feature is missing or too many features drift from
//! their frozen baselines. Every failure path denies trading.

mod monitor;
mod stats;

pub use monitor::{
    DriftViolation, FeatureDriftMonitor, FeatureDriftResult, FeatureDriftSnapshot,
    FeatureDriftStatus, DRIFT_CHECK_FAILED,
};
pub use stats::{drift_scores, BaselineStats, DriftScores};
