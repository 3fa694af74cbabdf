//! Unified decision router
//!
//! Queries decision sources in a fixed priority order, takes the first
//! non-hold answer, and keeps a bounded history so realized outcomes can be
//! routed back to the source that produced them.

mod engine;
mod history;
mod source;
mod types;

pub use engine::{UnifiedDecisionRouter, UnifiedDecisionRouterBuilder, CANCELLED_REASON};
pub use source::{DecisionSource, SourceTier, ThresholdFeedback, ThresholdSource};
pub use types::{
    DecisionOutcome, MarketContext, OutcomeRecord, RouterStats, SourceDecision, SourcePerformance,
    TradeAction, UnifiedTradingDecision, EMERGENCY_STANDDOWN_SOURCE, EMERGENCY_STANDDOWN_STRATEGY,
    SYSTEM_STANDDOWN_SOURCE, SYSTEM_STANDDOWN_STRATEGY,
};
