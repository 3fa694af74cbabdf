/// Decision sources and their routing tiers
use super::types::{DecisionOutcome, MarketContext, SourceDecision, TradeAction};
use crate::errors::{RiskCoreError, RiskResult};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A model or strategy that can answer "what should we do with this symbol"
#[async_trait]
pub trait DecisionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a decision; `Hold` means no conviction
    async fn decide(
        &self,
        symbol: &str,
        context: &MarketContext,
        cancel: &CancellationToken,
    ) -> RiskResult<SourceDecision>;

    /// Learning hook for realized outcomes of this source's decisions
    async fn submit_outcome(&self, _outcome: &DecisionOutcome) -> RiskResult<()> {
        Ok(())
    }
}

/// Routing tiers in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTier {
    StrategyFusion,
    EnhancedBrain,
    UnifiedBrain,
    IntelligenceOrchestrator,
}

impl SourceTier {
    pub const ALL: [SourceTier; 4] = [
        SourceTier::StrategyFusion,
        SourceTier::EnhancedBrain,
        SourceTier::UnifiedBrain,
        SourceTier::IntelligenceOrchestrator,
    ];

    /// Tag written to `UnifiedTradingDecision::source`
    pub fn label(&self) -> &'static str {
        match self {
            SourceTier::StrategyFusion => "StrategyFusion",
            SourceTier::EnhancedBrain => "EnhancedBrain",
            SourceTier::UnifiedBrain => "UnifiedBrain",
            SourceTier::IntelligenceOrchestrator => "IntelligenceOrchestrator",
        }
    }

    pub fn from_label(label: &str) -> Option<SourceTier> {
        Self::ALL.into_iter().find(|tier| tier.label() == label)
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Rule-based source reading a single indicator from the market context
///
/// Buys above `buy_above`, sells below `sell_below`, holds in between. A
/// missing indicator is an error so the router moves on to the next tier.
pub struct ThresholdSource {
    name: String,
    indicator: String,
    buy_above: f64,
    sell_below: f64,
    quantity: u32,
    confidence: f64,
    feedback: Mutex<ThresholdFeedback>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdFeedback {
    pub outcomes: u64,
    pub wins: u64,
    pub total_pnl: f64,
}

impl ThresholdSource {
    pub fn new(
        name: &str,
        indicator: &str,
        buy_above: f64,
        sell_below: f64,
        quantity: u32,
        confidence: f64,
    ) -> RiskResult<Self> {
        if !buy_above.is_finite() || !sell_below.is_finite() || sell_below > buy_above {
            return Err(RiskCoreError::InvalidArgument(format!(
                "{}: sell_below {} must not exceed buy_above {}",
                name, sell_below, buy_above
            )));
        }
        if quantity == 0 {
            return Err(RiskCoreError::InvalidArgument(format!(
                "{}: quantity must be positive",
                name
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RiskCoreError::InvalidArgument(format!(
                "{}: confidence {} outside [0, 1]",
                name, confidence
            )));
        }
        Ok(Self {
            name: name.to_string(),
            indicator: indicator.trim().to_lowercase(),
            buy_above,
            sell_below,
            quantity,
            confidence,
            feedback: Mutex::new(ThresholdFeedback::default()),
        })
    }

    pub fn feedback(&self) -> ThresholdFeedback {
        *self.feedback.lock()
    }
}

#[async_trait]
impl DecisionSource for ThresholdSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(
        &self,
        _symbol: &str,
        context: &MarketContext,
        _cancel: &CancellationToken,
    ) -> RiskResult<SourceDecision> {
        let value = context
            .indicator(&self.indicator)
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                RiskCoreError::source(&self.name, format!("indicator '{}' unavailable", self.indicator))
            })?;

        let action = if value > self.buy_above {
            TradeAction::Buy
        } else if value < self.sell_below {
            TradeAction::Sell
        } else {
            return Ok(SourceDecision::hold(&self.name).with_reason(&self.indicator, value));
        };

        Ok(
            SourceDecision::trade(action, self.confidence, self.quantity, &self.name)
                .with_reason(&self.indicator, value)
                .with_reason("buy_above", self.buy_above)
                .with_reason("sell_below", self.sell_below),
        )
    }

    async fn submit_outcome(&self, outcome: &DecisionOutcome) -> RiskResult<()> {
        let mut feedback = self.feedback.lock();
        feedback.outcomes += 1;
        if outcome.outcome.was_correct {
            feedback.wins += 1;
        }
        feedback.total_pnl += outcome.outcome.realized_pnl;
        logger::debug(
            LogTag::Router,
            &format!(
                "{} feedback: {}/{} wins, pnl {:.2}",
                self.name, feedback.wins, feedback.outcomes, feedback.total_pnl
            ),
        );
        Ok(())
    }
}
