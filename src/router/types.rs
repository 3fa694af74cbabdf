/// Decision router data types
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Source tag of the no-conviction terminal decision
pub const SYSTEM_STANDDOWN_SOURCE: &str = "SystemStanddown";
pub const SYSTEM_STANDDOWN_STRATEGY: &str = "SYSTEM_STANDDOWN";
/// Source tag of the decision returned when routing itself fails
pub const EMERGENCY_STANDDOWN_SOURCE: &str = "EmergencyStanddown";
pub const EMERGENCY_STANDDOWN_STRATEGY: &str = "EMERGENCY_STANDDOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, TradeAction::Hold)
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market snapshot handed to every decision source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    /// Technical indicators keyed by lower-case name
    pub indicators: HashMap<String, f64>,
    /// Regime metadata (trend, session, volatility bucket...)
    pub regime: HashMap<String, String>,
}

impl MarketContext {
    pub fn new(symbol: &str, price: f64, volume: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            volume,
            timestamp,
            indicators: HashMap::new(),
            regime: HashMap::new(),
        }
    }

    pub fn with_indicator(mut self, name: &str, value: f64) -> Self {
        self.indicators.insert(name.trim().to_lowercase(), value);
        self
    }

    pub fn with_regime(mut self, key: &str, value: &str) -> Self {
        self.regime.insert(key.to_string(), value.to_string());
        self
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(&name.trim().to_lowercase()).copied()
    }
}

/// What a single decision source answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDecision {
    pub action: TradeAction,
    pub confidence: f64,
    pub quantity: u32,
    pub strategy: String,
    pub reasoning: BTreeMap<String, String>,
}

impl SourceDecision {
    pub fn hold(strategy: &str) -> Self {
        Self {
            action: TradeAction::Hold,
            confidence: 0.0,
            quantity: 0,
            strategy: strategy.to_string(),
            reasoning: BTreeMap::new(),
        }
    }

    pub fn trade(action: TradeAction, confidence: f64, quantity: u32, strategy: &str) -> Self {
        Self {
            action,
            confidence,
            quantity,
            strategy: strategy.to_string(),
            reasoning: BTreeMap::new(),
        }
    }

    pub fn with_reason(mut self, key: &str, value: impl ToString) -> Self {
        self.reasoning.insert(key.to_string(), value.to_string());
        self
    }

    /// Reject answers the router cannot act on
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        if !self.action.is_hold() && self.quantity == 0 {
            return Err(format!("{} with zero quantity", self.action));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTradingDecision {
    /// Set for decisions recorded in history; feed it back with the outcome
    pub decision_id: Option<String>,
    pub symbol: String,
    pub action: TradeAction,
    pub confidence: f64,
    pub quantity: u32,
    pub strategy: String,
    pub source: String,
    pub reasoning: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: f64,
}

impl UnifiedTradingDecision {
    /// Hold with zero confidence and quantity
    pub fn hold(symbol: &str, source: &str, strategy: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            decision_id: None,
            symbol: symbol.to_string(),
            action: TradeAction::Hold,
            confidence: 0.0,
            quantity: 0,
            strategy: strategy.to_string(),
            source: source.to_string(),
            reasoning: BTreeMap::new(),
            timestamp,
            processing_time_ms: 0.0,
        }
    }

    pub fn from_source(
        symbol: &str,
        source: &str,
        answer: SourceDecision,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            decision_id: None,
            symbol: symbol.to_string(),
            action: answer.action,
            confidence: answer.confidence,
            quantity: answer.quantity,
            strategy: answer.strategy,
            source: source.to_string(),
            reasoning: answer.reasoning,
            timestamp,
            processing_time_ms: 0.0,
        }
    }

    pub fn with_decision_id(mut self, decision_id: String) -> Self {
        self.decision_id = Some(decision_id);
        self
    }

    pub fn with_action(mut self, action: TradeAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_reason(mut self, key: &str, value: impl ToString) -> Self {
        self.reasoning.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_processing_time(mut self, processing_time_ms: f64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }

    pub fn is_standdown(&self) -> bool {
        self.source == SYSTEM_STANDDOWN_SOURCE || self.source == EMERGENCY_STANDDOWN_SOURCE
    }
}

/// Realized result of a routed decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub realized_pnl: f64,
    pub was_correct: bool,
    pub hold_time_secs: f64,
    pub received: bool,
}

/// History entry; the outcome is filled in once feedback arrives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub decision_id: String,
    pub source: String,
    pub symbol: String,
    pub action: TradeAction,
    pub confidence: f64,
    pub strategy: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: OutcomeRecord,
}

impl DecisionOutcome {
    pub fn from_decision(decision_id: &str, decision: &UnifiedTradingDecision) -> Self {
        Self {
            decision_id: decision_id.to_string(),
            source: decision.source.clone(),
            symbol: decision.symbol.clone(),
            action: decision.action,
            confidence: decision.confidence,
            strategy: decision.strategy.clone(),
            timestamp: decision.timestamp,
            outcome: OutcomeRecord::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePerformance {
    pub decisions: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_hold_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterStats {
    pub routing_calls: u64,
    pub decisions_made: u64,
    pub standdowns: u64,
    pub emergencies: u64,
    pub cancellations: u64,
    /// Abstentions caused by errors, timeouts or invalid answers, per tier
    pub source_failures: BTreeMap<String, u64>,
    pub history_len: usize,
    pub avg_latency_ms: f64,
    pub p99_latency_ms: f64,
}
