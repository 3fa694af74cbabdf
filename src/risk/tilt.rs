//! Order sizing from a routed decision
//!
//! Combines the drift gate, the correlation cap against the hedge partner,
//! the vol-of-vol adjustment and the breadth multiplier into one quantity.

use super::breadth::BreadthReallocationService;
use super::correlation::CorrelationCapService;
use super::rolling::symbol_key;
use super::vol_of_vol::{VolOfVolAdjustment, VolOfVolGuardService};
use crate::config::TiltConfig;
use crate::drift::FeatureDriftMonitor;
use crate::errors::RiskResult;
use crate::logger::{self, LogTag};
use crate::router::{MarketContext, TradeAction, UnifiedTradingDecision};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Context indicator carrying the current ATR
pub const ATR_INDICATOR: &str = "atr";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedOrder {
    pub decision_id: Option<String>,
    pub symbol: String,
    pub action: TradeAction,
    pub base_quantity: u32,
    pub quantity: u32,
    pub correlation_multiplier: f64,
    pub vol_of_vol: VolOfVolAdjustment,
    pub breadth_multiplier: f64,
    pub combined_multiplier: f64,
    pub trading_allowed: bool,
    /// Why the order was sized to zero, if it was
    pub veto_reason: Option<String>,
}

impl SizedOrder {
    pub fn is_tradable(&self) -> bool {
        !self.action.is_hold() && self.quantity > 0
    }
}

pub struct RiskTiltEngine {
    config: TiltConfig,
    correlation: Arc<CorrelationCapService>,
    vol_of_vol: Arc<VolOfVolGuardService>,
    breadth: Arc<BreadthReallocationService>,
    drift: Arc<FeatureDriftMonitor>,
    exposures: Mutex<HashMap<String, f64>>,
}

impl RiskTiltEngine {
    pub fn new(
        config: TiltConfig,
        correlation: Arc<CorrelationCapService>,
        vol_of_vol: Arc<VolOfVolGuardService>,
        breadth: Arc<BreadthReallocationService>,
        drift: Arc<FeatureDriftMonitor>,
    ) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            correlation,
            vol_of_vol,
            breadth,
            drift,
            exposures: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &TiltConfig {
        &self.config
    }

    /// Record the open position size of `symbol` (contracts, unsigned)
    pub async fn set_exposure(&self, symbol: &str, contracts: f64) {
        if contracts.is_finite() && contracts >= 0.0 {
            self.exposures.lock().insert(symbol_key(symbol), contracts);
        }
    }

    pub async fn exposure(&self, symbol: &str) -> f64 {
        self.exposures.lock().get(&symbol_key(symbol)).copied().unwrap_or(0.0)
    }

    /// Turn a routed decision into an order quantity
    ///
    /// Records the context ATR with the vol-of-vol guard. Hold decisions and
    /// drift vetoes size to zero.
    pub async fn size_order(
        &self,
        decision: &UnifiedTradingDecision,
        context: &MarketContext,
    ) -> SizedOrder {
        let symbol = symbol_key(&decision.symbol);
        let mut order = SizedOrder {
            decision_id: decision.decision_id.clone(),
            symbol: symbol.clone(),
            action: decision.action,
            base_quantity: decision.quantity,
            quantity: 0,
            correlation_multiplier: 1.0,
            vol_of_vol: VolOfVolAdjustment::identity(0.0),
            breadth_multiplier: 1.0,
            combined_multiplier: 0.0,
            trading_allowed: true,
            veto_reason: None,
        };

        if decision.action.is_hold() {
            order.veto_reason = Some("hold decision".to_string());
            return order;
        }

        if self.config.drift_gate_enabled {
            let verdict = self.drift.check_feature_drift(&feature_map(context)).await;
            if !verdict.allow_trading {
                order.trading_allowed = false;
                order.veto_reason = Some(format!(
                    "drift veto: {} missing, {} violations",
                    verdict.missing_features.len(),
                    verdict.drift_violations.len()
                ));
                logger::warning(
                    LogTag::Tilt,
                    &format!(
                        "{} {} vetoed by drift monitor (missing {:?})",
                        decision.action, symbol, verdict.missing_features
                    ),
                );
                return order;
            }
        }

        let base = f64::from(decision.quantity);
        if let Some(partner) = self.partner_of(&symbol) {
            let partner_size = self.exposure(&partner).await;
            order.correlation_multiplier = self
                .correlation
                .check_correlation_constraint(&symbol, &partner, base, partner_size)
                .await;
        }

        let atr = context.indicator(ATR_INDICATOR).unwrap_or(f64::NAN);
        order.vol_of_vol = self
            .vol_of_vol
            .calculate_vol_of_vol_adjustment(&symbol, atr)
            .await;

        if self.config.breadth_enabled {
            order.breadth_multiplier = self
                .breadth
                .calculate_position_multiplier(&symbol, base)
                .await;
        }

        order.combined_multiplier = order.correlation_multiplier
            * order.vol_of_vol.position_size_multiplier
            * order.breadth_multiplier;
        order.quantity = scaled_quantity(
            decision.quantity,
            order.combined_multiplier,
            self.config.max_order_quantity,
        );
        if order.quantity == 0 {
            order.veto_reason = Some("risk multipliers reduced size to zero".to_string());
        }

        logger::info(
            LogTag::Tilt,
            &format!(
                "{} {}: {} -> {} (corr x{:.2}, vov x{:.2}{}, breadth x{:.2})",
                decision.action,
                symbol,
                decision.quantity,
                order.quantity,
                order.correlation_multiplier,
                order.vol_of_vol.position_size_multiplier,
                if order.vol_of_vol.is_volatility_spike { " spike" } else { "" },
                order.breadth_multiplier
            ),
        );
        order
    }

    fn partner_of(&self, symbol: &str) -> Option<String> {
        self.config
            .hedge_pairs
            .iter()
            .find(|(s, _)| symbol_key(s) == symbol)
            .map(|(_, partner)| symbol_key(partner))
    }
}

/// floor(base x multiplier), clamped to `[0, max]`
pub fn scaled_quantity(base: u32, multiplier: f64, max: u32) -> u32 {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return 0;
    }
    let scaled = (f64::from(base) * multiplier).floor();
    if scaled >= f64::from(max) {
        max
    } else {
        scaled as u32
    }
}

/// Drift features of a context: its indicators plus price and volume
fn feature_map(context: &MarketContext) -> HashMap<String, f64> {
    let mut features = context.indicators.clone();
    features.insert("price".to_string(), context.price);
    features.insert("volume".to_string(), context.volume);
    features
}
