/// Offline replay of market ticks through the full pipeline
///
/// CSV columns: `timestamp,symbol,price,atr,advance_decline,volume_ratio,momentum`.
/// The first `min_baseline_data_points` values of each critical feature form
/// its drift baseline. A position opened on one tick is closed on the next
/// tick of the same symbol and its outcome is fed back to the router.
use crate::clock::{Clock, ManualClock};
use crate::config::Config;
use crate::errors::{RiskCoreError, RiskResult};
use crate::logger::{self, LogTag};
use crate::pipeline::RiskPipeline;
use crate::router::{
    DecisionSource, MarketContext, RouterStats, SourcePerformance, SourceTier, ThresholdSource,
    TradeAction,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayTick {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: f64,
    pub atr: f64,
    pub advance_decline: f64,
    pub volume_ratio: f64,
    pub momentum: f64,
}

impl ReplayTick {
    fn context(&self) -> MarketContext {
        MarketContext::new(&self.symbol, self.price, self.volume_ratio, self.timestamp)
            .with_indicator("atr", self.atr)
            .with_indicator("momentum", self.momentum)
            .with_indicator("advance_decline", self.advance_decline)
    }

    fn features(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("price".to_string(), self.price),
            ("volume".to_string(), self.volume_ratio),
            ("atr".to_string(), self.atr),
        ])
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub rejected_breadth_updates: usize,
    pub baselines_set: usize,
    pub decisions: usize,
    pub standdowns: usize,
    pub orders: usize,
    pub drift_vetoes: usize,
    pub contracts: u64,
    pub outcomes_submitted: usize,
    pub router: RouterStats,
    pub performance: HashMap<String, SourcePerformance>,
}

#[derive(Debug, Clone)]
struct OpenPosition {
    decision_id: String,
    action: TradeAction,
    entry_price: f64,
    quantity: u32,
    opened_at: DateTime<Utc>,
}

/// Parse replay ticks from CSV text
pub fn parse_ticks(content: &str) -> RiskResult<Vec<ReplayTick>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut ticks = Vec::new();
    for (idx, row) in reader.deserialize::<ReplayTick>().enumerate() {
        let tick = row.map_err(|e| {
            RiskCoreError::InvalidArgument(format!("failed to parse CSV row {}: {}", idx + 2, e))
        })?;
        ticks.push(tick);
    }
    Ok(ticks)
}

/// Momentum rule used as the strategy-fusion tier during replay
pub fn momentum_source() -> RiskResult<Arc<dyn DecisionSource>> {
    Ok(Arc::new(ThresholdSource::new(
        "momentum-threshold",
        "momentum",
        0.5,
        -0.5,
        2,
        0.6,
    )?))
}

/// Drive every service with `ticks` in order and summarize the run
pub async fn run_replay(config: &Config, ticks: &[ReplayTick]) -> RiskResult<ReplaySummary> {
    let Some(first) = ticks.first() else {
        return Err(RiskCoreError::InsufficientData {
            subject: "replay ticks".to_string(),
            have: 0,
            need: 1,
        });
    };

    let clock = Arc::new(ManualClock::new(first.timestamp));
    let shared: Arc<dyn Clock> = clock.clone();
    let pipeline = RiskPipeline::from_config(
        config,
        shared,
        vec![(SourceTier::StrategyFusion, momentum_source()?)],
    )?;
    let cancel = CancellationToken::new();

    let min_baseline = config.drift.min_baseline_data_points;
    let mut warmup: HashMap<String, Vec<f64>> = HashMap::new();
    let mut open: HashMap<String, OpenPosition> = HashMap::new();
    let mut summary = ReplaySummary::default();

    for tick in ticks {
        if tick.timestamp > clock.now() {
            clock.set(tick.timestamp);
        }
        summary.ticks += 1;
        let symbol = tick.symbol.trim().to_uppercase();

        if let Some(position) = open.remove(&symbol) {
            let direction = if position.action == TradeAction::Buy { 1.0 } else { -1.0 };
            let pnl = (tick.price - position.entry_price) * direction * f64::from(position.quantity);
            let held = (tick.timestamp - position.opened_at)
                .to_std()
                .unwrap_or_default();
            if pipeline
                .router
                .submit_trading_outcome(&position.decision_id, pnl, pnl > 0.0, held)
                .await
            {
                summary.outcomes_submitted += 1;
            }
            pipeline.tilt.set_exposure(&symbol, 0.0).await;
        }

        pipeline
            .correlation
            .update_price_data(&symbol, tick.price, tick.timestamp)
            .await;
        pipeline
            .vol_of_vol
            .calculate_vol_of_vol_adjustment(&symbol, tick.atr)
            .await;
        if pipeline
            .breadth
            .update_breadth_metrics(&symbol, tick.advance_decline, tick.volume_ratio, tick.momentum)
            .await
            .is_err()
        {
            summary.rejected_breadth_updates += 1;
        }

        for (feature, value) in tick.features() {
            let samples = warmup.entry(feature.clone()).or_default();
            if samples.len() < min_baseline {
                samples.push(value);
                if samples.len() == min_baseline
                    && pipeline.drift.update_feature_baseline(&feature, samples).await.is_ok()
                {
                    summary.baselines_set += 1;
                }
            } else {
                let _ = pipeline.drift.add_feature_value(&feature, value).await;
            }
        }

        let context = tick.context();
        let decision = pipeline.router.route_decision(&symbol, &context, &cancel).await;
        if decision.is_standdown() {
            summary.standdowns += 1;
            continue;
        }
        summary.decisions += 1;

        let order = pipeline.tilt.size_order(&decision, &context).await;
        if !order.trading_allowed {
            summary.drift_vetoes += 1;
        }
        if let (true, Some(decision_id)) = (order.is_tradable(), order.decision_id.clone()) {
            summary.orders += 1;
            summary.contracts += u64::from(order.quantity);
            pipeline
                .tilt
                .set_exposure(&symbol, f64::from(order.quantity))
                .await;
            open.insert(
                symbol.clone(),
                OpenPosition {
                    decision_id,
                    action: order.action,
                    entry_price: tick.price,
                    quantity: order.quantity,
                    opened_at: tick.timestamp,
                },
            );
        }
    }

    summary.router = pipeline.router.router_stats().await;
    summary.performance = pipeline.router.get_performance_stats().await;

    logger::info(
        LogTag::System,
        &format!(
            "Replay finished: {} ticks, {} decisions, {} orders ({} contracts), {} drift vetoes",
            summary.ticks, summary.decisions, summary.orders, summary.contracts, summary.drift_vetoes
        ),
    );
    Ok(summary)
}
