/// Cascading multi-source decision router
use super::history::DecisionHistory;
use super::source::{DecisionSource, SourceTier};
use super::types::{
    DecisionOutcome, MarketContext, OutcomeRecord, RouterStats, SourcePerformance,
    UnifiedTradingDecision, EMERGENCY_STANDDOWN_SOURCE, EMERGENCY_STANDDOWN_STRATEGY,
    SYSTEM_STANDDOWN_SOURCE, SYSTEM_STANDDOWN_STRATEGY,
};
use crate::clock::Clock;
use crate::config::RouterConfig;
use crate::errors::{RiskCoreError, RiskResult};
use crate::logger::{self, LogTag};
use crate::risk::rolling::symbol_key;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Reasoning value of a standdown caused by cancellation
pub const CANCELLED_REASON: &str = "cancelled";

/// Minimum samples before p99 latency is judged
const MIN_LATENCY_SAMPLES: usize = 10;

enum RouteOutcome {
    Traded(UnifiedTradingDecision),
    Standdown(String),
}

#[derive(Debug, Default)]
struct RouterCounters {
    routing_calls: u64,
    decisions_made: u64,
    standdowns: u64,
    emergencies: u64,
    cancellations: u64,
    source_failures: BTreeMap<String, u64>,
    latencies_ms: VecDeque<f64>,
}

impl RouterCounters {
    fn record_latency(&mut self, latency_ms: f64, window: usize) {
        self.latencies_ms.push_back(latency_ms);
        while self.latencies_ms.len() > window {
            self.latencies_ms.pop_front();
        }
    }

    fn avg_latency(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            return 0.0;
        }
        self.latencies_ms.iter().sum::<f64>() / self.latencies_ms.len() as f64
    }

    fn p99_latency(&self) -> f64 {
        if self.latencies_ms.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.latencies_ms.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let skip = (sorted.len() as f64 * 0.01) as usize;
        sorted[sorted.len() - skip - 1]
    }
}

pub struct UnifiedDecisionRouterBuilder {
    config: RouterConfig,
    clock: Arc<dyn Clock>,
    sources: [Option<Arc<dyn DecisionSource>>; 4],
}

impl UnifiedDecisionRouterBuilder {
    /// Register `source` for `tier`, replacing any previous one
    pub fn source(mut self, tier: SourceTier, source: Arc<dyn DecisionSource>) -> Self {
        self.sources[tier.index()] = Some(source);
        self
    }

    pub fn build(self) -> RiskResult<UnifiedDecisionRouter> {
        self.config.validate()?;

        let registered: Vec<String> = SourceTier::ALL
            .iter()
            .filter_map(|tier| {
                self.sources[tier.index()]
                    .as_ref()
                    .map(|s| format!("{}={}", tier, s.name()))
            })
            .collect();
        if registered.is_empty() {
            logger::warning(
                LogTag::Router,
                "Router built without decision sources; every call will stand down",
            );
        } else {
            logger::info(
                LogTag::Router,
                &format!("Decision router ready: [{}]", registered.join(", ")),
            );
        }

        Ok(UnifiedDecisionRouter {
            history: Mutex::new(DecisionHistory::new(self.config.history_capacity)),
            counters: Mutex::new(RouterCounters::default()),
            config: self.config,
            clock: self.clock,
            sources: self.sources,
        })
    }
}

/// Asks the registered sources in priority order and keeps the first trade
pub struct UnifiedDecisionRouter {
    config: RouterConfig,
    clock: Arc<dyn Clock>,
    sources: [Option<Arc<dyn DecisionSource>>; 4],
    history: Mutex<DecisionHistory>,
    counters: Mutex<RouterCounters>,
}

impl UnifiedDecisionRouter {
    pub fn builder(config: RouterConfig, clock: Arc<dyn Clock>) -> UnifiedDecisionRouterBuilder {
        UnifiedDecisionRouterBuilder {
            config,
            clock,
            sources: [None, None, None, None],
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn has_source(&self, tier: SourceTier) -> bool {
        self.sources[tier.index()].is_some()
    }

    /// Route one decision for `symbol`
    ///
    /// Never fails: source problems fall through to the next tier, no
    /// conviction anywhere yields a system standdown, and a failure of the
    /// routing itself yields an emergency standdown.
    pub async fn route_decision(
        &self,
        symbol: &str,
        context: &MarketContext,
        cancel: &CancellationToken,
    ) -> UnifiedTradingDecision {
        let started = Instant::now();
        let routed = self.route_through_tiers(symbol, context, cancel).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut counters = self.counters.lock();
        counters.routing_calls += 1;
        let decision = match routed {
            Ok(RouteOutcome::Traded(decision)) => {
                counters.decisions_made += 1;
                decision
            }
            Ok(RouteOutcome::Standdown(reason)) => {
                counters.standdowns += 1;
                if reason == CANCELLED_REASON {
                    counters.cancellations += 1;
                }
                logger::info(
                    LogTag::Router,
                    &format!("{} stand down: {}", symbol, reason),
                );
                self.standdown(symbol, &reason)
            }
            Err(e) => {
                counters.emergencies += 1;
                logger::error(
                    LogTag::Router,
                    &format!("Routing failed for '{}': {} - emergency standdown", symbol, e),
                );
                self.emergency(symbol, &e)
            }
        };

        counters.record_latency(latency_ms, self.config.latency_window);
        logger::verbose(
            LogTag::Router,
            &format!("{} routed in {:.3}ms", symbol, latency_ms),
        );
        if counters.latencies_ms.len() >= MIN_LATENCY_SAMPLES {
            let p99 = counters.p99_latency();
            if p99 > self.config.latency_warn_ms {
                logger::warning(
                    LogTag::Router,
                    &format!(
                        "High routing latency: p99 {:.1}ms > {:.1}ms",
                        p99, self.config.latency_warn_ms
                    ),
                );
            }
        }

        decision.with_processing_time(latency_ms)
    }

    /// Attach a realized outcome to a recorded decision
    ///
    /// Returns false for unknown ids, repeated submissions and invalid input.
    /// The originating source is notified after the history lock is released.
    pub async fn submit_trading_outcome(
        &self,
        decision_id: &str,
        realized_pnl: f64,
        was_correct: bool,
        hold_time: Duration,
    ) -> bool {
        if !realized_pnl.is_finite() {
            logger::warning(
                LogTag::Router,
                &format!("Ignoring outcome for {}: pnl {} is not finite", decision_id, realized_pnl),
            );
            return false;
        }

        let entry = {
            let mut history = self.history.lock();
            let Some(entry) = history.find_mut(decision_id) else {
                logger::warning(
                    LogTag::Router,
                    &format!("Outcome for unknown decision {} dropped", decision_id),
                );
                return false;
            };
            if entry.outcome.received {
                logger::warning(
                    LogTag::Router,
                    &format!("Outcome for {} already recorded; ignoring resubmission", decision_id),
                );
                return false;
            }
            entry.outcome = OutcomeRecord {
                realized_pnl,
                was_correct,
                hold_time_secs: hold_time.as_secs_f64(),
                received: true,
            };
            entry.clone()
        };

        logger::info(
            LogTag::Router,
            &format!(
                "Outcome {} ({} {} via {}): pnl {:.2} correct={} held {:.0}s",
                entry.decision_id,
                entry.action,
                entry.symbol,
                entry.source,
                realized_pnl,
                was_correct,
                entry.outcome.hold_time_secs
            ),
        );

        let source = SourceTier::from_label(&entry.source)
            .and_then(|tier| self.sources[tier.index()].clone());
        if let Some(source) = source {
            if let Err(e) = source.submit_outcome(&entry).await {
                logger::warning(
                    LogTag::Router,
                    &format!("{} rejected outcome feedback: {}", entry.source, e),
                );
            }
        }
        true
    }

    /// Per-source performance over decisions with outcomes
    pub async fn get_performance_stats(&self) -> HashMap<String, SourcePerformance> {
        self.history.lock().performance()
    }

    pub async fn router_stats(&self) -> RouterStats {
        let history_len = self.history.lock().len();
        let counters = self.counters.lock();
        RouterStats {
            routing_calls: counters.routing_calls,
            decisions_made: counters.decisions_made,
            standdowns: counters.standdowns,
            emergencies: counters.emergencies,
            cancellations: counters.cancellations,
            source_failures: counters.source_failures.clone(),
            history_len,
            avg_latency_ms: counters.avg_latency(),
            p99_latency_ms: counters.p99_latency(),
        }
    }

    pub async fn history_snapshot(&self) -> Vec<DecisionOutcome> {
        self.history.lock().snapshot()
    }

    pub async fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    async fn route_through_tiers(
        &self,
        symbol: &str,
        context: &MarketContext,
        cancel: &CancellationToken,
    ) -> RiskResult<RouteOutcome> {
        let key = validate_request(symbol, context)?;
        let timeout = Duration::from_millis(self.config.source_timeout_ms);

        for tier in SourceTier::ALL {
            if cancel.is_cancelled() {
                return Ok(RouteOutcome::Standdown(CANCELLED_REASON.to_string()));
            }
            let Some(source) = self.sources[tier.index()].as_ref() else {
                continue;
            };

            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(RouteOutcome::Standdown(CANCELLED_REASON.to_string()));
                }
                answer = tokio::time::timeout(timeout, source.decide(&key, context, cancel)) => answer,
            };

            let answer = match answer {
                Err(_) => {
                    self.source_failed(tier, &format!("timed out after {}ms", timeout.as_millis()));
                    continue;
                }
                Ok(Err(e)) => {
                    self.source_failed(tier, &e.to_string());
                    continue;
                }
                Ok(Ok(answer)) => answer,
            };
            if let Err(reason) = answer.validate() {
                self.source_failed(tier, &format!("invalid answer: {}", reason));
                continue;
            }
            if answer.action.is_hold() {
                logger::debug(
                    LogTag::Router,
                    &format!("{} holds on {}", tier, key),
                );
                continue;
            }

            let now = self.clock.now();
            let decision_id = new_decision_id(now);
            let decision = UnifiedTradingDecision::from_source(&key, tier.label(), answer, now)
                .with_reason("source_name", source.name())
                .with_decision_id(decision_id.clone());

            self.history
                .lock()
                .push(DecisionOutcome::from_decision(&decision_id, &decision));

            logger::info(
                LogTag::Router,
                &format!(
                    "{} {} x{} on {} (confidence {:.2}, strategy {}, id {})",
                    tier,
                    decision.action,
                    decision.quantity,
                    key,
                    decision.confidence,
                    decision.strategy,
                    decision_id
                ),
            );
            return Ok(RouteOutcome::Traded(decision));
        }

        Ok(RouteOutcome::Standdown(
            "no source produced a trade".to_string(),
        ))
    }

    fn source_failed(&self, tier: SourceTier, reason: &str) {
        logger::warning(
            LogTag::Router,
            &format!("{} abstained: {}", tier, reason),
        );
        *self
            .counters
            .lock()
            .source_failures
            .entry(tier.label().to_string())
            .or_insert(0) += 1;
    }

    fn standdown(&self, symbol: &str, reason: &str) -> UnifiedTradingDecision {
        UnifiedTradingDecision::hold(
            &symbol_key(symbol),
            SYSTEM_STANDDOWN_SOURCE,
            SYSTEM_STANDDOWN_STRATEGY,
            self.clock.now(),
        )
        .with_reason("reason", reason)
    }

    fn emergency(&self, symbol: &str, error: &RiskCoreError) -> UnifiedTradingDecision {
        UnifiedTradingDecision::hold(
            &symbol_key(symbol),
            EMERGENCY_STANDDOWN_SOURCE,
            EMERGENCY_STANDDOWN_STRATEGY,
            self.clock.now(),
        )
        .with_reason("reason", error)
    }
}

fn validate_request(symbol: &str, context: &MarketContext) -> RiskResult<String> {
    let key = symbol_key(symbol);
    if key.is_empty() {
        return Err(RiskCoreError::InvalidArgument("empty symbol".to_string()));
    }
    if symbol_key(&context.symbol) != key {
        return Err(RiskCoreError::InvalidArgument(format!(
            "market context is for '{}', not '{}'",
            context.symbol, key
        )));
    }
    if !context.price.is_finite() || context.price <= 0.0 {
        return Err(RiskCoreError::InvalidArgument(format!(
            "price {} for {} is not a positive number",
            context.price, key
        )));
    }
    Ok(key)
}

/// `{epoch_millis}-{6 hex}`; unique enough for feedback matching
fn new_decision_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
    format!("{}-{:06x}", now.timestamp_millis(), suffix)
}
