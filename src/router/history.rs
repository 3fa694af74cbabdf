/// Bounded decision history for outcome feedback
use super::types::{DecisionOutcome, SourcePerformance};
use std::collections::{HashMap, VecDeque};

#[derive(Debug)]
pub(crate) struct DecisionHistory {
    entries: VecDeque<DecisionOutcome>,
    capacity: usize,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&mut self, entry: DecisionOutcome) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn find_mut(&mut self, decision_id: &str) -> Option<&mut DecisionOutcome> {
        // Newest first; recent decisions are the ones receiving feedback
        self.entries
            .iter_mut()
            .rev()
            .find(|entry| entry.decision_id == decision_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshot(&self) -> Vec<DecisionOutcome> {
        self.entries.iter().cloned().collect()
    }

    /// Per-source aggregates over entries that have an outcome
    pub fn performance(&self) -> HashMap<String, SourcePerformance> {
        let mut stats: HashMap<String, SourcePerformance> = HashMap::new();
        let mut hold_totals: HashMap<String, f64> = HashMap::new();

        for entry in self.entries.iter().filter(|e| e.outcome.received) {
            let perf = stats.entry(entry.source.clone()).or_default();
            perf.decisions += 1;
            if entry.outcome.was_correct {
                perf.wins += 1;
            }
            perf.total_pnl += entry.outcome.realized_pnl;
            *hold_totals.entry(entry.source.clone()).or_default() += entry.outcome.hold_time_secs;
        }

        for (source, perf) in stats.iter_mut() {
            let n = perf.decisions as f64;
            perf.win_rate = perf.wins as f64 / n;
            perf.average_hold_secs = hold_totals.get(source).copied().unwrap_or(0.0) / n;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::types::{OutcomeRecord, TradeAction};
    use chrono::Utc;

    fn entry(id: usize, source: &str) -> DecisionOutcome {
        DecisionOutcome {
            decision_id: format!("id-{}", id),
            source: source.to_string(),
            symbol: "ES".to_string(),
            action: TradeAction::Buy,
            confidence: 0.7,
            strategy: "s".to_string(),
            timestamp: Utc::now(),
            outcome: OutcomeRecord::default(),
        }
    }

    #[test]
    fn test_ring_keeps_newest_entries() {
        let mut history = DecisionHistory::new(1000);
        for i in 0..1500 {
            history.push(entry(i, "StrategyFusion"));
        }
        assert_eq!(history.len(), 1000);
        let snapshot = history.snapshot();
        assert_eq!(snapshot[0].decision_id, "id-500");
        assert_eq!(snapshot[999].decision_id, "id-1499");
        assert!(history.find_mut("id-499").is_none());
        assert!(history.find_mut("id-500").is_some());
    }

    #[test]
    fn test_performance_counts_only_received_outcomes() {
        let mut history = DecisionHistory::new(10);
        for i in 0..4 {
            history.push(entry(i, if i < 3 { "StrategyFusion" } else { "UnifiedBrain" }));
        }
        for (id, pnl, correct, hold) in [("id-0", 100.0, true, 60.0), ("id-1", -40.0, false, 120.0)] {
            let e = history.find_mut(id).unwrap();
            e.outcome = OutcomeRecord {
                realized_pnl: pnl,
                was_correct: correct,
                hold_time_secs: hold,
                received: true,
            };
        }

        let stats = history.performance();
        assert_eq!(stats.len(), 1);
        let fusion = &stats["StrategyFusion"];
        assert_eq!(fusion.decisions, 2);
        assert_eq!(fusion.wins, 1);
        assert_eq!(fusion.win_rate, 0.5);
        assert_eq!(fusion.total_pnl, 60.0);
        assert_eq!(fusion.average_hold_secs, 90.0);
    }
}
