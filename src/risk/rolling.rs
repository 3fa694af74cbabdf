//! Time-bounded rolling series and the statistics shared by the guards

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedValue<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
}

/// Per-symbol series pruned by a sliding time window
///
/// After `prune(now)` every retained entry satisfies `timestamp > now - window`.
#[derive(Debug, Clone)]
pub struct RollingSeries<T> {
    points: VecDeque<TimedValue<T>>,
    window: Duration,
    max_len: usize,
}

impl<T: Copy> RollingSeries<T> {
    pub fn new(window: Duration, max_len: usize) -> Self {
        Self {
            points: VecDeque::new(),
            window,
            max_len: max_len.max(1),
        }
    }

    /// Append a value; out-of-order observations are inserted in time order
    pub fn push(&mut self, value: T, timestamp: DateTime<Utc>) {
        let point = TimedValue { value, timestamp };
        match self.points.back() {
            Some(last) if timestamp < last.timestamp => {
                let idx = self.points.partition_point(|p| p.timestamp <= timestamp);
                self.points.insert(idx, point);
            }
            _ => self.points.push_back(point),
        }
        while self.points.len() > self.max_len {
            self.points.pop_front();
        }
    }

    /// Append, or overwrite the newest entry when it has the same timestamp
    pub fn upsert_latest(&mut self, value: T, timestamp: DateTime<Utc>) {
        if let Some(last) = self.points.back_mut() {
            if last.timestamp == timestamp {
                last.value = value;
                return;
            }
        }
        self.push(value, timestamp);
    }

    /// Drop every entry at or before `now - window`
    ///
    /// A cutoff before the earliest representable instant keeps everything.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.window) else {
            return;
        };
        while matches!(self.points.front(), Some(p) if p.timestamp <= cutoff) {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<T> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Case-insensitive symbol key
pub fn symbol_key(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Simple returns, skipping steps whose previous price is not positive
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Pearson correlation; `None` when undefined (length < 2 or zero variance)
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let xs = &xs[xs.len() - n..];
    let ys = &ys[ys.len() - n..];

    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    Some((cov / denominator).clamp(-1.0, 1.0))
}
