//! Performance statistics derived from ledger events

use serde::{Deserialize, Serialize};

use super::position::ClosedPosition;
use crate::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalAccuracy {
    pub hits: u32,
    pub misses: u32,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Wins over closed trades, 0..=1
    pub win_rate: f64,
    /// Mean planned reward/risk of closed trades
    pub avg_risk_reward: f64,
    /// Executed trades, open or closed
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub realized_pnl: f64,
    pub velocity_accuracy: SignalAccuracy,
}

/// Incrementally maintains [`PerformanceMetrics`]
#[derive(Debug, Default)]
pub struct PerformanceAggregator {
    metrics: PerformanceMetrics,
    risk_reward_sum: f64,
}

impl PerformanceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a successful execution
    pub fn record_opened(&mut self) {
        self.metrics.total_trades += 1;
    }

    /// Fold a closed position into win rate and risk/reward
    pub fn record(&mut self, closed: &ClosedPosition) {
        if closed.is_win() {
            self.metrics.wins += 1;
        } else {
            self.metrics.losses += 1;
        }
        self.metrics.realized_pnl += closed.position.pnl_amount;
        self.risk_reward_sum += closed.position.planned_risk_reward();

        let decided = self.metrics.wins + self.metrics.losses;
        self.metrics.win_rate = self.metrics.wins as f64 / decided as f64;
        self.metrics.avg_risk_reward = self.risk_reward_sum / decided as f64;
    }

    /// Score a signal against the direction price actually moved
    pub fn record_signal_outcome(&mut self, predicted: Side, realized: Option<Side>) {
        let accuracy = &mut self.metrics.velocity_accuracy;
        if realized == Some(predicted) {
            accuracy.hits += 1;
        } else {
            accuracy.misses += 1;
        }
        let observed = accuracy.hits + accuracy.misses;
        accuracy.accuracy = if observed == 0 {
            0.0
        } else {
            accuracy.hits as f64 / observed as f64
        };
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn summary(&self) -> String {
        format!(
            "Trades: {} | WR: {:.1}% | Avg R:R {:.2} | Realized: {:.2} | Velocity accuracy: {:.1}%",
            self.metrics.total_trades,
            self.metrics.win_rate * 100.0,
            self.metrics.avg_risk_reward,
            self.metrics.realized_pnl,
            self.metrics.velocity_accuracy.accuracy * 100.0
        )
    }
}
