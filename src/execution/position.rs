//! Position ledger and mark-to-market P&L tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;
use uuid::Uuid;

use crate::types::Side;

/// An open position created by a successful execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Client order id (deterministic per order ticket)
    pub id: Uuid,
    /// Order id assigned by the execution service
    pub order_id: String,
    pub side: Side,
    pub entry_price: f64,
    pub current_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
    pub pnl_points: f64,
    pub pnl_percent: f64,
    pub pnl_amount: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Stop distance in points
    pub fn risk_points(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Target distance in points
    pub fn reward_points(&self) -> f64 {
        (self.take_profit - self.entry_price).abs()
    }

    /// Planned reward/risk multiple, 0 when the stop sits on the entry
    pub fn planned_risk_reward(&self) -> f64 {
        let risk = self.risk_points();
        if risk > 0.0 {
            self.reward_points() / risk
        } else {
            0.0
        }
    }

    /// Recompute current price and derived P&L
    fn mark(&mut self, price: f64, point_value: f64) {
        self.current_price = price;
        self.pnl_points = (price - self.entry_price) * self.side.sign();
        self.pnl_percent = if self.entry_price != 0.0 {
            self.pnl_points / self.entry_price * 100.0
        } else {
            0.0
        };
        self.pnl_amount = self.pnl_points * self.lot_size * point_value;
    }

    fn stop_hit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }

    fn target_hit(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price >= self.take_profit,
            Side::Short => price <= self.take_profit,
        }
    }
}

/// Why a position left the open set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Manual,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "stop loss"),
            Self::TakeProfit => write!(f, "take profit"),
            Self::Manual => write!(f, "manual close"),
        }
    }
}

/// Record of a position at the moment it was closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPosition {
    #[serde(flatten)]
    pub position: Position,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub closed_at: DateTime<Utc>,
}

impl ClosedPosition {
    pub fn is_win(&self) -> bool {
        self.position.pnl_amount > 0.0
    }

    /// Direction price actually moved between entry and exit
    pub fn realized_direction(&self) -> Option<Side> {
        let moved = self.exit_price - self.position.entry_price;
        if moved > 0.0 {
            Some(Side::Long)
        } else if moved < 0.0 {
            Some(Side::Short)
        } else {
            None
        }
    }
}

/// Tracks open positions and recently closed ones
#[derive(Debug)]
pub struct PositionLedger {
    open: Vec<Position>,
    closed: VecDeque<ClosedPosition>,
    /// Account currency per point per lot
    point_value: f64,
    max_history: usize,
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PositionLedger {
    pub fn new(point_value: f64) -> Self {
        Self {
            open: Vec::new(),
            closed: VecDeque::new(),
            point_value,
            max_history: 1000,
        }
    }

    /// Add a freshly executed position
    pub fn open(&mut self, mut position: Position) {
        let price = position.current_price;
        position.mark(price, self.point_value);
        debug!("Ledger open: {} {} @ {:.2}", position.side, position.id, position.entry_price);
        self.open.push(position);
    }

    /// Mark one position to `price`. Returns false if the id is not open.
    pub fn update_marks(&mut self, id: &Uuid, price: f64) -> bool {
        let point_value = self.point_value;
        match self.open.iter_mut().find(|p| &p.id == id) {
            Some(position) => {
                position.mark(price, point_value);
                true
            }
            None => false,
        }
    }

    /// Mark every open position to `price`
    pub fn mark_all(&mut self, price: f64) {
        let point_value = self.point_value;
        for position in &mut self.open {
            position.mark(price, point_value);
        }
    }

    /// Positions whose stop or target has been crossed at `price`,
    /// paired with the level that triggered and the reason
    pub fn level_exits(&self, price: f64) -> Vec<(Uuid, f64, ExitReason)> {
        self.open
            .iter()
            .filter_map(|p| {
                if p.stop_hit(price) {
                    Some((p.id, p.stop_loss, ExitReason::StopLoss))
                } else if p.target_hit(price) {
                    Some((p.id, p.take_profit, ExitReason::TakeProfit))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Remove a position from the open set at its last mark
    pub fn close(&mut self, id: &Uuid, reason: ExitReason) -> Option<ClosedPosition> {
        let idx = self.open.iter().position(|p| &p.id == id)?;
        let position = self.open.remove(idx);

        let record = ClosedPosition {
            exit_price: position.current_price,
            position,
            reason,
            closed_at: Utc::now(),
        };

        self.closed.push_back(record.clone());
        if self.closed.len() > self.max_history {
            self.closed.pop_front();
        }

        Some(record)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Position> {
        self.open.iter().find(|p| &p.id == id)
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open
    }

    pub fn closed_positions(&self) -> &VecDeque<ClosedPosition> {
        &self.closed
    }

    pub fn has_open_side(&self, side: Side) -> bool {
        self.open.iter().any(|p| p.side == side)
    }

    /// Percent of equity at risk to stop across open positions
    pub fn total_risk_used(&self, account_equity: f64) -> f64 {
        if account_equity <= 0.0 {
            return 0.0;
        }
        self.open
            .iter()
            .map(|p| p.risk_points() * p.lot_size / account_equity * 100.0)
            .sum()
    }

    /// Unrealized P&L in account currency
    pub fn unrealized_pnl(&self) -> f64 {
        self.open.iter().map(|p| p.pnl_amount).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn position(side: Side, entry: f64, stop: f64, target: f64, lots: f64) -> Position {
        Position {
            id: Uuid::new_v4(),
            order_id: "ord-1".to_string(),
            side,
            entry_price: entry,
            current_price: entry,
            stop_loss: stop,
            take_profit: target,
            lot_size: lots,
            pnl_points: 0.0,
            pnl_percent: 0.0,
            pnl_amount: 0.0,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_risk_used() {
        let mut ledger = PositionLedger::default();
        ledger.open(position(Side::Long, 100.0, 90.0, 120.0, 2.0));

        assert!((ledger.total_risk_used(1000.0) - 2.0).abs() < 1e-9);
        assert_eq!(ledger.total_risk_used(0.0), 0.0);
    }

    #[test]
    fn test_mark_to_market_long_and_short() {
        let mut ledger = PositionLedger::new(2.0);
        let long = position(Side::Long, 5000.0, 4950.0, 5100.0, 0.5);
        let short = position(Side::Short, 5000.0, 5050.0, 4900.0, 1.0);
        let (long_id, short_id) = (long.id, short.id);
        ledger.open(long);
        ledger.open(short);

        assert!(ledger.update_marks(&long_id, 5010.0));
        assert!(ledger.update_marks(&short_id, 5010.0));

        let long = ledger.get(&long_id).unwrap();
        assert_eq!(long.pnl_points, 10.0);
        assert_eq!(long.pnl_amount, 10.0); // 10 pts * 0.5 lots * 2.0
        assert!((long.pnl_percent - 0.2).abs() < 1e-9);

        let short = ledger.get(&short_id).unwrap();
        assert_eq!(short.pnl_points, -10.0);
        assert_eq!(short.pnl_amount, -20.0);

        assert!(!ledger.update_marks(&Uuid::new_v4(), 5010.0));
    }

    #[test]
    fn test_level_exits() {
        let mut ledger = PositionLedger::default();
        let long = position(Side::Long, 100.0, 95.0, 110.0, 1.0);
        let short = position(Side::Short, 100.0, 105.0, 90.0, 1.0);
        let (long_id, short_id) = (long.id, short.id);
        ledger.open(long);
        ledger.open(short);

        assert!(ledger.level_exits(101.0).is_empty());
        assert_eq!(ledger.level_exits(94.0), vec![(long_id, 95.0, ExitReason::StopLoss)]);
        assert_eq!(ledger.level_exits(111.0), vec![
            (long_id, 110.0, ExitReason::TakeProfit),
            (short_id, 105.0, ExitReason::StopLoss),
        ]);
    }

    #[test]
    fn test_close_moves_to_history() {
        let mut ledger = PositionLedger::default();
        let pos = position(Side::Short, 200.0, 210.0, 180.0, 1.0);
        let id = pos.id;
        ledger.open(pos);
        ledger.update_marks(&id, 190.0);

        let closed = ledger.close(&id, ExitReason::Manual).unwrap();
        assert_eq!(closed.exit_price, 190.0);
        assert!(closed.is_win());
        assert_eq!(closed.realized_direction(), Some(Side::Short));

        assert!(ledger.open_positions().is_empty());
        assert_eq!(ledger.closed_positions().len(), 1);
        assert!(ledger.close(&id, ExitReason::Manual).is_none());
    }

    #[test]
    fn test_planned_risk_reward() {
        let pos = position(Side::Long, 100.0, 90.0, 120.0, 1.0);
        assert_eq!(pos.planned_risk_reward(), 2.0);

        let flat = position(Side::Long, 100.0, 100.0, 120.0, 1.0);
        assert_eq!(flat.planned_risk_reward(), 0.0);
    }
}
