//! Deterministic order ticket planning
//!
//! Stop, target and lot size are fixed from the analysis snapshot before any
//! remote call, and the client order id is a UUIDv5 of the ticket. Retrying
//! with the same snapshot produces the same ticket and the same id.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::ExecutionSettings;
use super::position::Position;
use crate::error::ExecutionError;
use crate::types::{AnalysisResult, Side};

const TICKET_NAMESPACE: Uuid = Uuid::from_u128(0x5b7c_1e0a_93d4_4f26_8a1e_2c6d_40f7_b913);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTicket {
    pub client_order_id: Uuid,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
}

impl OrderTicket {
    pub fn plan(
        side: Side,
        analysis: &AnalysisResult,
        account_equity: f64,
        settings: &ExecutionSettings,
    ) -> Result<Self, ExecutionError> {
        let entry = analysis.current_price;
        if !entry.is_finite() || entry <= 0.0 {
            return Err(ExecutionError::Rejected(format!("no valid price to enter at ({})", entry)));
        }
        if account_equity <= 0.0 {
            return Err(ExecutionError::Rejected("account equity must be positive".to_string()));
        }
        if settings.stop_loss_points <= 0.0 || settings.point_value <= 0.0 || settings.lot_step <= 0.0 {
            return Err(ExecutionError::Rejected("sizing settings must be positive".to_string()));
        }

        let stop_distance = settings.stop_loss_points;
        let stop_loss = entry - stop_distance * side.sign();
        let take_profit = entry + settings.take_profit_points() * side.sign();

        let risk_amount = account_equity * settings.risk_percent / 100.0;
        let raw_lots = risk_amount / (stop_distance * settings.point_value);
        let lot_size = round_lots(
            floor_to_step(raw_lots, settings.lot_step).clamp(settings.min_lot, settings.max_lot),
        );

        let name = format!(
            "{}|{:.5}|{:.5}|{:.5}|{:.5}|{}",
            side,
            entry,
            stop_loss,
            take_profit,
            lot_size,
            analysis.observed_at.timestamp_millis()
        );

        Ok(Self {
            client_order_id: Uuid::new_v5(&TICKET_NAMESPACE, name.as_bytes()),
            side,
            entry_price: entry,
            stop_loss,
            take_profit,
            lot_size,
        })
    }

    /// Position filled exactly as planned
    pub fn fill(&self, order_id: impl Into<String>) -> Position {
        Position {
            id: self.client_order_id,
            order_id: order_id.into(),
            side: self.side,
            entry_price: self.entry_price,
            current_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            lot_size: self.lot_size,
            pnl_points: 0.0,
            pnl_percent: 0.0,
            pnl_amount: 0.0,
            opened_at: Utc::now(),
        }
    }
}

fn floor_to_step(value: f64, step: f64) -> f64 {
    // Epsilon keeps 0.5 / 0.01 from flooring to 49
    (value / step + 1e-9).floor() * step
}

fn round_lots(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_ticket_levels_and_size() {
        let analysis = AnalysisResult::neutral(5000.0);
        let settings = ExecutionSettings::default();

        let ticket = OrderTicket::plan(Side::Long, &analysis, 10_000.0, &settings).unwrap();
        assert_eq!(ticket.entry_price, 5000.0);
        assert_eq!(ticket.stop_loss, 4950.0);
        assert_eq!(ticket.take_profit, 5100.0);
        // $100 risk / (50 pts * $1) = 2 lots
        assert_eq!(ticket.lot_size, 2.0);
    }

    #[test]
    fn test_short_ticket_levels() {
        let analysis = AnalysisResult::neutral(42_500.0);
        let settings = ExecutionSettings {
            stop_loss_points: 30.0,
            reward_risk_ratio: 1.5,
            ..Default::default()
        };

        let ticket = OrderTicket::plan(Side::Short, &analysis, 1_000.0, &settings).unwrap();
        assert_eq!(ticket.stop_loss, 42_530.0);
        assert_eq!(ticket.take_profit, 42_455.0);
        // $10 / 30 = 0.333 -> 0.33
        assert_eq!(ticket.lot_size, 0.33);
    }

    #[test]
    fn test_lot_size_clamped() {
        let analysis = AnalysisResult::neutral(100.0);
        let settings = ExecutionSettings::default();

        let tiny = OrderTicket::plan(Side::Long, &analysis, 1.0, &settings).unwrap();
        assert_eq!(tiny.lot_size, settings.min_lot);

        let huge = OrderTicket::plan(Side::Long, &analysis, 1e9, &settings).unwrap();
        assert_eq!(huge.lot_size, settings.max_lot);
    }

    #[test]
    fn test_same_snapshot_same_client_id() {
        let analysis = AnalysisResult::neutral(5000.0);
        let settings = ExecutionSettings::default();

        let a = OrderTicket::plan(Side::Long, &analysis, 10_000.0, &settings).unwrap();
        let b = OrderTicket::plan(Side::Long, &analysis, 10_000.0, &settings).unwrap();
        assert_eq!(a, b);

        let c = OrderTicket::plan(Side::Short, &analysis, 10_000.0, &settings).unwrap();
        assert_ne!(a.client_order_id, c.client_order_id);
    }

    #[test]
    fn test_rejects_missing_price() {
        let analysis = AnalysisResult::neutral(0.0);
        let err = OrderTicket::plan(Side::Long, &analysis, 10_000.0, &ExecutionSettings::default())
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected(_)));
    }
}
