//! Local fills for simulation mode

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::config::ExecutionSettings;
use super::sizing::OrderTicket;
use super::{Execution, TradeExecutor};
use crate::commentary::CommentaryKind;
use crate::error::ExecutionError;
use crate::types::{AnalysisResult, Narration, Side};

/// Fills every ticket immediately at the snapshot price
pub struct SimulatedExecutor {
    settings: ExecutionSettings,
    fills: AtomicU64,
}

impl SimulatedExecutor {
    pub fn new(settings: ExecutionSettings) -> Self {
        Self {
            settings,
            fills: AtomicU64::new(0),
        }
    }

    pub fn fill_count(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TradeExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        signal: Side,
        analysis: &AnalysisResult,
        account_equity: f64,
    ) -> Result<Execution, ExecutionError> {
        let ticket = OrderTicket::plan(signal, analysis, account_equity, &self.settings)?;
        let order_id = format!("sim-{}", &ticket.client_order_id.simple().to_string()[..8]);
        let position = ticket.fill(order_id);
        self.fills.fetch_add(1, Ordering::Relaxed);

        info!(
            "Simulated fill: {} {} lots @ {:.2} (stop {:.2}, target {:.2})",
            signal, position.lot_size, position.entry_price, position.stop_loss, position.take_profit
        );

        let narration = vec![
            Narration::new(
                CommentaryKind::Analysis,
                format!("Simulated fill {} ({} mode)", position.order_id, self.settings.mode),
            ),
            Narration::new(
                CommentaryKind::Risk,
                format!("Max loss at stop: {:.2}", self.settings.max_loss(position.lot_size)),
            ),
        ];

        Ok(Execution { position, narration })
    }
}
