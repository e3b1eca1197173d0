//! Trade execution, position ledger and performance tracking
//!
//! [`TradeExecutor`] is the seam the strategy controller calls when a signal
//! needs action. [`ExecutionClient`] talks to the remote execution service;
//! [`SimulatedExecutor`] fills locally.

mod client;
mod config;
mod models;
mod performance;
mod position;
mod simulated;
mod sizing;

use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::types::{AnalysisResult, Narration, Side};

pub use client::{interpret, ExecutionClient, EXECUTE_PATH};
pub use config::{ExecutionMode, ExecutionSettings};
pub use models::{EntryFill, ExecuteRequest, ExecuteResponse, RiskLevels};
pub use performance::{PerformanceAggregator, PerformanceMetrics, SignalAccuracy};
pub use position::{ClosedPosition, ExitReason, Position, PositionLedger};
pub use simulated::SimulatedExecutor;
pub use sizing::OrderTicket;

/// A filled order plus whatever the executor had to say about it
#[derive(Debug, Clone)]
pub struct Execution {
    pub position: Position,
    pub narration: Vec<Narration>,
}

#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Place one order for `signal`, sized from the snapshot and equity
    async fn execute(
        &self,
        signal: Side,
        analysis: &AnalysisResult,
        account_equity: f64,
    ) -> Result<Execution, ExecutionError>;
}
