//! Market analysis adapter
//!
//! The controller calls [`MarketAnalyzer::analyze`] once per cycle. The HTTP
//! implementation lives in [`client`]; [`models`] holds the wire types and
//! the normalization of partially populated responses.

pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::strategy::StrategyConfig;
use crate::types::AnalysisResult;

pub use client::AnalysisClient;

#[async_trait]
pub trait MarketAnalyzer: Send + Sync {
    /// Evaluate current market conditions under `config`
    async fn analyze(&self, config: &StrategyConfig) -> Result<AnalysisResult, AnalysisError>;
}
