// Library crate - exports the strategy loop, its adapters and the control API

pub mod analysis;
pub mod api;
pub mod commentary;
pub mod error;
pub mod execution;
pub mod remote;
pub mod strategy;
pub mod types;

// Re-export commonly used types
pub use commentary::{CommentaryKind, CommentaryLog, CommentaryMessage};
pub use error::{AnalysisError, ControlError, ExecutionError};
pub use strategy::{StrategyConfig, StrategyController};
pub use types::*;
