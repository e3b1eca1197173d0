//! Velocity breakout strategy loop
//!
//! - [`config`] - strategy parameters and partial updates
//! - [`controller`] - enable/disable lifecycle, polling timer and cycle logic

pub mod config;
pub mod controller;

pub use config::{SameSidePolicy, StrategyConfig, StrategyConfigUpdate};
pub use controller::{ControllerSettings, ControllerStatus, CycleOutcome, CyclePhase, StrategyController};
