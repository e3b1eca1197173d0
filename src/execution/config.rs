//! Configuration for trade execution and position sizing

use serde::{Deserialize, Serialize};

/// Execution mode determines whether orders are simulated or sent to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated execution (filled locally at the analysis price)
    #[default]
    Simulation,
    /// Orders go to the remote execution service
    Remote,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => write!(f, "Simulation"),
            Self::Remote => write!(f, "Remote"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulation" | "sim" => Ok(Self::Simulation),
            "remote" | "live" => Ok(Self::Remote),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

/// Sizing and bracket parameters for every order ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    pub mode: ExecutionMode,

    /// Stop distance from entry in points
    pub stop_loss_points: f64,

    /// Take profit distance as a multiple of the stop distance
    pub reward_risk_ratio: f64,

    /// Percent of account equity risked per trade
    pub risk_percent: f64,

    /// Account currency per point per lot (US30 CFD = 1.0)
    pub point_value: f64,

    /// Lot granularity accepted by the broker
    pub lot_step: f64,

    pub min_lot: f64,

    pub max_lot: f64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Simulation,
            stop_loss_points: 50.0,
            reward_risk_ratio: 2.0,
            risk_percent: 1.0,
            point_value: 1.0,
            lot_step: 0.01,
            min_lot: 0.01,
            max_lot: 50.0,
        }
    }
}

impl ExecutionSettings {
    /// Account currency lost if a position of `lots` is stopped out
    pub fn max_loss(&self, lots: f64) -> f64 {
        self.stop_loss_points * self.point_value * lots
    }

    /// Take profit distance in points
    pub fn take_profit_points(&self) -> f64 {
        self.stop_loss_points * self.reward_risk_ratio
    }
}
