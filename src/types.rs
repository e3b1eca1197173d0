//! Shared market and signal types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commentary::CommentaryKind;

/// Direction of a trade signal or position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Parse the loose spellings the backend uses ("long", "BUY", "sell", ...)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Some(Side::Long),
            "short" | "sell" => Some(Side::Short),
            _ => None,
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Trend direction on one timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendBias {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl TrendBias {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bullish" | "bull" | "up" | "long" => TrendBias::Bullish,
            "bearish" | "bear" | "down" | "short" => TrendBias::Bearish,
            _ => TrendBias::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compression {
    pub compressed: bool,
    /// Number of consecutive compressed bars
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityReading {
    pub current_velocity: f64,
    pub avg_velocity: f64,
    pub velocity_ratio: f64,
    pub volume_ratio: f64,
}

impl Default for VelocityReading {
    fn default() -> Self {
        Self {
            current_velocity: 0.0,
            avg_velocity: 0.0,
            velocity_ratio: 1.0,
            volume_ratio: 1.0,
        }
    }
}

/// A commentary line produced by an adapter, already classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    pub kind: CommentaryKind,
    pub message: String,
}

impl Narration {
    pub fn new(kind: CommentaryKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Snapshot of one analysis cycle. Discarded once the cycle ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub trend_bias_5m: TrendBias,
    pub trend_bias_1h: TrendBias,
    pub compression: Compression,
    pub velocity: VelocityReading,
    pub current_price: f64,
    pub rsi: f64,
    pub signal: Option<Side>,
    pub narration: Vec<Narration>,
    pub observed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// A neutral snapshot at `price` with no signal
    pub fn neutral(price: f64) -> Self {
        Self {
            trend_bias_5m: TrendBias::Neutral,
            trend_bias_1h: TrendBias::Neutral,
            compression: Compression::default(),
            velocity: VelocityReading::default(),
            current_price: price,
            rsi: 50.0,
            signal: None,
            narration: Vec::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_signal(mut self, side: Side) -> Self {
        self.signal = Some(side);
        self
    }
}
