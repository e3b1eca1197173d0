//! Analysis service request and response types

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::commentary::CommentaryKind;
use crate::error::AnalysisError;
use crate::remote::{field, lenient_bool, lenient_f64, parse_narration, unwrap_envelope, Envelope};
use crate::strategy::StrategyConfig;
use crate::types::{AnalysisResult, Compression, Side, TrendBias, VelocityReading};

/// Neutral RSI used when the service omits it
pub const NEUTRAL_RSI: f64 = 50.0;

/// Strategy parameters forwarded with each request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParams {
    pub velocity_multiplier: f64,
    pub volume_multiplier: f64,
    pub rsi_upper_threshold: f64,
    pub rsi_lower_threshold: f64,
}

impl From<&StrategyConfig> for AnalysisParams {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            velocity_multiplier: config.velocity_multiplier,
            volume_multiplier: config.volume_multiplier,
            rsi_upper_threshold: config.rsi_upper_threshold,
            rsi_lower_threshold: config.rsi_lower_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub config: AnalysisParams,
}

/// Turn a raw response body into an [`AnalysisResult`].
///
/// Only a body that is not a JSON object is rejected. Every missing or
/// malformed field falls back to its neutral value.
pub fn normalize(body: Value) -> Result<AnalysisResult, AnalysisError> {
    let data = match unwrap_envelope(body) {
        Envelope::Error(msg) => return Err(AnalysisError::Unavailable(msg)),
        Envelope::Data(data) => data,
    };
    if !data.is_object() {
        return Err(AnalysisError::InvalidResponse(format!("expected an object, got {}", kind_of(&data))));
    }

    let bias = |keys: &[&str]| {
        field(&data, keys)
            .and_then(Value::as_str)
            .map(TrendBias::parse)
            .unwrap_or_default()
    };

    let compression = field(&data, &["compression"])
        .map(|c| Compression {
            compressed: lenient_bool(field(c, &["compressed", "isCompressed"])).unwrap_or(false),
            count: lenient_f64(field(c, &["count", "bars"]))
                .filter(|n| *n >= 0.0)
                .map(|n| n as u32)
                .unwrap_or(0),
        })
        .unwrap_or_default();

    let neutral = VelocityReading::default();
    let velocity = match field(&data, &["velocity"]) {
        Some(v) => VelocityReading {
            current_velocity: lenient_f64(field(v, &["currentVelocity", "current_velocity"]))
                .unwrap_or(neutral.current_velocity),
            avg_velocity: lenient_f64(field(v, &["avgVelocity", "avg_velocity"]))
                .unwrap_or(neutral.avg_velocity),
            velocity_ratio: lenient_f64(field(v, &["velocityRatio", "velocity_ratio"]))
                .unwrap_or(neutral.velocity_ratio),
            volume_ratio: lenient_f64(field(v, &["volumeRatio", "volume_ratio"]))
                .unwrap_or(neutral.volume_ratio),
        },
        None => neutral,
    };

    let rsi = lenient_f64(field(&data, &["rsi", "RSI"]))
        .filter(|r| (0.0..=100.0).contains(r))
        .unwrap_or(NEUTRAL_RSI);

    let signal = field(&data, &["signal"])
        .and_then(Value::as_str)
        .and_then(Side::parse);

    Ok(AnalysisResult {
        trend_bias_5m: bias(&["trendBias5m", "trend_bias_5m"]),
        trend_bias_1h: bias(&["trendBias1h", "trend_bias_1h"]),
        compression,
        velocity,
        current_price: lenient_f64(field(&data, &["currentPrice", "current_price", "price"])).unwrap_or(0.0),
        rsi,
        signal,
        narration: parse_narration(field(&data, &["commentary"]), CommentaryKind::Analysis),
        observed_at: Utc::now(),
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
