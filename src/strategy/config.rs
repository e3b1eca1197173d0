//! Strategy configuration owned by the controller

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// What to do when a signal repeats while a same-side position is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSidePolicy {
    /// Open another position on top
    Pyramid,
    /// Skip quietly with an analysis note
    #[default]
    Ignore,
    /// Skip and flag it as a risk event
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    pub enabled: bool,
    pub account_equity: f64,
    pub velocity_multiplier: f64,
    pub volume_multiplier: f64,
    pub rsi_upper_threshold: f64,
    pub rsi_lower_threshold: f64,
    pub same_side_policy: SameSidePolicy,
    /// Close positions locally when price crosses their stop or target
    pub close_on_levels: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_equity: 0.0,
            velocity_multiplier: 2.0,
            volume_multiplier: 1.5,
            rsi_upper_threshold: 70.0,
            rsi_lower_threshold: 30.0,
            same_side_policy: SameSidePolicy::Ignore,
            close_on_levels: true,
        }
    }
}

/// Partial update merged by `StrategyController::update_config`.
/// `enabled` is not part of it; that only changes through enable/disable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StrategyConfigUpdate {
    pub account_equity: Option<f64>,
    pub velocity_multiplier: Option<f64>,
    pub volume_multiplier: Option<f64>,
    pub rsi_upper_threshold: Option<f64>,
    pub rsi_lower_threshold: Option<f64>,
    pub same_side_policy: Option<SameSidePolicy>,
    pub close_on_levels: Option<bool>,
}

impl StrategyConfig {
    /// Produce the merged config, or an error leaving `self` untouched
    pub fn merged(&self, update: &StrategyConfigUpdate) -> Result<Self, ControlError> {
        let mut next = self.clone();
        if let Some(v) = update.account_equity {
            next.account_equity = v;
        }
        if let Some(v) = update.velocity_multiplier {
            next.velocity_multiplier = v;
        }
        if let Some(v) = update.volume_multiplier {
            next.volume_multiplier = v;
        }
        if let Some(v) = update.rsi_upper_threshold {
            next.rsi_upper_threshold = v;
        }
        if let Some(v) = update.rsi_lower_threshold {
            next.rsi_lower_threshold = v;
        }
        if let Some(v) = update.same_side_policy {
            next.same_side_policy = v;
        }
        if let Some(v) = update.close_on_levels {
            next.close_on_levels = v;
        }
        next.validate()?;
        Ok(next)
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        let non_negative = [
            ("accountEquity", self.account_equity),
            ("velocityMultiplier", self.velocity_multiplier),
            ("volumeMultiplier", self.volume_multiplier),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ControlError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        let rsi_range = 0.0..=100.0;
        if !rsi_range.contains(&self.rsi_lower_threshold) || !rsi_range.contains(&self.rsi_upper_threshold) {
            return Err(ControlError::InvalidConfig("RSI thresholds must lie within 0..=100".to_string()));
        }
        if self.rsi_lower_threshold >= self.rsi_upper_threshold {
            return Err(ControlError::InvalidConfig(format!(
                "rsiLowerThreshold ({}) must be below rsiUpperThreshold ({})",
                self.rsi_lower_threshold, self.rsi_upper_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_partial() {
        let config = StrategyConfig::default();
        let update = StrategyConfigUpdate {
            account_equity: Some(25_000.0),
            rsi_upper_threshold: Some(75.0),
            ..Default::default()
        };

        let merged = config.merged(&update).unwrap();
        assert_eq!(merged.account_equity, 25_000.0);
        assert_eq!(merged.rsi_upper_threshold, 75.0);
        assert_eq!(merged.rsi_lower_threshold, 30.0);
        assert_eq!(merged.velocity_multiplier, 2.0);
        assert!(!merged.enabled);
    }

    #[test]
    fn test_merge_rejects_invalid() {
        let config = StrategyConfig::default();

        let negative = StrategyConfigUpdate {
            account_equity: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(config.merged(&negative), Err(ControlError::InvalidConfig(_))));

        let inverted = StrategyConfigUpdate {
            rsi_lower_threshold: Some(80.0),
            ..Default::default()
        };
        assert!(config.merged(&inverted).is_err());

        let nan = StrategyConfigUpdate {
            volume_multiplier: Some(f64::NAN),
            ..Default::default()
        };
        assert!(config.merged(&nan).is_err());
    }

    #[test]
    fn test_update_deserializes_camel_case() {
        let update: StrategyConfigUpdate =
            serde_json::from_str(r#"{"accountEquity": 5000, "sameSidePolicy": "pyramid"}"#).unwrap();
        assert_eq!(update.account_equity, Some(5000.0));
        assert_eq!(update.same_side_policy, Some(SameSidePolicy::Pyramid));

        assert!(serde_json::from_str::<StrategyConfigUpdate>(r#"{"enabled": true}"#).is_err());
    }
}
