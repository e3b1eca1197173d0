//! Analysis Service Client
//!
//! HTTP client for the remote velocity-breakout analysis function.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::models::{normalize, AnalysisParams, AnalyzeRequest};
use super::MarketAnalyzer;
use crate::error::AnalysisError;
use crate::remote::ServiceEndpoint;
use crate::strategy::StrategyConfig;
use crate::types::AnalysisResult;

pub const ANALYZE_PATH: &str = "/velocity-breakout/analyze";

pub struct AnalysisClient {
    client: Client,
    endpoint: ServiceEndpoint,
}

impl AnalysisClient {
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            client: endpoint.http_client()?,
            endpoint,
        })
    }

    fn request_for(&self, config: &StrategyConfig) -> AnalyzeRequest {
        AnalyzeRequest {
            user_id: self.endpoint.user_id.clone(),
            account_id: self.endpoint.account_id.clone(),
            config: AnalysisParams::from(config),
        }
    }
}

#[async_trait]
impl MarketAnalyzer for AnalysisClient {
    async fn analyze(&self, config: &StrategyConfig) -> Result<AnalysisResult, AnalysisError> {
        let request = self.request_for(config);
        debug!("Requesting analysis for user {}", request.user_id);

        let response = self
            .endpoint
            .authorize(self.client.post(self.endpoint.url(ANALYZE_PATH)))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() { "request timed out".to_string() } else { e.to_string() };
                AnalysisError::Unavailable(reason)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Analysis request failed ({}): {}", status, body);
            return Err(AnalysisError::Unavailable(format!("status {}: {}", status, body)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Unavailable(format!("failed to read body: {}", e)))?;

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::InvalidResponse(format!("not JSON: {}", e)))?;

        normalize(body)
    }
}
