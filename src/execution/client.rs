//! Execution Service Client
//!
//! Sends planned order tickets to the remote execution function and turns
//! its answer into a [`Position`].

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::ExecutionSettings;
use super::models::{ExecuteRequest, ExecuteResponse};
use super::sizing::OrderTicket;
use super::{Execution, TradeExecutor};
use crate::error::ExecutionError;
use crate::remote::{unwrap_envelope, Envelope, ServiceEndpoint};
use crate::types::{AnalysisResult, Side};

pub const EXECUTE_PATH: &str = "/velocity-breakout/execute";

pub struct ExecutionClient {
    client: Client,
    endpoint: ServiceEndpoint,
    settings: ExecutionSettings,
}

impl ExecutionClient {
    pub fn new(endpoint: ServiceEndpoint, settings: ExecutionSettings) -> Result<Self> {
        Ok(Self {
            client: endpoint.http_client()?,
            endpoint,
            settings,
        })
    }

    async fn submit(&self, request: &ExecuteRequest<'_>) -> Result<Value, ExecutionError> {
        let response = self
            .endpoint
            .authorize(self.client.post(self.endpoint.url(EXECUTE_PATH)))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() { "request timed out".to_string() } else { e.to_string() };
                ExecutionError::Connectivity(reason)
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutionError::Connectivity(format!("failed to read body: {}", e)))?;

        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            warn!("Execution rejected ({}): {}", status, text);
            return Err(ExecutionError::Rejected(format!("status {}: {}", status, text)));
        }
        if !status.is_success() {
            warn!("Execution request failed ({}): {}", status, text);
            return Err(ExecutionError::Connectivity(format!("status {}: {}", status, text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| ExecutionError::Connectivity(format!("unreadable execution response: {}", e)))
    }
}

/// Interpret an execution response body against the ticket that was sent
pub fn interpret(body: Value, ticket: &OrderTicket) -> Result<Execution, ExecutionError> {
    let data = match unwrap_envelope(body) {
        Envelope::Error(msg) => return Err(ExecutionError::Rejected(msg)),
        Envelope::Data(data) => data,
    };

    let response = ExecuteResponse::from_value(&data).ok_or_else(|| {
        ExecutionError::Connectivity(format!("unreadable execution response: {}", data))
    })?;

    if response.success == Some(false) {
        let reason = response.message.unwrap_or_else(|| "order declined".to_string());
        return Err(ExecutionError::Rejected(reason));
    }

    let order_id = response
        .order_id
        .ok_or_else(|| ExecutionError::Connectivity("response carried no order id".to_string()))?;

    let mut position = ticket.fill(order_id);
    // Remote fills win over the local plan
    if let Some(price) = response.entry.price.filter(|p| *p > 0.0) {
        position.entry_price = price;
        position.current_price = price;
    }
    if let Some(lots) = response.entry.lot_size.filter(|l| *l > 0.0) {
        position.lot_size = lots;
    }
    if let Some(stop) = response.risk.stop_loss {
        position.stop_loss = stop;
    }
    if let Some(target) = response.risk.take_profit1 {
        position.take_profit = target;
    }

    Ok(Execution {
        position,
        narration: response.commentary,
    })
}

#[async_trait]
impl TradeExecutor for ExecutionClient {
    async fn execute(
        &self,
        signal: Side,
        analysis: &AnalysisResult,
        account_equity: f64,
    ) -> Result<Execution, ExecutionError> {
        let ticket = OrderTicket::plan(signal, analysis, account_equity, &self.settings)?;
        debug!(
            "Submitting ticket {}: {} {} lots | Stop {:.2} | Target {:.2}",
            ticket.client_order_id, signal, ticket.lot_size, ticket.stop_loss, ticket.take_profit
        );

        let request = ExecuteRequest {
            user_id: &self.endpoint.user_id,
            account_id: self.endpoint.account_id.as_deref(),
            signal,
            analysis_snapshot: analysis,
            ticket: &ticket,
        };

        let body = self.submit(&request).await?;
        let execution = interpret(body, &ticket)?;

        info!(
            "Order {} filled: {} {} lots @ {:.2}",
            execution.position.order_id, signal, execution.position.lot_size, execution.position.entry_price
        );
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commentary::CommentaryKind;
    use serde_json::json;

    fn ticket() -> OrderTicket {
        let analysis = AnalysisResult::neutral(5000.0);
        OrderTicket::plan(Side::Long, &analysis, 10_000.0, &ExecutionSettings::default()).unwrap()
    }

    #[test]
    fn test_interpret_uses_remote_values() {
        let ticket = ticket();
        let body = json!({
            "orderId": "ORD-1",
            "entry": {"price": 5002.0, "lotSize": 1.5},
            "risk": {"stopLoss": 4952.0, "takeProfit1": 5102.0},
            "commentary": ["Long filled", {"type": "risk", "message": "Slippage 2 pts"}]
        });

        let execution = interpret(body, &ticket).unwrap();
        let position = execution.position;
        assert_eq!(position.id, ticket.client_order_id);
        assert_eq!(position.order_id, "ORD-1");
        assert_eq!(position.entry_price, 5002.0);
        assert_eq!(position.lot_size, 1.5);
        assert_eq!(position.stop_loss, 4952.0);
        assert_eq!(position.take_profit, 5102.0);

        assert_eq!(execution.narration.len(), 2);
        assert_eq!(execution.narration[0].kind, CommentaryKind::Analysis);
        assert_eq!(execution.narration[1].kind, CommentaryKind::Risk);
    }

    #[test]
    fn test_interpret_falls_back_to_ticket() {
        let ticket = ticket();
        let execution = interpret(json!({"data": {"orderId": "ORD-2"}, "error": null}), &ticket).unwrap();
        assert_eq!(execution.position.entry_price, 5000.0);
        assert_eq!(execution.position.stop_loss, 4950.0);
        assert_eq!(execution.position.lot_size, 2.0);
    }

    #[test]
    fn test_interpret_rejections() {
        let ticket = ticket();

        let declined = interpret(json!({"success": false, "message": "market closed"}), &ticket);
        assert_eq!(declined.unwrap_err(), ExecutionError::Rejected("market closed".to_string()));

        let enveloped = interpret(json!({"data": null, "error": "insufficient margin"}), &ticket);
        assert!(matches!(enveloped, Err(ExecutionError::Rejected(_))));

        let missing_id = interpret(json!({"entry": {"price": 5000.0}}), &ticket);
        assert!(matches!(missing_id, Err(ExecutionError::Connectivity(_))));
    }

    #[test]
    fn test_interpret_keeps_fills_with_loose_bodies() {
        let ticket = ticket();

        let null_commentary = interpret(json!({"orderId": "A1", "commentary": null}), &ticket).unwrap();
        assert_eq!(null_commentary.position.order_id, "A1");
        assert!(null_commentary.narration.is_empty());

        let numeric_id = interpret(json!({"orderId": 12345}), &ticket).unwrap();
        assert_eq!(numeric_id.position.order_id, "12345");

        let null_entry = interpret(json!({"orderId": "A2", "entry": null}), &ticket).unwrap();
        assert_eq!(null_entry.position.entry_price, 5000.0);
        assert_eq!(null_entry.position.lot_size, 2.0);

        let string_price = interpret(
            json!({"orderId": "A3", "entry": {"price": "5001.5", "lotSize": "1"}}),
            &ticket,
        )
        .unwrap();
        assert_eq!(string_price.position.entry_price, 5001.5);
        assert_eq!(string_price.position.current_price, 5001.5);
        assert_eq!(string_price.position.lot_size, 1.0);

        let mixed = interpret(json!({"orderId": "A4", "commentary": ["Filled", 7]}), &ticket).unwrap();
        assert_eq!(mixed.narration.len(), 1);
        assert_eq!(mixed.narration[0].message, "Filled");
    }

    #[test]
    fn test_interpret_non_object_is_connectivity() {
        let err = interpret(json!(["ORD-1"]), &ticket()).unwrap_err();
        assert!(matches!(err, ExecutionError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_connectivity_error() {
        let mut endpoint = ServiceEndpoint::new("http://127.0.0.1:9", "user-1");
        endpoint.timeout = std::time::Duration::from_millis(500);
        let client = ExecutionClient::new(endpoint, ExecutionSettings::default()).unwrap();

        let analysis = AnalysisResult::neutral(5000.0);
        let err = client.execute(Side::Long, &analysis, 10_000.0).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_invalid_price_never_reaches_service() {
        // Unroutable endpoint: reaching it would surface as Connectivity
        let endpoint = ServiceEndpoint::new("http://127.0.0.1:9", "user-1");
        let client = ExecutionClient::new(endpoint, ExecutionSettings::default()).unwrap();

        let analysis = AnalysisResult::neutral(0.0);
        let err = client.execute(Side::Short, &analysis, 10_000.0).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected(_)));
    }
}
