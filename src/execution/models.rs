//! Execution service request and response types

use serde::Serialize;
use serde_json::Value;

use super::sizing::OrderTicket;
use crate::commentary::CommentaryKind;
use crate::remote::{field, lenient_bool, lenient_f64, parse_narration};
use crate::types::{AnalysisResult, Narration, Side};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest<'a> {
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<&'a str>,
    pub signal: Side,
    pub analysis_snapshot: &'a AnalysisResult,
    pub ticket: &'a OrderTicket,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFill {
    pub price: Option<f64>,
    pub lot_size: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskLevels {
    pub stop_loss: Option<f64>,
    pub take_profit1: Option<f64>,
}

/// Execution service answer, read field by field so that a filled order is
/// never lost to a null or a number sent as a string
#[derive(Debug, Clone, Default)]
pub struct ExecuteResponse {
    pub order_id: Option<String>,
    pub success: Option<bool>,
    pub message: Option<String>,
    pub entry: EntryFill,
    pub risk: RiskLevels,
    pub commentary: Vec<Narration>,
}

impl ExecuteResponse {
    /// Returns `None` only when the body is not a JSON object
    pub fn from_value(data: &Value) -> Option<Self> {
        if !data.is_object() {
            return None;
        }

        let entry = field(data, &["entry"]).unwrap_or(&Value::Null);
        let risk = field(data, &["risk"]).unwrap_or(&Value::Null);

        Some(Self {
            order_id: order_id(field(data, &["orderId", "order_id"])),
            success: lenient_bool(field(data, &["success"])),
            message: field(data, &["message"]).and_then(Value::as_str).map(str::to_string),
            entry: EntryFill {
                price: lenient_f64(field(entry, &["price"])),
                lot_size: lenient_f64(field(entry, &["lotSize", "lot_size"])),
            },
            risk: RiskLevels {
                stop_loss: lenient_f64(field(risk, &["stopLoss", "stop_loss"])),
                take_profit1: lenient_f64(field(risk, &["takeProfit1", "take_profit1", "takeProfit"])),
            },
            commentary: parse_narration(field(data, &["commentary"]), CommentaryKind::Analysis),
        })
    }
}

/// Order ids arrive as strings or bare numbers
fn order_id(value: Option<&Value>) -> Option<String> {
    let id = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::config::ExecutionSettings;
    use serde_json::json;

    #[test]
    fn test_response_parses_documented_shape() {
        let raw = json!({
            "orderId": "ORD-991",
            "entry": {"price": 5001.5, "lotSize": 0.4},
            "risk": {"stopLoss": 4951.5, "takeProfit1": 5101.5},
            "commentary": ["Filled long 0.4 lots"]
        });

        let response = ExecuteResponse::from_value(&raw).unwrap();
        assert_eq!(response.order_id.as_deref(), Some("ORD-991"));
        assert_eq!(response.entry.price, Some(5001.5));
        assert_eq!(response.entry.lot_size, Some(0.4));
        assert_eq!(response.risk.take_profit1, Some(5101.5));
        assert_eq!(response.commentary.len(), 1);
    }

    #[test]
    fn test_response_tolerates_loose_shapes() {
        let response = ExecuteResponse::from_value(&json!({
            "orderId": 12345,
            "entry": {"price": "5001.5", "lotSize": null},
            "risk": null,
            "commentary": null
        }))
        .unwrap();
        assert_eq!(response.order_id.as_deref(), Some("12345"));
        assert_eq!(response.entry.price, Some(5001.5));
        assert_eq!(response.entry.lot_size, None);
        assert_eq!(response.risk, RiskLevels::default());
        assert!(response.commentary.is_empty());

        let blank_id = ExecuteResponse::from_value(&json!({"orderId": "  "})).unwrap();
        assert_eq!(blank_id.order_id, None);

        assert!(ExecuteResponse::from_value(&json!("filled")).is_none());
    }

    #[test]
    fn test_request_serializes_ticket() {
        let analysis = AnalysisResult::neutral(5000.0).with_signal(Side::Long);
        let ticket = OrderTicket::plan(Side::Long, &analysis, 10_000.0, &ExecutionSettings::default()).unwrap();
        let request = ExecuteRequest {
            user_id: "user-1",
            account_id: None,
            signal: Side::Long,
            analysis_snapshot: &analysis,
            ticket: &ticket,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["signal"], "long");
        assert_eq!(json["analysisSnapshot"]["currentPrice"], 5000.0);
        assert_eq!(json["ticket"]["stopLoss"], 4950.0);
        assert!(json.get("accountId").is_none());
    }
}
