//! Shared plumbing for the remote analysis and execution services

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::commentary::CommentaryKind;
use crate::types::Narration;

/// Default base URL for a locally running backend
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Where a service lives and who we call it as
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub user_id: String,
    pub account_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ServiceEndpoint {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            account_id: None,
            api_key: None,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to create HTTP client")
    }

    /// Attach the API key header when one is configured
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

/// Commentary as the backend sends it: a bare string or a typed object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireNarration {
    Text(String),
    Typed {
        #[serde(rename = "type")]
        kind: String,
        message: String,
    },
}

impl WireNarration {
    /// Classify, falling back to `default` for untyped or unknown lines
    pub fn into_narration(self, default: CommentaryKind) -> Narration {
        match self {
            WireNarration::Text(message) => Narration::new(default, message),
            WireNarration::Typed { kind, message } => {
                Narration::new(CommentaryKind::parse(&kind).unwrap_or(default), message)
            }
        }
    }
}

/// Parse whatever sits under `commentary`, skipping malformed items
pub fn parse_narration(value: Option<&Value>, default: CommentaryKind) -> Vec<Narration> {
    let items: Vec<Value> = match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => vec![Value::String(s.clone())],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<WireNarration>(item).ok())
        .map(|n| n.into_narration(default))
        .filter(|n| !n.message.trim().is_empty())
        .collect()
}

/// Outcome of peeling the `{data, error}` envelope
#[derive(Debug, PartialEq)]
pub enum Envelope {
    Data(Value),
    Error(String),
}

/// Peel the backend-as-a-service `{data, error}` envelope if present.
/// Bodies without an envelope are returned unchanged.
pub fn unwrap_envelope(body: Value) -> Envelope {
    let Value::Object(mut map) = body else {
        return Envelope::Data(body);
    };

    match map.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {}
        Some(Value::String(msg)) => return Envelope::Error(msg.clone()),
        Some(other) => {
            let msg = other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string());
            return Envelope::Error(msg);
        }
    }

    match map.remove("data") {
        Some(data @ Value::Object(_)) => Envelope::Data(data),
        Some(other) => {
            map.insert("data".to_string(), other);
            Envelope::Data(Value::Object(map))
        }
        None => Envelope::Data(Value::Object(map)),
    }
}

/// Look up the first present, non-null key
pub fn field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Read a number that may have been sent as a string
pub fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn lenient_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
