//! HTTP control surface for the dashboard

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ControlError;
use crate::strategy::{CycleOutcome, StrategyConfigUpdate, StrategyController};

/// Query params for the commentary endpoint
#[derive(Debug, Deserialize)]
pub struct CommentaryQueryParams {
    pub limit: Option<usize>,
}

/// Response for lifecycle toggles
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub enabled: bool,
    /// False when the strategy was already in the requested state
    pub changed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResponse {
    pub total_risk_used: f64,
    pub unrealized_pnl: f64,
    pub account_equity: f64,
}

pub fn router(controller: StrategyController) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/strategy", get(get_status))
        .route("/api/strategy/enable", post(enable))
        .route("/api/strategy/disable", post(disable))
        .route("/api/strategy/refresh", post(refresh))
        .route("/api/strategy/config", patch(update_config))
        .route("/api/commentary", get(get_commentary))
        .route("/api/positions", get(get_positions))
        .route("/api/positions/closed", get(get_closed_positions))
        .route("/api/positions/{id}", get(get_position))
        .route("/api/positions/{id}/close", post(close_position))
        .route("/api/risk", get(get_risk))
        .route("/api/performance", get(get_performance))
        .with_state(controller)
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/strategy - Lifecycle state and current config
pub async fn get_status(State(controller): State<StrategyController>) -> impl IntoResponse {
    Json(controller.status().await)
}

/// POST /api/strategy/enable
pub async fn enable(State(controller): State<StrategyController>) -> impl IntoResponse {
    let changed = controller.enable().await;
    Json(ToggleResponse { enabled: true, changed })
}

/// POST /api/strategy/disable
pub async fn disable(State(controller): State<StrategyController>) -> impl IntoResponse {
    let changed = controller.disable().await;
    Json(ToggleResponse { enabled: false, changed })
}

/// POST /api/strategy/refresh - Run one cycle now
pub async fn refresh(State(controller): State<StrategyController>) -> impl IntoResponse {
    let outcome = match controller.refresh_now().await {
        CycleOutcome::Skipped => serde_json::json!({"outcome": "skipped"}),
        CycleOutcome::AnalysisFailed(e) => serde_json::json!({"outcome": "analysisFailed", "error": e.to_string()}),
        CycleOutcome::NoSignal => serde_json::json!({"outcome": "noSignal"}),
        CycleOutcome::SignalIgnored { signal, reason } => {
            serde_json::json!({"outcome": "signalIgnored", "signal": signal, "reason": reason})
        }
        CycleOutcome::Executed { position_id } => {
            serde_json::json!({"outcome": "executed", "positionId": position_id})
        }
        CycleOutcome::ExecutionFailed(e) => {
            serde_json::json!({"outcome": "executionFailed", "error": e.to_string()})
        }
    };
    (StatusCode::OK, Json(outcome))
}

/// PATCH /api/strategy/config - Merge a partial config
pub async fn update_config(
    State(controller): State<StrategyController>,
    Json(update): Json<StrategyConfigUpdate>,
) -> impl IntoResponse {
    match controller.update_config(update).await {
        Ok(config) => (StatusCode::OK, Json(serde_json::json!(config))),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

/// GET /api/commentary?limit=N
pub async fn get_commentary(
    State(controller): State<StrategyController>,
    Query(params): Query<CommentaryQueryParams>,
) -> impl IntoResponse {
    Json(controller.commentary(params.limit).await)
}

/// GET /api/positions - Open positions
pub async fn get_positions(State(controller): State<StrategyController>) -> impl IntoResponse {
    Json(controller.open_positions().await)
}

/// GET /api/positions/closed
pub async fn get_closed_positions(State(controller): State<StrategyController>) -> impl IntoResponse {
    Json(controller.closed_positions().await)
}

/// GET /api/positions/{id} - One open position
pub async fn get_position(
    State(controller): State<StrategyController>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match controller.position(id).await {
        Ok(position) => (StatusCode::OK, Json(serde_json::json!(position))),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

/// POST /api/positions/{id}/close
pub async fn close_position(
    State(controller): State<StrategyController>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match controller.close_position(id).await {
        Ok(closed) => (StatusCode::OK, Json(serde_json::json!(closed))),
        Err(e @ ControlError::PositionNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

/// GET /api/risk
pub async fn get_risk(State(controller): State<StrategyController>) -> impl IntoResponse {
    let total_risk_used = controller.total_risk_used().await;
    let unrealized_pnl = controller.unrealized_pnl().await;
    let account_equity = controller.config().await.account_equity;
    Json(RiskResponse {
        total_risk_used,
        unrealized_pnl,
        account_equity,
    })
}

/// GET /api/performance
pub async fn get_performance(State(controller): State<StrategyController>) -> impl IntoResponse {
    Json(controller.metrics().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MarketAnalyzer;
    use crate::error::AnalysisError;
    use crate::execution::{ExecutionSettings, SimulatedExecutor};
    use crate::strategy::{ControllerSettings, StrategyConfig};
    use crate::types::{AnalysisResult, Side};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct LongSignal;

    #[async_trait]
    impl MarketAnalyzer for LongSignal {
        async fn analyze(&self, _config: &StrategyConfig) -> Result<AnalysisResult, AnalysisError> {
            Ok(AnalysisResult::neutral(5000.0).with_signal(Side::Long))
        }
    }

    fn app(equity: f64) -> (Router, StrategyController) {
        let controller = StrategyController::new(
            Arc::new(LongSignal),
            Arc::new(SimulatedExecutor::new(ExecutionSettings::default())),
            StrategyConfig {
                account_equity: equity,
                ..Default::default()
            },
            ControllerSettings::default(),
        );
        (router(controller.clone()), controller)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let request = request
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(0.0);
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_then_read_positions_and_risk() {
        let (app, _) = app(10_000.0);

        let (status, _) = call(&app, "POST", "/api/strategy/enable", None).await;
        assert_eq!(status, StatusCode::OK);
        // Let the immediate first cycle run
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        let (_, positions) = call(&app, "GET", "/api/positions", None).await;
        assert_eq!(positions.as_array().unwrap().len(), 1);
        assert_eq!(positions[0]["side"], "long");
        assert_eq!(positions[0]["entryPrice"], 5000.0);

        let id = positions[0]["id"].as_str().unwrap().to_string();
        let (status, one) = call(&app, "GET", &format!("/api/positions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(one["id"], id.as_str());

        // Same side already open: ignored by default
        let (_, body) = call(&app, "POST", "/api/strategy/refresh", None).await;
        assert_eq!(body["outcome"], "signalIgnored");

        let (_, risk) = call(&app, "GET", "/api/risk", None).await;
        assert_eq!(risk["totalRiskUsed"], 1.0);
        assert_eq!(risk["unrealizedPnl"], 0.0);

        let (_, perf) = call(&app, "GET", "/api/performance", None).await;
        assert_eq!(perf["totalTrades"], 1);
        assert_eq!(perf["velocityAccuracy"]["accuracy"], 0.0);

        let (_, feed) = call(&app, "GET", "/api/commentary?limit=1", None).await;
        assert_eq!(feed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_while_disabled_does_not_trade() {
        let (app, controller) = app(10_000.0);

        let (status, body) = call(&app, "POST", "/api/strategy/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "signalIgnored");
        assert_eq!(body["reason"], "strategy is disabled");
        assert!(controller.open_positions().await.is_empty());
    }

    #[tokio::test]
    async fn test_config_patch_validation() {
        let (app, controller) = app(0.0);

        let (status, body) = call(&app, "PATCH", "/api/strategy/config", Some(r#"{"accountEquity": 2500}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accountEquity"], 2500.0);
        assert_eq!(controller.config().await.account_equity, 2500.0);

        let (status, _) = call(&app, "PATCH", "/api/strategy/config", Some(r#"{"rsiLowerThreshold": 95}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_close_unknown_position_is_404() {
        let (app, _) = app(10_000.0);
        let uri = format!("/api/positions/{}/close", Uuid::new_v4());
        let (status, body) = call(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let uri = format!("/api/positions/{}", Uuid::new_v4());
        let (status, _) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_enable_disable_toggle() {
        let (app, controller) = app(0.0);

        let (_, body) = call(&app, "POST", "/api/strategy/enable", None).await;
        assert_eq!(body["changed"], true);
        let (_, body) = call(&app, "POST", "/api/strategy/enable", None).await;
        assert_eq!(body["changed"], false);
        assert!(controller.is_enabled().await);

        let (_, status) = call(&app, "GET", "/api/strategy", None).await;
        assert_eq!(status["enabled"], true);

        let (_, body) = call(&app, "POST", "/api/strategy/disable", None).await;
        assert_eq!(body["changed"], true);
        assert!(!controller.is_enabled().await);
    }
}
