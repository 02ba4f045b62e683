//! Routing endpoints

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;

use super::{ApiResult, AppState};
use crate::classifier::TaskCategory;
use crate::error::Error;
use crate::provider::Provider;
use crate::routing::{ConversationContext, RequestOutcome, RoutingDecision};
use crate::tracking::AggregatedMetrics;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub message: String,
    pub context: ConversationContext,
}

#[derive(Debug, Deserialize)]
pub struct ForceRequest {
    pub provider: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub decision: RoutingDecision,
    pub actual_latency_ms: u64,
    pub actual_cost: f64,
    pub success: bool,
    pub context: ConversationContext,
    #[serde(default)]
    pub user_rating: Option<u8>,
    #[serde(default)]
    pub error_kind: Option<String>,
}

impl PerformanceReport {
    fn into_parts(self) -> crate::Result<(RoutingDecision, RequestOutcome, ConversationContext)> {
        if !self.actual_cost.is_finite() || self.actual_cost < 0.0 {
            return Err(Error::InvalidInput(format!(
                "actualCost must be a non-negative number, got {}",
                self.actual_cost
            )));
        }
        if let Some(rating) = self.user_rating {
            if !(1..=5).contains(&rating) {
                return Err(Error::InvalidInput(format!(
                    "userRating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }

        let outcome = RequestOutcome {
            latency_ms: self.actual_latency_ms,
            cost: self.actual_cost,
            success: self.success,
            user_rating: self.user_rating,
            error_kind: self.error_kind,
        };
        Ok((self.decision, outcome, self.context))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareQuery {
    pub task_type: TaskCategory,
}

/// POST /route
pub async fn route_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> ApiResult<Json<RoutingDecision>> {
    let Json(request) = body?;
    Ok(Json(
        state.router.select_provider(&request.message, &request.context),
    ))
}

/// POST /route/force
pub async fn force_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ForceRequest>, JsonRejection>,
) -> ApiResult<Json<RoutingDecision>> {
    let Json(request) = body?;
    let provider: Provider = request.provider.parse()?;
    Ok(Json(state.router.force_provider(provider, &request.reason)))
}

/// POST /performance
pub async fn performance_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PerformanceReport>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(report) = body?;
    let (decision, outcome, context) = report.into_parts()?;
    state.router.record_performance(&decision, &outcome, &context);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /providers/compare?taskType=
pub async fn compare_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CompareQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AggregatedMetrics>>> {
    let Query(query) = query?;
    Ok(Json(state.tracker.compare_providers(query.task_type)))
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use super::super::test_support::{get_request, post_request, send};
    use super::*;
    use serde_json::{Value, json};

    fn state() -> Arc<AppState> {
        Arc::new(AppState::in_memory())
    }

    #[tokio::test]
    async fn test_route_returns_decision() {
        let (status, body) = send(
            build_router(state()),
            post_request(
                "/route",
                json!({
                    "message": "write a python function to sort a list",
                    "context": {"sessionId": "alice-1"}
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["provider"].is_string());
        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        let fallbacks = body["fallbackProviders"].as_array().unwrap();
        assert!(!fallbacks.contains(&body["provider"]));
    }

    #[tokio::test]
    async fn test_route_rejects_missing_context() {
        let (status, body) = send(
            build_router(state()),
            post_request("/route", json!({"message": "hi"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E401");
    }

    #[tokio::test]
    async fn test_force_known_and_unknown_provider() {
        let app = build_router(state());

        let (status, body) = send(
            app.clone(),
            post_request("/route/force", json!({"provider": "anthropic", "reason": "user asked"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "anthropic");
        assert_eq!(body["confidence"], 1.0);
        assert_eq!(body["reasoning"], "Forced selection: user asked");

        let (status, body) = send(
            app,
            post_request("/route/force", json!({"provider": "acme", "reason": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E201");
    }

    fn performance_body(cost: Value, rating: Value) -> Value {
        json!({
            "decision": {
                "provider": "google",
                "model": "gemini-2.5-flash",
                "confidence": 0.5,
                "reasoning": "test",
                "estimatedCost": 0.001,
                "estimatedLatencyMs": 500,
                "fallbackProviders": []
            },
            "actualLatencyMs": 640,
            "actualCost": cost,
            "success": true,
            "context": {"sessionId": "alice-1", "userId": "alice", "messageHistory": ["hello"]},
            "userRating": rating
        })
    }

    #[tokio::test]
    async fn test_performance_records_metric_and_cost() {
        let state = state();
        let (status, _) = send(
            build_router(Arc::clone(&state)),
            post_request("/performance", performance_body(json!(0.002), json!(4))),
        )
        .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.tracker.len(), 1);
        assert_eq!(state.ledger.len(), 1);
        assert!((state.ledger.user_total("alice") - 0.002).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_performance_validates_rating_and_cost() {
        let state = state();
        let app = build_router(Arc::clone(&state));

        let (status, body) = send(
            app.clone(),
            post_request("/performance", performance_body(json!(0.002), json!(6))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("userRating"));

        let (status, body) = send(
            app,
            post_request("/performance", performance_body(json!(-1.0), Value::Null)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("actualCost"));

        assert!(state.tracker.is_empty());
    }

    #[tokio::test]
    async fn test_compare_requires_valid_task_type() {
        let app = build_router(state());

        let (status, body) = send(
            app.clone(),
            get_request("/providers/compare?taskType=reasoning"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = send(app.clone(), get_request("/providers/compare")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app, get_request("/providers/compare?taskType=poetry")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compare_ranks_tracked_providers() {
        use crate::tracking::PerformanceMetric;

        let state = state();
        state
            .tracker
            .track_request(
                PerformanceMetric::new(Provider::OpenAi, "gpt-4o", TaskCategory::Reasoning, "s")
                    .with_latency(4000)
                    .failed("timeout"),
            )
            .unwrap();
        state
            .tracker
            .track_request(
                PerformanceMetric::new(Provider::Google, "gemini-2.5-pro", TaskCategory::Reasoning, "s")
                    .with_latency(800),
            )
            .unwrap();

        let (status, body) = send(
            build_router(state),
            get_request("/providers/compare?taskType=reasoning"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["provider"], "google");
        assert_eq!(body[1]["provider"], "openai");
    }
}
