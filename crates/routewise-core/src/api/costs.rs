//! Cost ledger endpoints

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState};
use crate::cost::CostRecord;
use crate::error::Error;

/// Filters for GET /costs. The first present filter wins, in field order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostQuery {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostListResponse {
    pub costs: Vec<CostRecord>,
    pub total: f64,
    pub count: usize,
}

impl From<Vec<CostRecord>> for CostListResponse {
    fn from(costs: Vec<CostRecord>) -> Self {
        Self {
            total: costs.iter().map(|r| r.cost).sum(),
            count: costs.len(),
            costs,
        }
    }
}

/// Body of POST /costs. Fields are optional here so missing ones can be named.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackCostRequest {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackCostResponse {
    pub cost_record: CostRecord,
    pub needs_approval: bool,
    pub can_auto_approve: bool,
    pub payment_required: bool,
}

/// GET /costs
pub async fn list_costs_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CostQuery>, QueryRejection>,
) -> ApiResult<Json<CostListResponse>> {
    let Query(query) = query?;

    let costs = if let Some(session_id) = &query.session_id {
        state.ledger.session_costs(session_id)
    } else if let Some(user_id) = &query.user_id {
        state.ledger.user_costs(user_id)
    } else {
        state.ledger.export_costs(query.start_date, query.end_date)?
    };

    Ok(Json(costs.into()))
}

/// POST /costs
pub async fn track_cost_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TrackCostRequest>, JsonRejection>,
) -> ApiResult<Json<TrackCostResponse>> {
    let Json(request) = body?;

    let mut missing = Vec::new();
    if request.provider.as_deref().is_none_or(str::is_empty) {
        missing.push("provider");
    }
    if request.model.as_deref().is_none_or(str::is_empty) {
        missing.push("model");
    }
    if request.input_tokens.is_none() {
        missing.push("inputTokens");
    }
    if request.output_tokens.is_none() {
        missing.push("outputTokens");
    }
    if request.session_id.as_deref().is_none_or(str::is_empty) {
        missing.push("sessionId");
    }
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Missing required fields: {}",
            missing.join(", ")
        ))
        .into());
    }

    let record = state.ledger.track_cost(
        request.provider.as_deref().unwrap_or_default(),
        request.model.as_deref().unwrap_or_default(),
        request.input_tokens.unwrap_or_default(),
        request.output_tokens.unwrap_or_default(),
        request.session_id.as_deref().unwrap_or_default(),
        request.user_id.as_deref(),
    )?;

    let cost = record.cost;
    Ok(Json(TrackCostResponse {
        needs_approval: state.ledger.needs_approval(cost),
        can_auto_approve: state.ledger.can_auto_approve(cost),
        payment_required: state.ledger.payment_required(cost),
        cost_record: record,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use super::super::test_support::{get_request, post_request, send};
    use super::*;
    use axum::http::StatusCode;
    use chrono::Duration;
    use serde_json::json;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::in_memory())
    }

    #[tokio::test]
    async fn test_track_cost_prices_and_flags() {
        let state = state();
        let (status, body) = send(
            build_router(Arc::clone(&state)),
            post_request(
                "/costs",
                json!({
                    "provider": "openai",
                    "model": "gpt-4o",
                    "inputTokens": 1000,
                    "outputTokens": 1000,
                    "sessionId": "alice-1",
                    "userId": "alice"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let cost = body["costRecord"]["cost"].as_f64().unwrap();
        assert!(cost > 0.0);
        assert_eq!(body["costRecord"]["sessionId"], "alice-1");
        assert_eq!(body["canAutoApprove"], state.ledger.can_auto_approve(cost));
        assert_eq!(body["needsApproval"], state.ledger.needs_approval(cost));
        assert_eq!(state.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_track_cost_names_missing_fields() {
        let (status, body) = send(
            build_router(state()),
            post_request("/costs", json!({"provider": "openai", "inputTokens": 10})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("model"));
        assert!(error.contains("outputTokens"));
        assert!(error.contains("sessionId"));
        assert!(!error.contains("provider,"));
    }

    #[tokio::test]
    async fn test_list_costs_by_session_and_user() {
        let state = state();
        state
            .ledger
            .track_billed_cost("google", "gemini-2.5-flash", 0, 0, 0.25, "alice-1", Some("alice"))
            .unwrap();
        state
            .ledger
            .track_billed_cost("google", "gemini-2.5-flash", 0, 0, 0.5, "bob-1", Some("bob"))
            .unwrap();
        let app = build_router(state);

        let (status, body) = send(app.clone(), get_request("/costs?sessionId=alice-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["total"], 0.25);

        let (_, body) = send(app.clone(), get_request("/costs?userId=bob")).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["costs"][0]["userId"], "bob");

        let (_, body) = send(app, get_request("/costs")).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["total"], 0.75);
    }

    #[tokio::test]
    async fn test_list_costs_date_range() {
        let state = state();
        let old = Utc::now() - Duration::days(10);
        state
            .ledger
            .track_cost_at("openai", "gpt-4o", 100, 100, "s", None, old)
            .unwrap();
        state
            .ledger
            .track_cost("openai", "gpt-4o", 100, 100, "s", None)
            .unwrap();
        let app = build_router(state);

        let start = (Utc::now() - Duration::days(1)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let (status, body) = send(app.clone(), get_request(&format!("/costs?startDate={}", start))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let end = (Utc::now() - Duration::days(2)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let (status, body) = send(
            app,
            get_request(&format!("/costs?startDate={}&endDate={}", start, end)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E400");
    }
}
