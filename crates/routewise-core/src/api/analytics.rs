//! Analytics endpoint

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;

use super::{ApiResult, AppState};
use crate::analytics::CostOverview;
use crate::error::Error;
use crate::tracking::MAX_WINDOW_HOURS;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// Hours to look back
    pub time_window: Option<u32>,
    pub user_id: Option<String>,
}

/// GET /analytics
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> ApiResult<Json<CostOverview>> {
    let Query(query) = query?;

    let window = query.time_window.unwrap_or(state.default_window_hours);
    if window == 0 || window > MAX_WINDOW_HOURS {
        return Err(Error::InvalidInput(format!(
            "timeWindow must be between 1 and {} hours",
            MAX_WINDOW_HOURS
        ))
        .into());
    }

    Ok(Json(
        state
            .analytics
            .cost_overview(window, query.user_id.as_deref()),
    ))
}
