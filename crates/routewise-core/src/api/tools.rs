//! Tool execution endpoint

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::Value;

use super::{ApiResult, AppState};
use crate::tools::ToolOutcome;

/// POST /tools/{name}
///
/// Tool failures are reported in the outcome body, not as HTTP errors.
pub async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ToolOutcome>> {
    let Json(arguments) = body?;
    Ok(Json(state.tools.execute(&name, arguments).await))
}
