//! HTTP API
//!
//! Thin axum layer over the router, tracker, ledger and tool executor.
//! Handlers translate JSON to core calls and core errors to status codes;
//! no routing logic lives here.

pub mod analytics;
pub mod costs;
pub mod health;
pub mod routing;
pub mod tools;

use std::sync::Arc;

use axum::{
    Json, Router as HttpRouter,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analytics::AnalyticsReporter;
use crate::classifier::TaskClassifier;
use crate::config::Config;
use crate::cost::CostLedger;
use crate::error::Error;
use crate::routing::{LoggingRouter, ProviderCatalog, ProviderRouter, Router, RouterConfig};
use crate::tools::{DisabledToolExecutor, ToolExecutor, executor_from_config};
use crate::tracking::{DEFAULT_WINDOW_HOURS, PerformanceTracker};

/// State shared across handlers
pub struct AppState {
    pub router: Arc<dyn ProviderRouter>,
    pub tracker: Arc<PerformanceTracker>,
    pub ledger: Arc<CostLedger>,
    pub analytics: AnalyticsReporter,
    pub tools: Arc<dyn ToolExecutor>,
    /// Window used when a request does not name one
    pub default_window_hours: u32,
}

impl AppState {
    /// Assemble state from already-built services
    pub fn new(
        router: Arc<dyn ProviderRouter>,
        tracker: Arc<PerformanceTracker>,
        ledger: Arc<CostLedger>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            router,
            analytics: AnalyticsReporter::new(Arc::clone(&tracker), Arc::clone(&ledger)),
            tracker,
            ledger,
            tools,
            default_window_hours: DEFAULT_WINDOW_HOURS,
        }
    }

    /// Build every service from configuration around an existing tracker
    pub fn from_config(config: &Config, tracker: Arc<PerformanceTracker>) -> anyhow::Result<Self> {
        let ledger = Arc::new(CostLedger::from_config(&config.cost));

        let router = Router::builder()
            .config(RouterConfig::from_config(config))
            .classifier(TaskClassifier::new().with_max_input_bytes(config.routing.max_input_bytes))
            .catalog(ProviderCatalog::from_config(&config.providers))
            .tracker(Arc::clone(&tracker))
            .ledger(Arc::clone(&ledger))
            .build();

        let tools: Arc<dyn ToolExecutor> = Arc::from(executor_from_config(&config.tools)?);

        let mut state = Self::new(Arc::new(LoggingRouter::new(router)), tracker, ledger, tools);
        state.default_window_hours = config.tracking.window_hours;
        Ok(state)
    }

    /// In-memory state with every provider available and tools disabled
    pub fn in_memory() -> Self {
        let tracker = Arc::new(PerformanceTracker::default());
        let ledger = Arc::new(CostLedger::default());
        let router = Router::builder()
            .catalog(ProviderCatalog::all_available())
            .tracker(Arc::clone(&tracker))
            .ledger(Arc::clone(&ledger))
            .build();

        Self::new(Arc::new(router), tracker, ledger, Arc::new(DisabledToolExecutor))
    }

    /// Replace the tool executor
    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = tools;
        self
    }
}

/// Build the HTTP router
pub fn build_router(state: Arc<AppState>) -> HttpRouter {
    HttpRouter::new()
        .route("/health", get(health::health_handler))
        .route("/route", post(routing::route_handler))
        .route("/route/force", post(routing::force_handler))
        .route("/performance", post(routing::performance_handler))
        .route("/providers/compare", get(routing::compare_handler))
        .route("/analytics", get(analytics::analytics_handler))
        .route(
            "/costs",
            get(costs::list_costs_handler).post(costs::track_cost_handler),
        )
        .route("/tools/{name}", post(tools::execute_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C
pub async fn serve(state: Arc<AppState>, addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Routewise listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Routewise server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// Core error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            warn!(error = %self.0, code = self.0.code(), "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = build_router(Arc::new(AppState::in_memory()));
        let (status, _) = send(app, get_request("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_mapping() {
        let client = ApiError(Error::InvalidInput("x".into())).into_response();
        assert_eq!(client.status(), StatusCode::BAD_REQUEST);

        let server = ApiError(Error::TrackingFailed("x".into())).into_response();
        assert_eq!(server.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_config_builds_state() {
        let mut config = Config::default();
        config.providers.available = Some(vec![crate::provider::Provider::OpenAi]);
        config.tracking.window_hours = 12;

        let state = AppState::from_config(&config, Arc::new(PerformanceTracker::default())).unwrap();
        assert_eq!(state.default_window_hours, 12);

        let decision = state
            .router
            .select_provider("hello", &crate::routing::ConversationContext::new("s"));
        assert_eq!(decision.provider, crate::provider::Provider::OpenAi);
    }
}
