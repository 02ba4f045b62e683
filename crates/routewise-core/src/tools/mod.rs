//! External tool execution
//!
//! Tools run on a separate tool server. The router only needs the
//! `{success, result}` / `{success, error}` contract, so the executor is a
//! trait and implementations are injected.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ToolsConfig;
use crate::error::{Error, Result};

/// Path of the execution endpoint on the tool server
pub const EXECUTE_PATH: &str = "/api/tools/execute";

/// Result of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Runs a named tool with JSON arguments
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: &str, arguments: Value) -> ToolOutcome;
}

/// Used when no tool server is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledToolExecutor;

#[async_trait]
impl ToolExecutor for DisabledToolExecutor {
    async fn execute(&self, tool: &str, _arguments: Value) -> ToolOutcome {
        debug!(tool = %tool, "Tool execution requested while disabled");
        ToolOutcome::failure("tool execution disabled")
    }
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    tool_name: &'a str,
    arguments: Value,
}

/// Executes tools by POSTing to a tool server
#[derive(Debug, Clone)]
pub struct HttpToolExecutor {
    http_client: HttpClient,
    server_url: String,
    api_key: Option<String>,
}

impl HttpToolExecutor {
    /// Create an executor for a server URL
    pub fn new(server_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Send a bearer token with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn send(&self, tool: &str, arguments: Value) -> Result<ToolOutcome> {
        let url = format!("{}{}", self.server_url, EXECUTE_PATH);

        let mut request = self.http_client.post(&url).json(&ExecuteRequest {
            tool_name: tool,
            arguments,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(Error::NetworkError)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ToolFailed(format!(
                "tool server returned {}: {}",
                status,
                body.trim()
            )));
        }

        response
            .json::<ToolOutcome>()
            .await
            .map_err(|e| Error::ToolFailed(format!("Failed to parse tool response: {}", e)))
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    async fn execute(&self, tool: &str, arguments: Value) -> ToolOutcome {
        debug!(tool = %tool, server = %self.server_url, "Executing tool");

        match self.send(tool, arguments).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tool = %tool, error = %e, "Tool execution failed");
                ToolOutcome::failure(e.to_string())
            }
        }
    }
}

/// Pick an executor from configuration
pub fn executor_from_config(config: &ToolsConfig) -> anyhow::Result<Box<dyn ToolExecutor>> {
    match &config.server_url {
        Some(url) => {
            let mut executor = HttpToolExecutor::new(url, Duration::from_secs(config.timeout_secs))?;
            if let Some(key) = config.resolved_api_key()? {
                executor = executor.with_api_key(key);
            }
            Ok(Box::new(executor))
        }
        None => Ok(Box::new(DisabledToolExecutor)),
    }
}
