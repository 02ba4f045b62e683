//! Types for provider routing

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Outcome of a routing call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    /// Selected provider
    pub provider: Provider,
    /// Selected model on that provider
    pub model: String,
    /// Score of the selected candidate (0.0 to 1.0)
    pub confidence: f64,
    /// Human readable explanation of the score
    pub reasoning: String,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    pub estimated_latency_ms: u64,
    /// Next-best providers, never containing `provider`
    #[serde(default)]
    pub fallback_providers: Vec<Provider>,
}

/// Per-user routing preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub preferred_provider: Option<Provider>,
    pub cost_sensitive: bool,
    pub quality_priority: bool,
    pub speed_priority: bool,
}

/// Conversation the message belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub session_id: String,
    /// Prior messages, oldest first
    #[serde(default)]
    pub message_history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_preferences: Option<UserPreferences>,
}

impl ConversationContext {
    /// Create a context for a session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Set the user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Append a message to the history
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message_history.push(message.into());
        self
    }

    /// Set routing preferences
    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.user_preferences = Some(preferences);
        self
    }

    /// Most recent message, or the empty string
    pub fn last_message(&self) -> &str {
        self.message_history.last().map(String::as_str).unwrap_or("")
    }

    pub(crate) fn preferences(&self) -> UserPreferences {
        self.user_preferences.clone().unwrap_or_default()
    }
}

/// Facts observed after the provider call completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcome {
    pub latency_ms: u64,
    /// Actual cost in USD
    pub cost: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl RequestOutcome {
    /// A successful outcome
    pub fn success(latency_ms: u64, cost: f64) -> Self {
        Self {
            latency_ms,
            cost,
            success: true,
            user_rating: None,
            error_kind: None,
        }
    }

    /// A failed outcome
    pub fn failure(latency_ms: u64, error_kind: impl Into<String>) -> Self {
        Self {
            latency_ms,
            cost: 0.0,
            success: false,
            user_rating: None,
            error_kind: Some(error_kind.into()),
        }
    }

    /// Attach a user rating
    pub fn with_rating(mut self, rating: u8) -> Self {
        self.user_rating = Some(rating);
        self
    }
}

/// A scored `{provider, model}` pair considered during selection
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub provider: Provider,
    pub model: String,
    pub score: f64,
    pub reasoning: String,
    pub estimated_cost: f64,
    pub estimated_latency_ms: u64,
}
