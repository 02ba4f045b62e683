//! Provider routing
//!
//! Chooses which provider and model should answer a chat message, and feeds
//! the outcome back so later choices improve.
//!
//! - **Catalog**: which providers are available, which model each offers
//!   per task category, and rough latency per model.
//!
//! - **Router**: classifies the message, scores every candidate from the
//!   last 24 hours of outcomes plus the user's preferences, and returns the
//!   best with runners-up as fallbacks. Selection never fails; when nothing
//!   can be scored a default decision is returned instead.
//!
//! - **LoggingRouter**: decorator that logs each call on any
//!   [`ProviderRouter`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use routewise_core::routing::{ConversationContext, ProviderRouter, RequestOutcome, Router};
//!
//! let router = Router::builder().build();
//! let context = ConversationContext::new("user-1:session-9").with_message("write a parser");
//!
//! let decision = router.select_provider("write a parser", &context);
//! // call the provider...
//! router.record_performance(&decision, &RequestOutcome::success(850, 0.0012), &context);
//! ```

mod catalog;
mod logging;
mod router;
mod types;

pub use catalog::{DEFAULT_LATENCY_MS, ProviderCatalog, default_model};
pub use logging::LoggingRouter;
pub use router::{
    FALLBACK_ESTIMATED_COST, FALLBACK_ESTIMATED_LATENCY_MS, NEUTRAL_SCORE, ProviderRouter, Router,
    RouterBuilder, RouterConfig, SCORING_WINDOW_HOURS,
};
pub use types::{
    ConversationContext, RequestOutcome, RoutingDecision, ScoredCandidate, UserPreferences,
};
