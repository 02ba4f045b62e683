//! Routewise Core Library
//!
//! This crate provides the core functionality for Routewise, including:
//! - Task classification of chat messages
//! - Performance tracking with optional SQLite persistence
//! - Cost ledger with approval thresholds
//! - Provider routing with fallbacks and user preferences
//! - Usage analytics
//! - External tool execution
//! - The axum HTTP API

pub mod analytics;
pub mod api;
pub mod classifier;
pub mod config;
pub mod cost;
pub mod error;
pub mod provider;
pub mod routing;
pub mod tools;
pub mod tracking;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::classifier::{TaskCategory, TaskClassifier};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::provider::Provider;
    pub use crate::routing::{
        ConversationContext, ProviderRouter, RequestOutcome, Router, RoutingDecision,
    };
}
