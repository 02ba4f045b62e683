//! Error types for Routewise

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using Routewise's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Routewise error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Classification errors (E100-E199)
    #[error("Task classification failed: {0}")]
    ClassificationFailed(String),

    // Routing errors (E200-E299)
    #[error("No provider candidates for task type '{0}'")]
    NoCandidates(String),

    #[error("Unknown provider '{0}'. Expected one of: google, openai, anthropic, hf.")]
    UnknownProvider(String),

    // Tracking errors (E300-E399)
    #[error("Failed to record telemetry: {0}")]
    TrackingFailed(String),

    // Input errors (E400-E499)
    #[error("Invalid export range: start {start} is after end {end}")]
    InvalidExportRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Database errors (E700-E799)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Tool errors (E800-E899)
    #[error("Tool execution failed: {0}")]
    ToolFailed(String),

    #[error("Network error: {0}. Check the tool server URL and your connection.")]
    NetworkError(#[from] reqwest::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClassificationFailed(_) => "E100",
            Self::NoCandidates(_) => "E200",
            Self::UnknownProvider(_) => "E201",
            Self::TrackingFailed(_) => "E300",
            Self::InvalidExportRange { .. } => "E400",
            Self::InvalidInput(_) => "E401",
            Self::ConfigError(_) => "E600",
            Self::DatabaseError(_) => "E700",
            Self::ToolFailed(_) => "E800",
            Self::NetworkError(_) => "E801",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Whether the error was caused by the caller's input rather than internal state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidExportRange { .. } | Self::InvalidInput(_) | Self::UnknownProvider(_)
        )
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidExportRange { .. } => {
                Some("Pass a startDate that is earlier than endDate".to_string())
            }
            Self::UnknownProvider(_) => Some("routewise config list".to_string()),
            Self::ConfigError(_) => Some("routewise config path".to_string()),
            Self::NetworkError(_) => Some("routewise config get tools.server_url".to_string()),
            _ => None,
        }
    }
}

/// Lock poisoning means another thread panicked mid-write; surface it as a tracking failure.
impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::TrackingFailed(err.to_string())
    }
}
