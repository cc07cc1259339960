//! Error types for DocChat
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use crate::session::DispatchReport;
use thiserror::Error;

/// Main error type for DocChat operations
///
/// Covers configuration problems, identifier and route validation,
/// backend failures, and the session controller's own guard rails
/// (re-entrant submission, partially failed dispatch rounds).
#[derive(Error, Debug)]
pub enum DocChatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A document or conversation identifier was empty or malformed
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A route string could not be parsed
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// The backend answered with a non-success status
    #[error("Backend error (status {status}): {message}")]
    Backend {
        /// HTTP status code returned by the backend
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The requested document or conversation does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A submission was attempted while another one is still in flight
    #[error("A message submission is already in progress")]
    SubmissionInProgress,

    /// One or more sub-questions of a dispatch round failed
    #[error("Dispatch failed: {failed} of {total} questions failed")]
    DispatchFailed {
        /// Number of questions that failed after retries
        failed: usize,
        /// Number of questions in the round
        total: usize,
        /// Per-question outcomes of the round
        report: Box<DispatchReport>,
    },

    /// The navigation collaborator rejected a location change
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for DocChat operations
///
/// Uses `anyhow::Error` so context can be attached while propagating;
/// callers downcast to [`DocChatError`] when they need a specific variant.
pub type Result<T> = anyhow::Result<T>;
