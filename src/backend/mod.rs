//! Backend module for DocChat
//!
//! This module contains the abstraction over the document chat service and
//! its HTTP implementation. The session controller only talks to the
//! [`Backend`] trait, so tests can substitute [`fake::FakeBackend`].

pub mod fake;
pub mod http;

pub use http::HttpBackend;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::session::Conversation;
use async_trait::async_trait;
use std::sync::Arc;

/// A single prompt sent to the backend
///
/// The backend answers the prompt against the document's index and
/// persists both the question and the answer in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// Document the conversation belongs to
    pub document_id: String,
    /// Conversation the answer is persisted into
    pub conversation_id: String,
    /// Document filename used by the backend to locate the index
    pub filename: String,
    /// Question text
    pub prompt: String,
}

/// Operations the controller consumes from the document chat service
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetches a conversation with its document and messages
    ///
    /// # Errors
    ///
    /// Returns `DocChatError::NotFound` if the conversation does not exist,
    /// or a backend/transport error.
    async fn get_conversation(&self, document_id: &str, conversation_id: &str)
        -> Result<Conversation>;

    /// Creates a new conversation under a document
    ///
    /// # Returns
    ///
    /// The new conversation identifier
    async fn create_conversation(&self, document_id: &str) -> Result<String>;

    /// Submits a prompt and waits for the answer
    ///
    /// # Returns
    ///
    /// The answer text as returned by the backend. The controller does not
    /// use it directly; the authoritative transcript comes from a reload.
    async fn submit_prompt(&self, request: &PromptRequest) -> Result<String>;
}

/// Create the configured backend
///
/// # Errors
///
/// Returns error if the base URL is invalid or the HTTP client cannot be built
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(HttpBackend::new(config)?))
}
