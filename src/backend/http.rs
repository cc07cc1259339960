//! HTTP implementation of the [`Backend`] trait
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET  doc/{documentid}/{conversationid}` returns a conversation
//! - `POST doc/{documentid}` creates a conversation, returns `{"conversationid"}`
//! - `POST {documentid}/{conversationid}` with `{"fileName", "prompt"}` answers a prompt

use crate::backend::{Backend, PromptRequest};
use crate::config::BackendConfig;
use crate::error::{DocChatError, Result};
use crate::session::Conversation;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// reqwest-based backend client
///
/// # Examples
///
/// ```
/// use docchat::backend::HttpBackend;
/// use docchat::config::BackendConfig;
///
/// let config = BackendConfig {
///     base_url: "http://localhost:3000/api".to_string(),
///     ..Default::default()
/// };
/// let backend = HttpBackend::new(&config);
/// assert!(backend.is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct CreateConversationResponse {
    conversationid: String,
}

#[derive(Debug, Serialize)]
struct PromptBody<'a> {
    #[serde(rename = "fileName")]
    file_name: &'a str,
    prompt: &'a str,
}

impl HttpBackend {
    /// Create a new HTTP backend
    ///
    /// # Errors
    ///
    /// Returns error if the base URL cannot be parsed or cannot carry a path,
    /// or if HTTP client initialization fails
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(DocChatError::Config(format!(
                "Backend URL cannot carry a path: {}",
                config.base_url
            ))
            .into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DocChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized HTTP backend: base_url={}", base_url);

        Ok(Self { client, base_url })
    }

    /// Configured base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL by appending percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DocChatError::Config(format!("Backend URL cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Map non-success responses to `DocChatError`
    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            backend.status = status.as_u16(),
            backend.operation = what,
            "Backend request failed"
        );

        if status == StatusCode::NOT_FOUND {
            return Err(DocChatError::NotFound(what.to_string()).into());
        }

        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            body
        };
        Err(DocChatError::Backend {
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_conversation(
        &self,
        document_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation> {
        let url = self.endpoint(&["doc", document_id, conversation_id])?;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(DocChatError::from)?;
        let response = Self::check(
            response,
            &format!("conversation {}/{}", document_id, conversation_id),
        )
        .await?;

        let conversation = response
            .json::<Conversation>()
            .await
            .map_err(DocChatError::from)?;
        Ok(conversation)
    }

    async fn create_conversation(&self, document_id: &str) -> Result<String> {
        let url = self.endpoint(&["doc", document_id])?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(DocChatError::from)?;
        let response = Self::check(response, &format!("document {}", document_id)).await?;

        let created = response
            .json::<CreateConversationResponse>()
            .await
            .map_err(DocChatError::from)?;
        Ok(created.conversationid)
    }

    async fn submit_prompt(&self, request: &PromptRequest) -> Result<String> {
        let url = self.endpoint(&[
            request.document_id.as_str(),
            request.conversation_id.as_str(),
        ])?;
        tracing::debug!("POST {}", url);

        let body = PromptBody {
            file_name: &request.filename,
            prompt: &request.prompt,
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(DocChatError::from)?;
        let response = Self::check(
            response,
            &format!(
                "conversation {}/{}",
                request.document_id, request.conversation_id
            ),
        )
        .await?;

        Ok(response.text().await.map_err(DocChatError::from)?)
    }
}
