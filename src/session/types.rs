//! Conversation data model
//!
//! These types mirror the JSON payloads exchanged with the document chat
//! backend. Field names follow the wire format (`documentid`,
//! `conversationid`, `additional_kwargs`) so that payloads round-trip
//! without custom serializers.

use crate::error::{DocChatError, Result};
use serde::{Deserialize, Serialize};

/// Message type used for locally synthesized messages
pub const TEXT_MESSAGE_TYPE: &str = "text";

/// A previously uploaded document
///
/// Immutable from the controller's perspective. The backend embeds the
/// document, including the list of its conversations, in every
/// conversation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier
    #[serde(rename = "documentid")]
    pub id: String,

    /// Original filename, sent with every prompt so the backend can locate the index
    pub filename: String,

    /// Upload timestamp as reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Ingestion status as reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstatus: Option<String>,

    /// Conversations that exist for this document
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
}

impl Document {
    /// Creates a document reference with no conversation list
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::session::Document;
    ///
    /// let doc = Document::new("doc1", "report.pdf");
    /// assert_eq!(doc.id, "doc1");
    /// assert!(doc.conversations.is_empty());
    /// ```
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            created: None,
            docstatus: None,
            conversations: Vec::new(),
        }
    }
}

/// Entry in a document's conversation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier
    #[serde(rename = "conversationid")]
    pub id: String,

    /// Creation timestamp as reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// Payload carried by a [`Message`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    /// Prompt or answer text
    pub content: String,

    /// Open key/value bag, currently unused
    #[serde(default)]
    pub additional_kwargs: serde_json::Map<String, serde_json::Value>,

    /// Example flag, always false for locally created messages
    #[serde(default)]
    pub example: bool,
}

/// A single transcript entry
///
/// Messages are append-only: once part of a conversation they are never
/// edited or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message discriminator (`"text"` locally; the backend may use others)
    #[serde(rename = "type")]
    pub kind: String,

    /// Message payload
    pub data: MessageData,
}

impl Message {
    /// Creates a local text message
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::session::Message;
    ///
    /// let msg = Message::text("hello");
    /// assert_eq!(msg.kind, "text");
    /// assert_eq!(msg.content(), "hello");
    /// assert!(!msg.data.example);
    /// ```
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: TEXT_MESSAGE_TYPE.to_string(),
            data: MessageData {
                content: content.into(),
                additional_kwargs: serde_json::Map::new(),
                example: false,
            },
        }
    }

    /// Returns the message text
    pub fn content(&self) -> &str {
        &self.data.content
    }
}

/// A conversation transcript tied to one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier
    #[serde(rename = "conversationid")]
    pub id: String,

    /// Owning document
    pub document: Document,

    /// Messages in display order
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Returns a copy of this conversation with `message` appended
    ///
    /// The receiver is left untouched; the store swaps in the returned value.
    pub fn with_message(&self, message: Message) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(message);
        Self {
            id: self.id.clone(),
            document: self.document.clone(),
            messages,
        }
    }
}

/// Rejects empty or whitespace-only identifiers
///
/// # Errors
///
/// Returns `DocChatError::InvalidIdentifier` naming the offending field.
pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DocChatError::InvalidIdentifier(format!("{} id is empty", kind)).into());
    }
    Ok(())
}
