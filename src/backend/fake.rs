//! In-process fake backend for unit and integration tests
//!
//! [`FakeBackend`] keeps documents and transcripts in memory and behaves
//! like the real service: answering a prompt persists a `human` message and
//! an `ai` message into the conversation, and creating a conversation adds
//! it to the document's conversation list.
//!
//! Tests can shape its behavior per prompt (delays, failures), hold every
//! prompt at a gate until released, and inspect an ordered event log to
//! check when reloads happened relative to the fan-out.
//!
//! # Example
//!
//! ```
//! use docchat::backend::fake::FakeBackend;
//! use docchat::backend::{Backend, PromptRequest};
//! use docchat::session::Document;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = FakeBackend::new();
//! backend.add_document(Document::new("doc1", "file.pdf"));
//! let id = backend.create_conversation("doc1").await.unwrap();
//!
//! backend
//!     .submit_prompt(&PromptRequest {
//!         document_id: "doc1".to_string(),
//!         conversation_id: id.clone(),
//!         filename: "file.pdf".to_string(),
//!         prompt: "question".to_string(),
//!     })
//!     .await
//!     .unwrap();
//!
//! let conversation = backend.get_conversation("doc1", &id).await.unwrap();
//! assert_eq!(conversation.messages.len(), 2);
//! # }
//! ```

use crate::backend::{Backend, PromptRequest};
use crate::error::{DocChatError, Result};
use crate::session::types::{Conversation, ConversationSummary, Document, Message, MessageData};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Something the fake backend observed, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    /// `get_conversation` was called
    Get {
        /// Requested conversation
        conversation_id: String,
    },
    /// `create_conversation` was called and returned `conversation_id`
    Create {
        /// Owning document
        document_id: String,
        /// Identifier handed out
        conversation_id: String,
    },
    /// A prompt request arrived
    PromptStarted {
        /// Prompt text
        prompt: String,
    },
    /// A prompt request finished
    PromptFinished {
        /// Prompt text
        prompt: String,
        /// Whether the request succeeded
        ok: bool,
    },
}

#[derive(Debug, Default)]
struct FakeState {
    documents: HashMap<String, Document>,
    transcripts: HashMap<(String, String), Vec<Message>>,
    prompts: Vec<PromptRequest>,
    events: Vec<FakeEvent>,
    failures: HashMap<String, u32>,
    delays: HashMap<String, Duration>,
    failing_gets: bool,
    in_flight: usize,
    max_in_flight: usize,
    next_id: usize,
}

/// In-memory [`Backend`] implementation
#[derive(Debug)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    gate: watch::Sender<bool>,
}

impl FakeBackend {
    /// Creates an empty backend with the prompt gate open
    pub fn new() -> Self {
        let (gate, _rx) = watch::channel(true);
        Self {
            state: Mutex::new(FakeState::default()),
            gate,
        }
    }

    /// Registers a document
    pub fn add_document(&self, document: Document) {
        self.lock().documents.insert(document.id.clone(), document);
    }

    /// Stores a conversation, registering its document and listing it there
    pub fn insert(&self, conversation: Conversation) {
        let mut state = self.lock();
        let document_id = conversation.document.id.clone();
        let document = state
            .documents
            .entry(document_id.clone())
            .or_insert_with(|| Document {
                conversations: Vec::new(),
                ..conversation.document.clone()
            });
        if !document
            .conversations
            .iter()
            .any(|summary| summary.id == conversation.id)
        {
            document.conversations.push(ConversationSummary {
                id: conversation.id.clone(),
                created: None,
            });
        }
        state
            .transcripts
            .insert((document_id, conversation.id), conversation.messages);
    }

    /// Returns the stored conversation, as `get_conversation` would
    pub fn conversation(&self, document_id: &str, conversation_id: &str) -> Option<Conversation> {
        Self::build(&self.lock(), document_id, conversation_id)
    }

    /// Fails the next `times` requests for `prompt`
    pub fn fail_prompt(&self, prompt: &str, times: u32) {
        self.lock().failures.insert(prompt.to_string(), times);
    }

    /// Fails every request for `prompt`
    pub fn fail_prompt_always(&self, prompt: &str) {
        self.fail_prompt(prompt, u32::MAX);
    }

    /// Delays the answer to `prompt`
    pub fn delay_prompt(&self, prompt: &str, delay: Duration) {
        self.lock().delays.insert(prompt.to_string(), delay);
    }

    /// Makes every `get_conversation` call fail with a 503
    pub fn fail_gets(&self, failing: bool) {
        self.lock().failing_gets = failing;
    }

    /// Holds prompt requests at a gate until [`release`](Self::release)
    pub fn hold_prompts(&self) {
        self.gate.send_replace(false);
    }

    /// Opens the prompt gate
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Every prompt request received, in arrival order
    pub fn prompts(&self) -> Vec<PromptRequest> {
        self.lock().prompts.clone()
    }

    /// Number of prompt requests received
    pub fn prompt_count(&self) -> usize {
        self.lock().prompts.len()
    }

    /// Number of `get_conversation` calls
    pub fn get_calls(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, FakeEvent::Get { .. }))
            .count()
    }

    /// Number of `create_conversation` calls
    pub fn create_calls(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, FakeEvent::Create { .. }))
            .count()
    }

    /// Largest number of prompt requests that were in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Ordered event log
    pub fn events(&self) -> Vec<FakeEvent> {
        self.lock().events.clone()
    }

    /// Waits until at least `count` prompt requests have arrived
    ///
    /// # Errors
    ///
    /// Returns error if they do not arrive within `timeout`
    pub async fn wait_for_prompts(&self, count: usize, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.prompt_count() < count {
            if tokio::time::Instant::now() >= deadline {
                return Err(anyhow::anyhow!(
                    "expected {} prompts, saw {}",
                    count,
                    self.prompt_count()
                ));
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build(state: &FakeState, document_id: &str, conversation_id: &str) -> Option<Conversation> {
        let document = state.documents.get(document_id)?;
        let messages = state
            .transcripts
            .get(&(document_id.to_string(), conversation_id.to_string()))?;
        Some(Conversation {
            id: conversation_id.to_string(),
            document: document.clone(),
            messages: messages.clone(),
        })
    }

    fn persisted(kind: &str, content: String) -> Message {
        Message {
            kind: kind.to_string(),
            data: MessageData {
                content,
                additional_kwargs: serde_json::Map::new(),
                example: false,
            },
        }
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_conversation(
        &self,
        document_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation> {
        let mut state = self.lock();
        state.events.push(FakeEvent::Get {
            conversation_id: conversation_id.to_string(),
        });
        if state.failing_gets {
            return Err(DocChatError::Backend {
                status: 503,
                message: "service unavailable".to_string(),
            }
            .into());
        }
        Self::build(&state, document_id, conversation_id).ok_or_else(|| {
            DocChatError::NotFound(format!(
                "conversation {}/{}",
                document_id, conversation_id
            ))
            .into()
        })
    }

    async fn create_conversation(&self, document_id: &str) -> Result<String> {
        let mut state = self.lock();
        if !state.documents.contains_key(document_id) {
            return Err(DocChatError::NotFound(format!("document {}", document_id)).into());
        }

        state.next_id += 1;
        let conversation_id = format!("conv-{}", state.next_id);
        if let Some(document) = state.documents.get_mut(document_id) {
            document.conversations.push(ConversationSummary {
                id: conversation_id.clone(),
                created: None,
            });
        }
        state.transcripts.insert(
            (document_id.to_string(), conversation_id.clone()),
            Vec::new(),
        );
        state.events.push(FakeEvent::Create {
            document_id: document_id.to_string(),
            conversation_id: conversation_id.clone(),
        });
        Ok(conversation_id)
    }

    async fn submit_prompt(&self, request: &PromptRequest) -> Result<String> {
        let delay = {
            let mut state = self.lock();
            state.prompts.push(request.clone());
            state.events.push(FakeEvent::PromptStarted {
                prompt: request.prompt.clone(),
            });
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.delays.get(&request.prompt).copied()
        };

        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = gate.wait_for(|open| *open).await;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.in_flight -= 1;

        let fail = match state.failures.get_mut(&request.prompt) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        };
        state.events.push(FakeEvent::PromptFinished {
            prompt: request.prompt.clone(),
            ok: !fail,
        });
        if fail {
            return Err(DocChatError::Backend {
                status: 500,
                message: format!("failed to answer: {}", request.prompt),
            }
            .into());
        }

        let answer = format!("answer to: {}", request.prompt);
        let key = (
            request.document_id.clone(),
            request.conversation_id.clone(),
        );
        if let Some(messages) = state.transcripts.get_mut(&key) {
            messages.push(Self::persisted("human", request.prompt.clone()));
            messages.push(Self::persisted("ai", answer.clone()));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(conversation_id: &str, prompt: &str) -> PromptRequest {
        PromptRequest {
            document_id: "doc1".to_string(),
            conversation_id: conversation_id.to_string(),
            filename: "file.pdf".to_string(),
            prompt: prompt.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_lists_conversation_on_document() {
        let backend = FakeBackend::new();
        backend.add_document(Document::new("doc1", "file.pdf"));

        let id = backend.create_conversation("doc1").await.unwrap();
        let conversation = backend.get_conversation("doc1", &id).await.unwrap();

        assert!(conversation.messages.is_empty());
        assert_eq!(conversation.document.conversations.len(), 1);
        assert_eq!(conversation.document.conversations[0].id, id);
    }

    #[tokio::test]
    async fn test_create_for_unknown_document_fails() {
        let backend = FakeBackend::new();
        assert!(backend.create_conversation("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_prompt_persists_question_and_answer() {
        let backend = FakeBackend::new();
        backend.add_document(Document::new("doc1", "file.pdf"));
        let id = backend.create_conversation("doc1").await.unwrap();

        let answer = backend.submit_prompt(&request(&id, "q1")).await.unwrap();

        assert_eq!(answer, "answer to: q1");
        let messages = backend.conversation("doc1", &id).unwrap().messages;
        assert_eq!(messages[0].kind, "human");
        assert_eq!(messages[0].content(), "q1");
        assert_eq!(messages[1].kind, "ai");
    }

    #[tokio::test]
    async fn test_fail_prompt_counts_down() {
        let backend = FakeBackend::new();
        backend.fail_prompt("q1", 1);

        assert!(backend.submit_prompt(&request("c1", "q1")).await.is_err());
        assert!(backend.submit_prompt(&request("c1", "q1")).await.is_ok());
        assert_eq!(backend.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_gate_holds_prompts() {
        let backend = std::sync::Arc::new(FakeBackend::new());
        backend.hold_prompts();

        let task = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.submit_prompt(&request("c1", "q1")).await })
        };

        backend
            .wait_for_prompts(1, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!task.is_finished());

        backend.release();
        assert!(task.await.unwrap().is_ok());
        assert_eq!(backend.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_failing_gets() {
        let backend = FakeBackend::new();
        backend.add_document(Document::new("doc1", "file.pdf"));
        let id = backend.create_conversation("doc1").await.unwrap();
        backend.fail_gets(true);

        assert!(backend.get_conversation("doc1", &id).await.is_err());
        assert_eq!(backend.get_calls(), 1);
    }
}
