//! Conversation store
//!
//! Holds the single currently loaded conversation. Only the controller
//! mutates it; presentation observes changes through [`ConversationStore::subscribe`].

use crate::session::types::{Conversation, Message};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

/// Single-slot conversation store with change notification
///
/// Clones share the same slot.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    tx: Arc<watch::Sender<Option<Conversation>>>,
}

impl ConversationStore {
    /// Creates an empty store
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns a copy of the loaded conversation
    pub fn current(&self) -> Option<Conversation> {
        self.tx.borrow().clone()
    }

    /// Identifier of the loaded conversation
    pub fn conversation_id(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|c| c.id.clone())
    }

    /// Number of messages in the loaded conversation (0 when empty)
    pub fn message_count(&self) -> usize {
        self.tx.borrow().as_ref().map_or(0, |c| c.messages.len())
    }

    /// Replaces the stored value wholesale
    pub fn replace(&self, conversation: Conversation) {
        tracing::debug!(
            store.conversation = %conversation.id,
            store.messages = conversation.messages.len(),
            "Replacing stored conversation"
        );
        self.tx.send_replace(Some(conversation));
    }

    /// Empties the store
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Appends `message` to a copy of the loaded conversation and stores the copy
    ///
    /// Returns false, leaving the store untouched, when nothing is loaded.
    pub fn append(&self, message: Message) -> bool {
        let updated = match self.tx.borrow().as_ref() {
            Some(conversation) => conversation.with_message(message),
            None => return false,
        };
        self.tx.send_replace(Some(updated));
        true
    }

    /// Subscribes to store changes
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::session::{ConversationStore, Conversation, Document};
    ///
    /// let store = ConversationStore::new();
    /// let rx = store.subscribe();
    /// store.replace(Conversation {
    ///     id: "c1".to_string(),
    ///     document: Document::new("doc1", "file.pdf"),
    ///     messages: vec![],
    /// });
    /// assert_eq!(rx.borrow().as_ref().map(|c| c.id.as_str()), Some("c1"));
    /// ```
    pub fn subscribe(&self) -> watch::Receiver<Option<Conversation>> {
        self.tx.subscribe()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Current value of the prompt input, shared with presentation
#[derive(Debug, Clone, Default)]
pub struct PromptInput {
    value: Arc<RwLock<String>>,
}

impl PromptInput {
    /// Creates an empty input
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current text
    pub fn get(&self) -> String {
        self.value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replaces the text
    pub fn set(&self, text: impl Into<String>) {
        *self
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = text.into();
    }

    /// Empties the input
    pub fn clear(&self) {
        self.set(String::new());
    }
}
