//! Conversation loader
//!
//! Fetches a conversation from the backend and replaces the store's
//! contents wholesale. The load flag is held for the duration of the fetch
//! and released on every exit path.

use crate::backend::Backend;
use crate::error::Result;
use crate::session::status::StatusFlag;
use crate::session::store::ConversationStore;
use crate::session::types::{validate_identifier, Conversation};
use std::sync::Arc;

/// Loads conversations into a [`ConversationStore`]
#[derive(Clone)]
pub struct ConversationLoader {
    backend: Arc<dyn Backend>,
    store: ConversationStore,
    status: StatusFlag,
}

impl ConversationLoader {
    /// Creates a loader writing into `store` and reporting on `status`
    pub fn new(backend: Arc<dyn Backend>, store: ConversationStore, status: StatusFlag) -> Self {
        Self {
            backend,
            store,
            status,
        }
    }

    /// Fetches a conversation and makes it the stored value
    ///
    /// # Errors
    ///
    /// Returns `DocChatError::InvalidIdentifier` for empty identifiers
    /// (no request is made), or the backend error. The store is left
    /// untouched on failure.
    pub async fn load(&self, document_id: &str, conversation_id: &str) -> Result<Conversation> {
        self.load_if(document_id, conversation_id, |_| true)
            .await
            .map(|(conversation, _)| conversation)
    }

    /// Fetches a conversation and stores it only if `still_active` agrees
    ///
    /// `still_active` sees the store's conversation id at the moment the
    /// response arrives (`None` when empty). Returns the fetched value and
    /// whether it was stored.
    pub async fn load_if<F>(
        &self,
        document_id: &str,
        conversation_id: &str,
        still_active: F,
    ) -> Result<(Conversation, bool)>
    where
        F: FnOnce(Option<&str>) -> bool,
    {
        validate_identifier("document", document_id)?;
        validate_identifier("conversation", conversation_id)?;

        let mut guard = self.status.begin();
        tracing::debug!(
            load.document = document_id,
            load.conversation = conversation_id,
            "Loading conversation"
        );

        let conversation = guard.track(
            self.backend
                .get_conversation(document_id, conversation_id)
                .await,
        )?;

        let current_id = self.store.conversation_id();
        let stored = still_active(current_id.as_deref());
        if stored {
            self.store.replace(conversation.clone());
        } else {
            tracing::info!(
                load.conversation = conversation_id,
                load.active = ?current_id,
                "Discarding stale conversation load"
            );
        }

        tracing::info!(
            load.conversation = %conversation.id,
            load.messages = conversation.messages.len(),
            "Conversation loaded"
        );

        Ok((conversation, stored))
    }
}
