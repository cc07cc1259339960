//! Conversation creator
//!
//! Starts a new conversation thread under a document: create it on the
//! backend, load it into the store, then point navigation at it. The load
//! completes before navigation is requested, so the new location never
//! refers to a conversation that is not yet in the store.

use crate::backend::Backend;
use crate::error::Result;
use crate::navigation::Navigator;
use crate::session::loader::ConversationLoader;
use crate::session::status::StatusFlag;
use crate::session::types::{validate_identifier, Conversation};
use std::sync::Arc;

/// Creates conversations and makes them active
#[derive(Clone)]
pub struct ConversationCreator {
    backend: Arc<dyn Backend>,
    loader: ConversationLoader,
    navigator: Arc<dyn Navigator>,
    status: StatusFlag,
}

impl ConversationCreator {
    /// Creates a creator that loads through `loader` and reports on `status`
    pub fn new(
        backend: Arc<dyn Backend>,
        loader: ConversationLoader,
        navigator: Arc<dyn Navigator>,
        status: StatusFlag,
    ) -> Self {
        Self {
            backend,
            loader,
            navigator,
            status,
        }
    }

    /// Creates a conversation under `document_id`, loads it, and navigates to it
    ///
    /// The list-mutation flag is `loading` for the whole sequence.
    ///
    /// # Returns
    ///
    /// The newly loaded conversation
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. If creation succeeded but the
    /// load failed, navigation is not attempted.
    pub async fn create(&self, document_id: &str) -> Result<Conversation> {
        validate_identifier("document", document_id)?;

        let mut guard = self.status.begin();
        tracing::info!(create.document = document_id, "Creating conversation");

        let conversation_id = guard.track(self.backend.create_conversation(document_id).await)?;
        let conversation = guard.track(self.loader.load(document_id, &conversation_id).await)?;
        guard.track(self.navigator.go_to(document_id, &conversation_id))?;

        tracing::info!(
            create.document = document_id,
            create.conversation = %conversation_id,
            "Conversation created"
        );
        Ok(conversation)
    }
}
