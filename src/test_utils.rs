//! Test utilities for DocChat
//!
//! Builders for conversations and a ready-to-use session wired to the
//! in-process fake backend.

use crate::backend::fake::FakeBackend;
use crate::config::DispatchConfig;
use crate::navigation::{Route, RouteNavigator};
use crate::session::{Conversation, Document, Message, SessionController};
use std::sync::Arc;

/// Build a conversation whose messages are text messages with `contents`
pub fn conversation(document_id: &str, conversation_id: &str, contents: &[&str]) -> Conversation {
    Conversation {
        id: conversation_id.to_string(),
        document: Document::new(document_id, format!("{}.pdf", document_id)),
        messages: contents.iter().map(|c| Message::text(*c)).collect(),
    }
}

/// Dispatch settings with a short custom battery and no retry delay
pub fn dispatch_config(questions: &[&str]) -> DispatchConfig {
    DispatchConfig {
        questions: questions.iter().map(|q| q.to_string()).collect(),
        retry_backoff_ms: 0,
        ..DispatchConfig::default()
    }
}

/// Fake backend seeded with `doc1/c1` (empty transcript)
pub fn seeded_backend() -> Arc<FakeBackend> {
    let backend = Arc::new(FakeBackend::new());
    backend.insert(conversation("doc1", "c1", &[]));
    backend
}

/// Controller at `/doc/doc1/c1` over `backend`, plus its navigator
pub fn session(
    backend: Arc<FakeBackend>,
    dispatch: DispatchConfig,
) -> (SessionController, RouteNavigator) {
    let route = Route::new("doc1", "c1").expect("valid route");
    let navigator = RouteNavigator::starting_at(route.clone());
    let controller =
        SessionController::new(backend, Arc::new(navigator.clone()), route, dispatch);
    (controller, navigator)
}
