//! Conversation session
//!
//! The session layer keeps one conversation in sync with the backend:
//!
//! - [`types`]: wire and domain types (documents, conversations, messages)
//! - [`store`]: single-slot conversation store and prompt input
//! - [`status`]: load, list and submission flags
//! - [`loader`]: fetch-and-replace of the stored conversation
//! - [`creator`]: create, load and navigate to a new conversation
//! - [`dispatcher`]: concurrent sub-question fan-out with a reconciling reload
//! - [`controller`]: the session object presentation code drives
//! - [`metrics`]: dispatch telemetry

pub mod controller;
pub mod creator;
pub mod dispatcher;
pub mod loader;
pub mod metrics;
pub mod status;
pub mod store;
pub mod types;

pub use controller::{Key, SessionController};
pub use creator::ConversationCreator;
pub use dispatcher::{DispatchReport, DispatchTarget, MessageDispatcher, QuestionOutcome};
pub use loader::ConversationLoader;
pub use status::{Status, StatusFlag, StatusGuard, StatusSnapshot, StatusTracker};
pub use store::{ConversationStore, PromptInput};
pub use types::{Conversation, ConversationSummary, Document, Message, MessageData};
