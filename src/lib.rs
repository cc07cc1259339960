//! DocChat - conversational client for a document question-answering service
//!
//! This library provides the conversation session controller behind the
//! `docchat` CLI: it keeps one conversation transcript in sync with the
//! backend, fans each submission out into a batch of concurrent questions,
//! and reconciles the transcript once every answer has settled.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Conversation store, status flags, loader, creator, dispatcher and controller
//! - `backend`: Backend abstraction, HTTP implementation and an in-process fake
//! - `navigation`: Routes and the navigation capability
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind the CLI subcommands
//!
//! # Example
//!
//! ```no_run
//! use docchat::backend::create_backend;
//! use docchat::navigation::{Route, RouteNavigator};
//! use docchat::{Config, SessionController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None, &Default::default())?;
//!     config.validate()?;
//!
//!     let route: Route = "/doc/doc1/c1".parse()?;
//!     let navigator = Arc::new(RouteNavigator::starting_at(route.clone()));
//!     let backend = create_backend(&config.backend)?;
//!     let mut session = SessionController::new(backend, navigator, route, config.dispatch);
//!
//!     session.load().await?;
//!     session.submit_prompt("What is this document about?").await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod navigation;
pub mod session;

// Re-export commonly used types
pub use backend::{Backend, HttpBackend, PromptRequest};
pub use config::Config;
pub use error::{DocChatError, Result};
pub use navigation::{Navigator, Route, RouteNavigator};
pub use session::{Conversation, Message, SessionController};

#[cfg(test)]
pub mod test_utils;
