//! Routes and navigation
//!
//! A [`Route`] names the active document and conversation, in the
//! `/doc/{document}/{conversation}` form used by the web client. The
//! [`Navigator`] trait is the imperative "change location" capability that
//! the controller invokes when the active conversation changes.

use crate::error::{DocChatError, Result};
use crate::session::types::validate_identifier;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Active document and conversation identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    /// Document identifier
    pub document_id: String,
    /// Conversation identifier
    pub conversation_id: String,
}

impl Route {
    /// Creates a route from two identifiers
    ///
    /// # Errors
    ///
    /// Returns `DocChatError::InvalidIdentifier` if either identifier is empty
    /// or contains a `/`
    pub fn new(document_id: impl Into<String>, conversation_id: impl Into<String>) -> Result<Self> {
        let route = Self {
            document_id: document_id.into(),
            conversation_id: conversation_id.into(),
        };
        for (kind, value) in [
            ("document", &route.document_id),
            ("conversation", &route.conversation_id),
        ] {
            validate_identifier(kind, value)?;
            if value.contains('/') {
                return Err(DocChatError::InvalidIdentifier(format!(
                    "{} id contains '/': {}",
                    kind, value
                ))
                .into());
            }
        }
        Ok(route)
    }

    /// Returns a route for another conversation of the same document
    pub fn with_conversation(&self, conversation_id: impl Into<String>) -> Result<Self> {
        Self::new(self.document_id.clone(), conversation_id)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/doc/{}/{}", self.document_id, self.conversation_id)
    }
}

impl FromStr for Route {
    type Err = anyhow::Error;

    /// Parses `/doc/{document}/{conversation}`
    ///
    /// The leading slash and a trailing slash are optional.
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::navigation::Route;
    ///
    /// let route: Route = "/doc/doc1/c1".parse().unwrap();
    /// assert_eq!(route.document_id, "doc1");
    /// assert_eq!(route.conversation_id, "c1");
    /// assert!("/docs/doc1".parse::<Route>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('/').trim_end_matches('/');
        let parts: Vec<&str> = trimmed.split('/').collect();
        match parts.as_slice() {
            ["doc", document, conversation] => Self::new(*document, *conversation)
                .map_err(|e| DocChatError::InvalidRoute(format!("{}: {}", s, e)).into()),
            _ => Err(DocChatError::InvalidRoute(format!(
                "expected /doc/<document>/<conversation>, got {}",
                s
            ))
            .into()),
        }
    }
}

/// Imperative location change requested by the controller
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Make `(document_id, conversation_id)` the current location
    ///
    /// # Errors
    ///
    /// Returns error if the presentation layer rejects the change
    fn go_to(&self, document_id: &str, conversation_id: &str) -> Result<()>;
}

/// Navigator that records the current route and the navigation history
///
/// Clones share state, so a presentation layer can keep a handle and read
/// the location the controller last requested.
#[derive(Debug, Clone, Default)]
pub struct RouteNavigator {
    history: Arc<RwLock<Vec<Route>>>,
}

impl RouteNavigator {
    /// Creates a navigator with empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a navigator positioned at `route`
    pub fn starting_at(route: Route) -> Self {
        Self {
            history: Arc::new(RwLock::new(vec![route])),
        }
    }

    /// Most recently requested route
    pub fn current(&self) -> Option<Route> {
        self.history
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    /// Every route requested so far, oldest first
    pub fn history(&self) -> Vec<Route> {
        self.history
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Navigator for RouteNavigator {
    fn go_to(&self, document_id: &str, conversation_id: &str) -> Result<()> {
        let route = Route::new(document_id, conversation_id)
            .map_err(|e| DocChatError::Navigation(e.to_string()))?;
        tracing::debug!(navigation.route = %route, "Navigating");
        self.history
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(route);
        Ok(())
    }
}
