//! Session controller
//!
//! The explicit session object a presentation layer drives. It owns the
//! active route, the conversation store, the status flags and the prompt
//! input, and routes user events to the loader, creator and dispatcher.

use crate::backend::Backend;
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::navigation::{Navigator, Route};
use crate::session::creator::ConversationCreator;
use crate::session::dispatcher::{DispatchReport, DispatchTarget, MessageDispatcher};
use crate::session::loader::ConversationLoader;
use crate::session::status::StatusTracker;
use crate::session::store::{ConversationStore, PromptInput};
use crate::session::types::{Conversation, ConversationSummary, Document};

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Keyboard input relevant to the prompt box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Submits the prompt
    Enter,
    /// A printable character
    Char(char),
    /// Anything else
    Other,
}

/// Conversation session bound to one route at a time
pub struct SessionController {
    backend: Arc<dyn Backend>,
    navigator: Arc<dyn Navigator>,
    route: Route,
    document: Option<Document>,
    store: ConversationStore,
    statuses: StatusTracker,
    prompt: PromptInput,
    loader: ConversationLoader,
    creator: ConversationCreator,
    dispatcher: MessageDispatcher,
}

impl SessionController {
    /// Creates a controller positioned at `route` with nothing loaded
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::backend::fake::FakeBackend;
    /// use docchat::config::DispatchConfig;
    /// use docchat::navigation::{Route, RouteNavigator};
    /// use docchat::session::SessionController;
    /// use std::sync::Arc;
    ///
    /// let route = Route::new("doc1", "c1").unwrap();
    /// let controller = SessionController::new(
    ///     Arc::new(FakeBackend::new()),
    ///     Arc::new(RouteNavigator::starting_at(route.clone())),
    ///     route,
    ///     DispatchConfig::default(),
    /// );
    /// assert!(controller.conversation().is_none());
    /// assert!(!controller.statuses().any_loading());
    /// ```
    pub fn new(
        backend: Arc<dyn Backend>,
        navigator: Arc<dyn Navigator>,
        route: Route,
        dispatch: DispatchConfig,
    ) -> Self {
        let store = ConversationStore::new();
        let statuses = StatusTracker::new();
        let loader = ConversationLoader::new(
            Arc::clone(&backend),
            store.clone(),
            statuses.load.clone(),
        );
        let creator = ConversationCreator::new(
            Arc::clone(&backend),
            loader.clone(),
            Arc::clone(&navigator),
            statuses.list.clone(),
        );
        let dispatcher = MessageDispatcher::new(Arc::clone(&backend), dispatch);

        Self {
            backend,
            navigator,
            route,
            document: None,
            store,
            statuses,
            prompt: PromptInput::new(),
            loader,
            creator,
            dispatcher,
        }
    }

    /// Supplies document metadata known before the first load
    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    /// Loads the conversation named by the current route
    ///
    /// # Errors
    ///
    /// Returns the backend error; the store keeps its previous value
    pub async fn load(&mut self) -> Result<Conversation> {
        let conversation = self
            .loader
            .load(&self.route.document_id, &self.route.conversation_id)
            .await?;
        self.document = Some(conversation.document.clone());
        Ok(conversation)
    }

    /// Points the route at `conversation_id` and loads it
    ///
    /// Does not request navigation; use [`switch_to`](Self::switch_to) when
    /// the location should change as well. The route only moves once the
    /// load succeeds.
    pub async fn load_conversation(&mut self, conversation_id: &str) -> Result<Conversation> {
        let route = self.route.with_conversation(conversation_id)?;
        let conversation = self
            .loader
            .load(&route.document_id, &route.conversation_id)
            .await?;
        self.route = route;
        self.document = Some(conversation.document.clone());
        Ok(conversation)
    }

    /// Creates a conversation under the current document and makes it active
    ///
    /// # Returns
    ///
    /// The new conversation identifier
    pub async fn create(&mut self) -> Result<String> {
        let conversation = self.creator.create(&self.route.document_id).await?;
        self.route = self.route.with_conversation(conversation.id.clone())?;
        self.document = Some(conversation.document);
        Ok(conversation.id)
    }

    /// Navigates to another conversation of the current document and reloads
    ///
    /// The previous conversation is dropped from the store before the fetch.
    pub async fn switch_to(&mut self, conversation_id: &str) -> Result<Conversation> {
        let route = self.route.with_conversation(conversation_id)?;
        self.navigator
            .go_to(&route.document_id, &route.conversation_id)?;
        info!(
            session.from = %self.route,
            session.to = %route,
            "Switching conversation"
        );

        self.route = route;
        self.store.clear();
        self.load().await
    }

    /// Submits the current prompt text
    ///
    /// # Errors
    ///
    /// See [`MessageDispatcher::submit`]
    pub async fn submit(&mut self) -> Result<DispatchReport> {
        let target = DispatchTarget::resolve(&self.store, &self.route, self.document.as_ref());
        let report = self
            .dispatcher
            .submit(
                &self.prompt,
                target,
                &self.store,
                &self.loader,
                &self.statuses.submission,
            )
            .await;

        if let Some(conversation) = self.store.current() {
            self.document = Some(conversation.document);
        }
        report
    }

    /// Sets the prompt text and submits it
    pub async fn submit_prompt(&mut self, text: impl Into<String>) -> Result<DispatchReport> {
        self.prompt.set(text);
        self.submit().await
    }

    /// Records the latest prompt input value
    pub fn handle_input_change(&mut self, text: impl Into<String>) {
        self.prompt.set(text);
    }

    /// Handles a key press in the prompt box
    ///
    /// Enter submits and returns the round's report; other keys do nothing.
    pub async fn handle_key(&mut self, key: Key) -> Result<Option<DispatchReport>> {
        match key {
            Key::Enter => self.submit().await.map(Some),
            other => {
                debug!(session.key = ?other, "Ignoring key");
                Ok(None)
            }
        }
    }

    /// The loaded conversation
    pub fn conversation(&self) -> Option<Conversation> {
        self.store.current()
    }

    /// Conversations listed on the known document
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.document
            .as_ref()
            .map(|d| d.conversations.clone())
            .unwrap_or_default()
    }

    /// Status flags
    pub fn statuses(&self) -> &StatusTracker {
        &self.statuses
    }

    /// Current prompt text
    pub fn prompt(&self) -> String {
        self.prompt.get()
    }

    /// Shared handle to the prompt input
    pub fn prompt_input(&self) -> PromptInput {
        self.prompt.clone()
    }

    /// Active route
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Document metadata, once known
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Conversation store
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Dispatch settings in effect
    pub fn dispatch_config(&self) -> &DispatchConfig {
        self.dispatcher.config()
    }

    /// Backend handle
    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Subscribes to conversation changes
    pub fn subscribe(&self) -> watch::Receiver<Option<Conversation>> {
        self.store.subscribe()
    }
}
