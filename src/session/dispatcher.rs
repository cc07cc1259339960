//! Message dispatcher
//!
//! Runs one submission round:
//!
//! 1. claim the submission flag (a second submit while one is in flight is rejected)
//! 2. optimistically append the typed prompt to the stored transcript
//! 3. build the question batch from the configured strategy
//! 4. send every question concurrently
//! 5. wait for all of them to settle (retrying failures within their own task)
//! 6. clear the prompt input
//! 7. reload the conversation so the backend's transcript replaces the optimistic one
//! 8. release the submission flag
//!
//! The batch is never cut short: every question runs to completion even
//! when others fail, and the reload happens regardless. A round with any
//! failed question returns `DocChatError::DispatchFailed` after the reload.

use crate::backend::{Backend, PromptRequest};
use crate::config::{DispatchConfig, QuestionStrategy};
use crate::error::{DocChatError, Result};
use crate::navigation::Route;
use crate::session::loader::ConversationLoader;
use crate::session::metrics::{round_status, DispatchMetrics};
use crate::session::status::StatusFlag;
use crate::session::store::{ConversationStore, PromptInput};
use crate::session::types::{Document, Message};

use futures::future::join_all;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Result of one question in a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionOutcome {
    /// Position of the question in the batch
    pub index: usize,

    /// Question text
    pub question: String,

    /// True if the backend answered
    pub success: bool,

    /// Answer text (empty if failed)
    pub answer: String,

    /// Error from the last attempt (None if successful)
    pub error: Option<String>,

    /// Attempts made, including the first
    pub attempts: u32,

    /// Time from first attempt to settlement (milliseconds)
    pub duration_ms: u64,
}

/// Summary of a completed round
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Conversation the questions were sent to
    pub conversation_id: String,

    /// Per-question results, in batch order
    pub outcomes: Vec<QuestionOutcome>,

    /// Number of answered questions
    pub successful: usize,

    /// Number of failed questions
    pub failed: usize,

    /// Wall-clock time of the fan-out (milliseconds)
    pub total_duration_ms: u64,

    /// True if the reload replaced the stored conversation
    pub reconciled: bool,
}

/// Where a round's questions go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    /// Document identifier
    pub document_id: String,
    /// Conversation identifier
    pub conversation_id: String,
    /// Filename sent with each question
    pub filename: String,
}

impl DispatchTarget {
    /// Resolve the target from the stored conversation, falling back to the route
    ///
    /// When nothing is loaded the identifiers come from `route` and the
    /// filename from `document`, if known.
    pub fn resolve(store: &ConversationStore, route: &Route, document: Option<&Document>) -> Self {
        if let Some(conversation) = store.current() {
            return Self {
                document_id: conversation.document.id,
                conversation_id: conversation.id,
                filename: conversation.document.filename,
            };
        }

        let filename = document
            .filter(|d| d.id == route.document_id)
            .map(|d| d.filename.clone())
            .unwrap_or_default();
        if filename.is_empty() {
            warn!(
                dispatch.document = %route.document_id,
                "No conversation loaded and no filename known; sending an empty filename"
            );
        }
        Self {
            document_id: route.document_id.clone(),
            conversation_id: route.conversation_id.clone(),
            filename,
        }
    }
}

/// Bounded retry policy for a single question
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff_ms: u64,
}

impl RetryPolicy {
    /// Linear backoff with up to 25% jitter
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff_ms.saturating_mul(u64::from(attempt));
        let jitter = if base >= 4 {
            rand::rng().random_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter))
    }
}

/// Fans questions out to the backend and reconciles the transcript
#[derive(Clone)]
pub struct MessageDispatcher {
    backend: Arc<dyn Backend>,
    config: DispatchConfig,
}

impl MessageDispatcher {
    /// Creates a dispatcher
    pub fn new(backend: Arc<dyn Backend>, config: DispatchConfig) -> Self {
        Self { backend, config }
    }

    /// Active dispatch settings
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Questions a submission of `prompt` sends, in order
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::backend::fake::FakeBackend;
    /// use docchat::config::{DispatchConfig, QuestionStrategy};
    /// use docchat::session::MessageDispatcher;
    /// use std::sync::Arc;
    ///
    /// let config = DispatchConfig {
    ///     strategy: QuestionStrategy::Both,
    ///     questions: vec!["q1".to_string()],
    ///     ..Default::default()
    /// };
    /// let dispatcher = MessageDispatcher::new(Arc::new(FakeBackend::new()), config);
    /// assert_eq!(dispatcher.questions_for("hello"), vec!["q1", "hello"]);
    /// ```
    pub fn questions_for(&self, prompt: &str) -> Vec<String> {
        let battery = || self.config.questions.iter().cloned();
        let typed = || std::iter::once(prompt.to_string()).filter(|p| !p.trim().is_empty());
        match self.config.strategy {
            QuestionStrategy::Battery => battery().collect(),
            QuestionStrategy::Prompt => typed().collect(),
            QuestionStrategy::Both => battery().chain(typed()).collect(),
        }
    }

    /// Runs one submission round
    ///
    /// `prompt` is the presentation's input; it is read when the round starts
    /// and cleared once every question has settled.
    ///
    /// # Errors
    ///
    /// - `DocChatError::SubmissionInProgress` if `submission` is already held
    ///   (nothing else happens)
    /// - `DocChatError::DispatchFailed` if any question failed after retries
    ///   (the reload still ran; the error carries the full report)
    /// - the reload's error if the reconciling fetch failed
    pub async fn submit(
        &self,
        prompt: &PromptInput,
        target: DispatchTarget,
        store: &ConversationStore,
        loader: &ConversationLoader,
        submission: &StatusFlag,
    ) -> Result<DispatchReport> {
        let mut guard = submission
            .try_begin()
            .ok_or(DocChatError::SubmissionInProgress)?;

        let typed = prompt.get();
        if store.append(Message::text(typed.clone())) {
            tracing::debug!(
                dispatch.conversation = %target.conversation_id,
                "Optimistic message appended"
            );
        }

        let questions = self.questions_for(&typed);
        let metrics = DispatchMetrics::new(self.config.strategy.as_str());
        let start = Instant::now();

        info!(
            dispatch.event = "start",
            dispatch.conversation = %target.conversation_id,
            dispatch.question_count = questions.len(),
            dispatch.max_concurrent = self.config.max_concurrent,
            dispatch.strategy = %self.config.strategy,
            "Dispatching questions"
        );

        let outcomes = self.fan_out(&target, questions).await;
        let total_duration_ms = start.elapsed().as_millis() as u64;

        for outcome in &outcomes {
            metrics.record_question(outcome.success, outcome.attempts);
        }
        let successful = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - successful;
        metrics.record_completion(successful, failed);

        info!(
            dispatch.event = "settled",
            dispatch.successful = successful,
            dispatch.failed = failed,
            dispatch.status = round_status(successful, failed),
            dispatch.duration_ms = total_duration_ms,
            "All questions settled"
        );

        prompt.clear();

        let expected = target.conversation_id.clone();
        let reload = loader
            .load_if(&target.document_id, &target.conversation_id, |active| {
                active.map_or(true, |id| id == expected)
            })
            .await;
        let (_, reconciled) = guard.track(reload)?;

        let report = DispatchReport {
            conversation_id: target.conversation_id,
            outcomes,
            successful,
            failed,
            total_duration_ms,
            reconciled,
        };

        if failed > 0 {
            let err = DocChatError::DispatchFailed {
                failed,
                total: report.outcomes.len(),
                report: Box::new(report),
            };
            guard.fail(&err);
            return Err(err.into());
        }

        Ok(report)
    }

    /// Sends every question concurrently and waits for all of them
    ///
    /// Each question runs in its own task, so a slow or failing question
    /// never delays the others beyond the concurrency limit.
    async fn fan_out(
        &self,
        target: &DispatchTarget,
        questions: Vec<String>,
    ) -> Vec<QuestionOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let retry = RetryPolicy {
            max_retries: self.config.max_retries,
            backoff_ms: self.config.retry_backoff_ms,
        };

        let handles: Vec<_> = questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let backend = Arc::clone(&self.backend);
                let sem = Arc::clone(&semaphore);
                let request = PromptRequest {
                    document_id: target.document_id.clone(),
                    conversation_id: target.conversation_id.clone(),
                    filename: target.filename.clone(),
                    prompt: question.clone(),
                };

                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.ok();
                    ask(backend, index, request, retry).await
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(questions)
            .enumerate()
            .map(|(index, (joined, question))| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        dispatch.event = "task_panic",
                        dispatch.question_index = index,
                        dispatch.error = %e,
                        "Question task panicked"
                    );
                    QuestionOutcome {
                        index,
                        question,
                        success: false,
                        answer: String::new(),
                        error: Some(format!("task failed: {}", e)),
                        attempts: 0,
                        duration_ms: 0,
                    }
                }
            })
            .collect()
    }
}

/// Sends one question, retrying per `retry`
async fn ask(
    backend: Arc<dyn Backend>,
    index: usize,
    request: PromptRequest,
    retry: RetryPolicy,
) -> QuestionOutcome {
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match backend.submit_prompt(&request).await {
            Ok(answer) => {
                return QuestionOutcome {
                    index,
                    question: request.prompt,
                    success: true,
                    answer,
                    error: None,
                    attempts,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
            Err(e) if attempts <= retry.max_retries => {
                let delay = retry.delay(attempts);
                warn!(
                    dispatch.question_index = index,
                    dispatch.attempt = attempts,
                    dispatch.retry_in_ms = delay.as_millis() as u64,
                    dispatch.error = %e,
                    "Question failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(
                    dispatch.question_index = index,
                    dispatch.attempts = attempts,
                    dispatch.error = %e,
                    "Question failed"
                );
                return QuestionOutcome {
                    index,
                    question: request.prompt,
                    success: false,
                    answer: String::new(),
                    error: Some(e.to_string()),
                    attempts,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{FakeBackend, FakeEvent};
    use crate::session::status::Status;
    use crate::test_utils::{conversation, dispatch_config, seeded_backend};

    struct Fixture {
        dispatcher: MessageDispatcher,
        store: ConversationStore,
        loader: ConversationLoader,
        submission: StatusFlag,
        route: Route,
    }

    fn fixture(backend: Arc<FakeBackend>, config: DispatchConfig) -> Fixture {
        let store = ConversationStore::new();
        let loader =
            ConversationLoader::new(backend.clone(), store.clone(), StatusFlag::new("load"));
        Fixture {
            dispatcher: MessageDispatcher::new(backend, config),
            store,
            loader,
            submission: StatusFlag::new("submission"),
            route: Route::new("doc1", "c1").unwrap(),
        }
    }

    impl Fixture {
        async fn submit(&self, prompt: &PromptInput) -> Result<DispatchReport> {
            let target = DispatchTarget::resolve(&self.store, &self.route, None);
            self.dispatcher
                .submit(prompt, target, &self.store, &self.loader, &self.submission)
                .await
        }
    }

    #[test]
    fn test_questions_for_battery_ignores_prompt() {
        let backend = Arc::new(FakeBackend::new());
        let dispatcher = MessageDispatcher::new(backend, DispatchConfig::default());
        let questions = dispatcher.questions_for("hello");
        assert_eq!(questions.len(), 9);
        assert!(!questions.contains(&"hello".to_string()));
    }

    #[test]
    fn test_questions_for_prompt_strategy() {
        let backend = Arc::new(FakeBackend::new());
        let config = DispatchConfig {
            strategy: QuestionStrategy::Prompt,
            ..dispatch_config(&["q1", "q2"])
        };
        let dispatcher = MessageDispatcher::new(backend, config);
        assert_eq!(dispatcher.questions_for("hello"), vec!["hello"]);
        assert!(dispatcher.questions_for("  ").is_empty());
    }

    #[test]
    fn test_retry_delay_grows_linearly() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_ms: 100,
        };
        let first = policy.delay(1).as_millis();
        let second = policy.delay(2).as_millis();
        assert!((100..=125).contains(&first));
        assert!((200..=250).contains(&second));
        let none = RetryPolicy {
            max_retries: 3,
            backoff_ms: 0,
        };
        assert_eq!(none.delay(5), Duration::ZERO);
    }

    #[test]
    fn test_retry_delay_saturates_on_huge_backoff() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff_ms: u64::MAX,
        };
        assert_eq!(policy.delay(2), Duration::from_millis(u64::MAX));
        let near = RetryPolicy {
            max_retries: 3,
            backoff_ms: u64::MAX - 1,
        };
        assert!(near.delay(1) >= Duration::from_millis(u64::MAX - 1));
    }

    #[test]
    fn test_resolve_target_prefers_loaded_conversation() {
        let store = ConversationStore::new();
        store.replace(conversation("doc9", "c9", &[]));
        let route = Route::new("doc1", "c1").unwrap();

        let target = DispatchTarget::resolve(&store, &route, None);
        assert_eq!(target.conversation_id, "c9");
        assert_eq!(target.filename, "doc9.pdf");

        store.clear();
        let document = Document::new("doc1", "known.pdf");
        let target = DispatchTarget::resolve(&store, &route, Some(&document));
        assert_eq!(target.conversation_id, "c1");
        assert_eq!(target.filename, "known.pdf");
    }

    #[tokio::test]
    async fn test_submit_sends_every_question_and_reconciles() {
        let backend = seeded_backend();
        let f = fixture(backend.clone(), dispatch_config(&["q1", "q2", "q3"]));
        f.loader.load("doc1", "c1").await.unwrap();

        let prompt = PromptInput::new();
        prompt.set("hello");
        let report = f.submit(&prompt).await.unwrap();

        assert_eq!(report.successful, 3);
        assert_eq!(report.failed, 0);
        assert!(report.reconciled);
        assert!(prompt.get().is_empty());
        assert_eq!(backend.prompt_count(), 3);
        for request in backend.prompts() {
            assert_eq!(request.document_id, "doc1");
            assert_eq!(request.conversation_id, "c1");
            assert_eq!(request.filename, "doc1.pdf");
        }

        let stored = f.store.current().unwrap();
        assert_eq!(stored, backend.conversation("doc1", "c1").unwrap());
        assert_eq!(stored.messages.len(), 6);
        assert_eq!(f.submission.status(), Status::Idle);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_still_appended_optimistically() {
        let backend = seeded_backend();
        let f = fixture(backend.clone(), dispatch_config(&["q1"]));
        f.loader.load("doc1", "c1").await.unwrap();
        backend.fail_gets(true);

        let prompt = PromptInput::new();
        assert!(f.submit(&prompt).await.is_err());

        let stored = f.store.current().unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.messages[0].content(), "");
        // battery questions are sent even for an empty prompt
        assert_eq!(backend.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_whitespace_prompt_is_appended_but_not_sent() {
        let backend = seeded_backend();
        let config = DispatchConfig {
            strategy: QuestionStrategy::Prompt,
            ..dispatch_config(&["q1"])
        };
        let f = fixture(backend.clone(), config);
        f.loader.load("doc1", "c1").await.unwrap();
        backend.fail_gets(true);

        let prompt = PromptInput::new();
        prompt.set("   ");
        assert!(f.submit(&prompt).await.is_err());

        assert_eq!(f.store.current().unwrap().messages.len(), 1);
        assert_eq!(backend.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_waits_for_slowest_question() {
        let backend = seeded_backend();
        backend.delay_prompt("fast", Duration::from_millis(5));
        backend.delay_prompt("medium", Duration::from_millis(30));
        backend.delay_prompt("slow", Duration::from_millis(80));
        let f = fixture(backend.clone(), dispatch_config(&["slow", "fast", "medium"]));
        f.loader.load("doc1", "c1").await.unwrap();

        let prompt = PromptInput::new();
        prompt.set("hi");
        f.submit(&prompt).await.unwrap();

        let events = backend.events();
        let reload = events
            .iter()
            .rposition(|e| matches!(e, FakeEvent::Get { .. }))
            .unwrap();
        let slowest = events
            .iter()
            .position(|e| matches!(e, FakeEvent::PromptFinished { prompt, .. } if prompt == "slow"))
            .unwrap();
        assert!(slowest < reload);
        assert_eq!(backend.max_in_flight(), 3);
    }

    #[tokio::test]
    async fn test_partial_failure_still_reloads_and_surfaces_error() {
        let backend = seeded_backend();
        backend.fail_prompt_always("q2");
        let f = fixture(backend.clone(), dispatch_config(&["q1", "q2", "q3"]));
        f.loader.load("doc1", "c1").await.unwrap();

        let prompt = PromptInput::new();
        prompt.set("hello");
        let err = f.submit(&prompt).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DocChatError>(),
            Some(DocChatError::DispatchFailed { failed: 1, total: 3, .. })
        ));
        assert_eq!(backend.prompt_count(), 3);
        assert!(prompt.get().is_empty());
        // answers that were persisted are merged by the reload
        assert_eq!(f.store.current().unwrap().messages.len(), 4);
        assert_eq!(f.submission.status(), Status::Idle);
        assert!(f.submission.last_error().unwrap().contains("1 of 3"));
    }

    #[tokio::test]
    async fn test_partial_failure_carries_the_report() {
        let backend = seeded_backend();
        backend.fail_prompt_always("q2");
        let config = DispatchConfig {
            max_retries: 1,
            ..dispatch_config(&["q1", "q2", "q3"])
        };
        let f = fixture(backend.clone(), config);
        f.loader.load("doc1", "c1").await.unwrap();

        let err = f.submit(&PromptInput::new()).await.unwrap_err();

        let Some(DocChatError::DispatchFailed { report, .. }) = err.downcast_ref::<DocChatError>()
        else {
            panic!("expected DispatchFailed, got {err}");
        };
        assert_eq!(report.conversation_id, "c1");
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 1);
        assert!(report.reconciled);
        let failed = &report.outcomes[1];
        assert_eq!(failed.question, "q2");
        assert!(!failed.success);
        assert_eq!(failed.attempts, 2);
        assert!(failed.error.is_some());
        assert!(report.outcomes[0].success && report.outcomes[2].success);
    }

    #[tokio::test]
    async fn test_retries_recover_transient_failures() {
        let backend = seeded_backend();
        backend.fail_prompt("q1", 2);
        let config = DispatchConfig {
            max_retries: 2,
            ..dispatch_config(&["q1"])
        };
        let f = fixture(backend.clone(), config);

        let prompt = PromptInput::new();
        let report = f.submit(&prompt).await.unwrap();

        assert_eq!(report.outcomes[0].attempts, 3);
        assert!(report.outcomes[0].success);
        assert_eq!(backend.prompt_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let backend = seeded_backend();
        backend.fail_prompt_always("q1");
        let config = DispatchConfig {
            max_retries: 1,
            ..dispatch_config(&["q1"])
        };
        let f = fixture(backend.clone(), config);

        let prompt = PromptInput::new();
        assert!(f.submit(&prompt).await.is_err());
        assert_eq!(backend.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let backend = seeded_backend();
        for q in ["a", "b", "c", "d"] {
            backend.delay_prompt(q, Duration::from_millis(20));
        }
        let config = DispatchConfig {
            max_concurrent: 2,
            ..dispatch_config(&["a", "b", "c", "d"])
        };
        let f = fixture(backend.clone(), config);

        let prompt = PromptInput::new();
        f.submit(&prompt).await.unwrap();
        assert_eq!(backend.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_submit_rejected_while_in_flight() {
        let backend = seeded_backend();
        let f = fixture(backend.clone(), dispatch_config(&["q1"]));
        let _held = f.submission.begin();

        let prompt = PromptInput::new();
        prompt.set("hello");
        let err = f.submit(&prompt).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DocChatError>(),
            Some(DocChatError::SubmissionInProgress)
        ));
        assert_eq!(prompt.get(), "hello");
        assert_eq!(backend.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_failure_is_surfaced() {
        let backend = seeded_backend();
        let f = fixture(backend.clone(), dispatch_config(&["q1"]));
        f.loader.load("doc1", "c1").await.unwrap();
        backend.fail_gets(true);

        let prompt = PromptInput::new();
        prompt.set("hello");
        let err = f.submit(&prompt).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DocChatError>(),
            Some(DocChatError::Backend { status: 503, .. })
        ));
        // the optimistic message stays until a reload succeeds
        let stored = f.store.current().unwrap();
        assert_eq!(stored.messages.last().unwrap().content(), "hello");
        assert_eq!(f.submission.status(), Status::Idle);
    }
}
