//! Metrics for message dispatch rounds
//!
//! Every call to submit runs one dispatch round: a fan-out of sub-questions
//! followed by a reconciling reload. This module records round-level and
//! question-level telemetry through the `metrics` facade. Nothing is
//! exported unless the embedding application installs a recorder.
//!
//! # Metrics
//!
//! - `dispatch_rounds_total`: Counter of started rounds
//! - `dispatch_active_rounds`: Gauge of rounds in flight
//! - `dispatch_questions_total`: Counter of questions by outcome
//! - `dispatch_question_failures_total`: Counter of questions that failed after retries
//! - `dispatch_question_attempts`: Histogram of attempts per question
//! - `dispatch_duration_seconds`: Histogram of round duration by status
//! - `dispatch_completions_total`: Counter of finished rounds by status
//!
//! # Examples
//!
//! ```
//! use docchat::session::metrics::DispatchMetrics;
//!
//! let metrics = DispatchMetrics::new("battery");
//! metrics.record_question(true, 1);
//! metrics.record_completion(1, 0);
//! ```

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Metrics collection for a single dispatch round
///
/// Uses an atomic flag so the round is recorded at most once, and the
/// active gauge is still decremented if the round is dropped early.
#[derive(Debug)]
pub struct DispatchMetrics {
    strategy: String,
    start: Instant,
    recorded: AtomicBool,
}

impl DispatchMetrics {
    /// Starts tracking a round
    ///
    /// # Arguments
    ///
    /// * `strategy` - Question strategy label (`battery`, `prompt`, `both`)
    pub fn new(strategy: impl Into<String>) -> Self {
        let strategy = strategy.into();
        increment_counter!("dispatch_rounds_total", "strategy" => strategy.clone());
        increment_gauge!("dispatch_active_rounds", 1.0);

        Self {
            strategy,
            start: Instant::now(),
            recorded: AtomicBool::new(false),
        }
    }

    /// Records the outcome of one question
    pub fn record_question(&self, success: bool, attempts: u32) {
        let outcome = if success { "success" } else { "failure" };
        increment_counter!(
            "dispatch_questions_total",
            "strategy" => self.strategy.clone(),
            "outcome" => outcome
        );
        if !success {
            increment_counter!(
                "dispatch_question_failures_total",
                "strategy" => self.strategy.clone()
            );
        }
        histogram!("dispatch_question_attempts", f64::from(attempts));
    }

    /// Records the end of the round
    ///
    /// The status label is `complete`, `partial`, or `failed` depending on
    /// the counts. Later calls are ignored.
    pub fn record_completion(&self, successful: usize, failed: usize) {
        if self.recorded.swap(true, Ordering::SeqCst) {
            return;
        }

        let status = round_status(successful, failed);
        histogram!(
            "dispatch_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "strategy" => self.strategy.clone(),
            "status" => status
        );
        increment_counter!(
            "dispatch_completions_total",
            "strategy" => self.strategy.clone(),
            "status" => status
        );
        decrement_gauge!("dispatch_active_rounds", 1.0);
    }

    /// Strategy label
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Time since the round started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    fn is_recorded(&self) -> bool {
        self.recorded.load(Ordering::SeqCst)
    }
}

impl Drop for DispatchMetrics {
    fn drop(&mut self) {
        if !self.is_recorded() {
            decrement_gauge!("dispatch_active_rounds", 1.0);
        }
    }
}

/// Classifies a finished round
pub fn round_status(successful: usize, failed: usize) -> &'static str {
    if failed == 0 {
        "complete"
    } else if successful > 0 {
        "partial"
    } else {
        "failed"
    }
}
