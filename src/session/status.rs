//! Status flags consumed by presentation
//!
//! The controller exposes three independent flags: conversation load,
//! conversation-list mutation, and message submission. Each cycles between
//! [`Status::Idle`] and [`Status::Loading`] for the life of the session.
//!
//! Transitions happen through [`StatusGuard`]: acquiring a guard moves the
//! flag to `loading`, and dropping it moves the flag back to `idle` on every
//! exit path, including early returns through `?`. A guard can record a
//! failure message which becomes the flag's `last_error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Two-state status of a single flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No operation in progress
    #[default]
    Idle,
    /// An operation is in progress
    Loading,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "idle"),
            Status::Loading => write!(f, "loading"),
        }
    }
}

/// Point-in-time view of a flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Current status
    pub status: Status,
    /// Error recorded by the most recent completed operation, if it failed
    pub last_error: Option<String>,
    /// When the status last changed
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug)]
struct FlagState {
    active: usize,
    last_error: Option<String>,
    changed_at: DateTime<Utc>,
}

impl FlagState {
    fn status(&self) -> Status {
        if self.active > 0 {
            Status::Loading
        } else {
            Status::Idle
        }
    }
}

/// A named, shareable status flag
///
/// Clones share the same underlying state, so presentation code can hold a
/// clone and observe transitions made by the controller.
#[derive(Debug, Clone)]
pub struct StatusFlag {
    name: &'static str,
    state: Arc<RwLock<FlagState>>,
}

impl StatusFlag {
    /// Creates an idle flag
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(RwLock::new(FlagState {
                active: 0,
                last_error: None,
                changed_at: Utc::now(),
            })),
        }
    }

    /// Flag name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current status
    pub fn status(&self) -> Status {
        self.read().status()
    }

    /// Returns true while an operation holds the flag
    pub fn is_loading(&self) -> bool {
        self.status() == Status::Loading
    }

    /// Error recorded by the most recent failed operation
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    /// Returns a consistent view of status, error, and transition time
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.read();
        StatusSnapshot {
            status: state.status(),
            last_error: state.last_error.clone(),
            changed_at: state.changed_at,
        }
    }

    /// Moves the flag to `loading` and returns the guard that releases it
    ///
    /// Nested guards are counted; the flag returns to `idle` only when the
    /// last one is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::session::{Status, StatusFlag};
    ///
    /// let flag = StatusFlag::new("load");
    /// {
    ///     let _guard = flag.begin();
    ///     assert_eq!(flag.status(), Status::Loading);
    /// }
    /// assert_eq!(flag.status(), Status::Idle);
    /// ```
    pub fn begin(&self) -> StatusGuard {
        let mut state = self.write();
        state.active += 1;
        state.last_error = None;
        state.changed_at = Utc::now();
        tracing::trace!(status.flag = self.name, "status -> loading");
        StatusGuard {
            flag: self.clone(),
            error: None,
        }
    }

    /// Like [`begin`](Self::begin) but only succeeds when the flag is idle
    ///
    /// The check and the transition happen under one write lock.
    pub fn try_begin(&self) -> Option<StatusGuard> {
        let mut state = self.write();
        if state.active > 0 {
            return None;
        }
        state.active = 1;
        state.last_error = None;
        state.changed_at = Utc::now();
        tracing::trace!(status.flag = self.name, "status -> loading");
        Some(StatusGuard {
            flag: self.clone(),
            error: None,
        })
    }

    fn release(&self, error: Option<String>) {
        let mut state = self.write();
        state.active = state.active.saturating_sub(1);
        if error.is_some() {
            state.last_error = error;
        }
        if state.active == 0 {
            state.changed_at = Utc::now();
            tracing::trace!(status.flag = self.name, "status -> idle");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FlagState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FlagState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scoped `loading` state for a [`StatusFlag`]
///
/// Dropping the guard restores `idle`.
#[derive(Debug)]
#[must_use = "the flag returns to idle as soon as the guard is dropped"]
pub struct StatusGuard {
    flag: StatusFlag,
    error: Option<String>,
}

impl StatusGuard {
    /// Records a failure to be published when the guard is released
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.error = Some(error.to_string());
    }

    /// Records the error of `result` (if any) and passes it through
    pub fn track<T>(&mut self, result: crate::error::Result<T>) -> crate::error::Result<T> {
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        self.flag.release(self.error.take());
    }
}

/// The three flags exposed by the controller
#[derive(Debug, Clone)]
pub struct StatusTracker {
    /// Document/conversation load
    pub load: StatusFlag,
    /// Conversation-list mutation (creating conversations)
    pub list: StatusFlag,
    /// Message submission
    pub submission: StatusFlag,
}

impl StatusTracker {
    /// Creates a tracker with all flags idle
    pub fn new() -> Self {
        Self {
            load: StatusFlag::new("load"),
            list: StatusFlag::new("list"),
            submission: StatusFlag::new("submission"),
        }
    }

    /// Returns true if any flag is loading
    pub fn any_loading(&self) -> bool {
        self.load.is_loading() || self.list.is_loading() || self.submission.is_loading()
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
