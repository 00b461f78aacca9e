// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Completion handles for background work.
//!
//! Property reads and writes, actions, connects and disconnects all run as
//! spawned tokio tasks. Callers that need to know when one of them finished
//! receive a [`TaskHandle`]: a cloneable, awaitable view of a single task's
//! outcome. A handle for work that is not running is already complete.

use futures::future::join_all;
use tokio::sync::watch;

/// How a background task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task finished without error.
    Succeeded,
    /// The task failed; the message describes the failure.
    Failed(String),
    /// The task was cancelled or dropped before it could finish.
    Cancelled,
}

impl TaskOutcome {
    /// Returns `true` if the task finished without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns the failure message, if the task failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// An awaitable view of one background task.
///
/// Cloning the handle is cheap; every clone observes the same outcome.
///
/// # Examples
///
/// ```
/// use instrument_lib::task::{TaskHandle, TaskOutcome};
///
/// # async fn example() {
/// let handle = TaskHandle::completed();
/// assert!(handle.is_finished());
/// assert_eq!(handle.wait().await, TaskOutcome::Succeeded);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TaskHandle {
    rx: Option<watch::Receiver<Option<TaskOutcome>>>,
}

/// The sending half of a [`TaskHandle`], owned by the running task.
///
/// Dropping it without calling [`complete`](Self::complete) resolves every
/// handle with [`TaskOutcome::Cancelled`].
#[derive(Debug)]
pub(crate) struct TaskCompleter {
    tx: watch::Sender<Option<TaskOutcome>>,
}

impl TaskCompleter {
    /// Publishes the outcome to every handle.
    pub(crate) fn complete(self, outcome: TaskOutcome) {
        self.tx.send_replace(Some(outcome));
    }
}

impl TaskHandle {
    /// Creates a pending handle together with its completer.
    pub(crate) fn pending() -> (TaskCompleter, Self) {
        let (tx, rx) = watch::channel(None);
        (TaskCompleter { tx }, Self { rx: Some(rx) })
    }

    /// Returns a handle that is already complete.
    #[must_use]
    pub fn completed() -> Self {
        Self { rx: None }
    }

    /// Returns `true` if the task has finished (or was never running).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.rx {
            None => true,
            Some(rx) => rx.borrow().is_some() || rx.has_changed().is_err(),
        }
    }

    /// Waits for the task to finish and returns its outcome.
    pub async fn wait(&self) -> TaskOutcome {
        let Some(rx) = &self.rx else {
            return TaskOutcome::Succeeded;
        };
        let mut rx = rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => Option::clone(&outcome).unwrap_or(TaskOutcome::Cancelled),
            Err(_) => TaskOutcome::Cancelled,
        }
    }

    /// Waits for every handle and returns their outcomes in order.
    pub async fn wait_all(handles: &[TaskHandle]) -> Vec<TaskOutcome> {
        join_all(handles.iter().map(TaskHandle::wait)).await
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::completed()
    }
}
