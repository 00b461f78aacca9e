// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deduplicating action executor.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;

use super::Action;
use crate::error::DeviceError;
use crate::event::{DeviceEvent, EventEmitter};
use crate::task::{TaskHandle, TaskOutcome};

/// Runs actions, at most one execution per action name at a time.
///
/// The registry of running actions is checked and updated under one lock, so
/// two callers racing to start the same action cannot both succeed. The
/// registry entry is removed when the execution finishes, whether it
/// succeeded, failed or panicked.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    running: Arc<Mutex<HashMap<String, TaskHandle>>>,
    emitter: EventEmitter,
}

impl ActionExecutor {
    /// Creates an executor whose events are published through `emitter`.
    #[must_use]
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            running: Arc::new(Mutex::new(HashMap::new())),
            emitter,
        }
    }

    /// Returns `true` if `action` is not running and its predicate holds.
    #[must_use]
    pub fn can_execute(&self, action: &Action) -> bool {
        !self.is_running(action.name()) && action.is_enabled()
    }

    /// Returns `true` if an action with this name is running.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.running.lock().contains_key(name)
    }

    /// Returns the number of running actions.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    /// Starts `action` unless it is already running or disabled.
    ///
    /// Returns `true` if a new execution was started. The outcome is
    /// reported through `ActionCompleted` and, on failure, `ActionFailed`
    /// events; it is never returned to the caller.
    pub fn begin_execute(&self, action: &Action) -> bool {
        if !action.is_enabled() {
            tracing::debug!(action = %action.name(), "action is disabled");
            return false;
        }

        let completer = {
            let mut running = self.running.lock();
            if running.contains_key(action.name()) {
                tracing::debug!(action = %action.name(), "action already running");
                return false;
            }
            let (completer, handle) = TaskHandle::pending();
            running.insert(action.name().to_string(), handle);
            completer
        };

        let running = Arc::clone(&self.running);
        let emitter = self.emitter.clone();
        let name = action.name().to_string();
        let action = action.clone();

        tokio::spawn(async move {
            tracing::debug!(action = %name, "action started");
            // The delegate is called inside the guard so a panic while
            // building its future is caught too
            let execution = AssertUnwindSafe(async { action.invoke().await });
            let outcome = match execution.catch_unwind().await {
                Ok(Ok(())) => TaskOutcome::Succeeded,
                Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
                Err(_) => TaskOutcome::Failed(
                    DeviceError::Action {
                        name: name.clone(),
                        message: "delegate panicked".to_string(),
                    }
                    .to_string(),
                ),
            };

            running.lock().remove(&name);

            if let Some(error) = outcome.error() {
                tracing::warn!(
                    device_id = %emitter.device_id(),
                    action = %name,
                    error = %error,
                    "action failed"
                );
                emitter.emit(|id| DeviceEvent::action_failed(id, &name, error));
            }
            emitter.emit(|id| DeviceEvent::action_completed(id, &name));
            completer.complete(outcome);
        });

        true
    }

    /// Returns a future that completes once every action running right now
    /// has finished.
    ///
    /// Actions started after this call are not waited for.
    pub fn await_all(&self) -> impl Future<Output = ()> + Send + 'static {
        let handles: Vec<TaskHandle> = self.running.lock().values().cloned().collect();
        async move {
            TaskHandle::wait_all(&handles).await;
        }
    }
}
