// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triggerable device operations.
//!
//! An [`Action`] is a named, zero-argument operation on an instrument
//! (zeroing a stage, starting a sweep, resetting an error queue). Actions are
//! started through an [`ActionExecutor`], which runs each action at most once
//! at a time: asking for an action that is still running is ignored rather
//! than queued.
//!
//! Each connection controller owns its own executor, so two devices in the
//! same process may run actions with the same name concurrently.
//!
//! # Examples
//!
//! ```
//! use instrument_lib::action::{Action, ActionExecutor};
//! use instrument_lib::event::{DeviceId, EventBus, EventEmitter};
//!
//! # async fn example() {
//! let executor = ActionExecutor::new(EventEmitter::new(DeviceId::new(), EventBus::new()));
//! let zero = Action::new("zero", || async { Ok(()) });
//!
//! assert!(executor.begin_execute(&zero));
//! executor.await_all().await;
//! # }
//! ```

mod executor;

pub use executor::ActionExecutor;

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::DeviceError;

/// The operation behind an action.
pub type ActionDelegate = Arc<dyn Fn() -> BoxFuture<'static, Result<(), DeviceError>> + Send + Sync>;

type CanExecute = Arc<dyn Fn() -> bool + Send + Sync>;

/// A named operation that can be triggered on a device.
#[derive(Clone)]
pub struct Action {
    name: String,
    delegate: ActionDelegate,
    can_execute: CanExecute,
}

impl Action {
    /// Creates an action that runs `delegate` when executed.
    pub fn new<F, Fut>(name: impl Into<String>, delegate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeviceError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            delegate: Arc::new(move || delegate().boxed()),
            can_execute: Arc::new(|| true),
        }
    }

    /// Adds a predicate that must hold for the action to start.
    #[must_use]
    pub fn with_can_execute(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.can_execute = Arc::new(predicate);
        self
    }

    /// Returns the action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the action's own predicate.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        (self.can_execute)()
    }

    pub(crate) fn invoke(&self) -> BoxFuture<'static, Result<(), DeviceError>> {
        (self.delegate)()
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
