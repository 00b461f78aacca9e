// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared, serialized access to an open session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::Session;
use crate::error::SessionError;

/// A cloneable handle to the session of one device.
///
/// The handle exists before the device connects; property and action
/// delegates capture a clone of it while the device is being configured. The
/// connection controller installs the session after opening it and takes it
/// back out before closing it. Until then, every operation fails with
/// [`SessionError::NotOpen`].
///
/// All access goes through one async mutex, so a message exchange started by
/// one task completes before the next task can write.
pub struct SessionHandle<S> {
    slot: Arc<Mutex<Option<S>>>,
    open: Arc<AtomicBool>,
}

impl<S: Session> SessionHandle<S> {
    /// Creates a handle with no open session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` while a session is installed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Locks the session for a multi-step exchange.
    ///
    /// Other users of the handle wait until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotOpen` if no session is installed.
    pub async fn lock(&self) -> Result<MappedMutexGuard<'_, S>, SessionError> {
        let guard = self.slot.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| SessionError::NotOpen)
    }

    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if no session is open or the write fails.
    pub async fn write(&self, message: &str) -> Result<(), SessionError> {
        self.lock().await?.write(message).await
    }

    /// Receives one message.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if no session is open or the read fails.
    pub async fn read(&self) -> Result<String, SessionError> {
        self.lock().await?.read().await
    }

    /// Sends a message and reads the reply without letting another exchange
    /// in between.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if no session is open or either step fails.
    pub async fn query(&self, message: &str) -> Result<String, SessionError> {
        let mut session = self.lock().await?;
        session.write(message).await?;
        session.read().await
    }

    /// Installs a freshly opened session.
    ///
    /// Returns the previously installed session, if any.
    pub(crate) async fn install(&self, session: S) -> Option<S> {
        let mut slot = self.slot.lock().await;
        let previous = slot.replace(session);
        self.open.store(true, Ordering::Release);
        previous
    }

    /// Removes the session so it can be closed.
    ///
    /// Waits for any exchange in progress. Only the first caller gets the
    /// session back, so it is closed at most once.
    pub(crate) async fn take(&self) -> Option<S> {
        let mut slot = self.slot.lock().await;
        self.open.store(false, Ordering::Release);
        slot.take()
    }
}

impl<S: Session> Default for SessionHandle<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            open: Arc::clone(&self.open),
        }
    }
}

impl<S> std::fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
