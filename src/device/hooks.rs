// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device-specific lifecycle hooks.

use std::future::Future;

use crate::error::DeviceError;
use crate::session::{Session, SessionHandle};

/// Instrument-specific steps run by the connection controller.
///
/// Every hook has a no-op default, so a device only implements the steps it
/// needs. Hooks receive the device's [`SessionHandle`] and may exchange as
/// many messages as they like.
///
/// | Hook | When |
/// |------|------|
/// | [`initialize`](Self::initialize) | after the session opened |
/// | [`identify`](Self::identify) | after initialize |
/// | [`de_initialize`](Self::de_initialize) | before the session closes; errors are logged and ignored |
/// | [`reset`](Self::reset) | on demand, while connected |
///
/// # Examples
///
/// ```
/// use instrument_lib::device::DeviceHooks;
/// use instrument_lib::error::DeviceError;
/// use instrument_lib::session::{Session, SessionHandle};
///
/// struct Scpi;
///
/// impl<S: Session> DeviceHooks<S> for Scpi {
///     async fn initialize(&self, session: &SessionHandle<S>) -> Result<(), DeviceError> {
///         session.write("*CLS").await?;
///         Ok(())
///     }
///
///     async fn identify(&self, session: &SessionHandle<S>) -> Result<String, DeviceError> {
///         Ok(session.query("*IDN?").await?.trim().to_string())
///     }
///
///     async fn reset(&self, session: &SessionHandle<S>) -> Result<(), DeviceError> {
///         session.write("*RST").await?;
///         Ok(())
///     }
/// }
/// ```
pub trait DeviceHooks<S: Session>: Send + Sync + 'static {
    /// Prepares the instrument after the session opened.
    ///
    /// # Errors
    ///
    /// A failure aborts the connect attempt.
    fn initialize(
        &self,
        session: &SessionHandle<S>,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        let _ = session;
        async { Ok(()) }
    }

    /// Returns the identifier the instrument reports about itself.
    ///
    /// # Errors
    ///
    /// A failure aborts the connect attempt.
    fn identify(
        &self,
        session: &SessionHandle<S>,
    ) -> impl Future<Output = Result<String, DeviceError>> + Send {
        let _ = session;
        async { Ok(String::new()) }
    }

    /// Returns the instrument to an idle state before the session closes.
    ///
    /// # Errors
    ///
    /// Failures are logged; the session is closed regardless.
    fn de_initialize(
        &self,
        session: &SessionHandle<S>,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        let _ = session;
        async { Ok(()) }
    }

    /// Resets the instrument to its power-on state.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the instrument rejected the reset.
    fn reset(
        &self,
        session: &SessionHandle<S>,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        let _ = session;
        async { Ok(()) }
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<S: Session> DeviceHooks<S> for NoHooks {}
