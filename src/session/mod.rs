// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Communication sessions with instruments.
//!
//! The library does not implement any transport. Applications plug one in by
//! implementing two traits:
//!
//! - [`Transport`] opens a session to an address (a VISA resource string, a
//!   serial port, a socket address, ...).
//! - [`Session`] exchanges text messages over the opened channel and closes
//!   it.
//!
//! The opened session lives inside a [`SessionHandle`], which serializes
//! every exchange: property getters, setters, actions and lifecycle hooks may
//! all be scheduled concurrently, but only one of them talks to the
//! instrument at a time.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use instrument_lib::error::SessionError;
//! use instrument_lib::session::{Session, Transport};
//!
//! struct Loopback(Vec<String>);
//!
//! impl Session for Loopback {
//!     async fn write(&mut self, message: &str) -> Result<(), SessionError> {
//!         self.0.push(message.to_string());
//!         Ok(())
//!     }
//!
//!     async fn read(&mut self) -> Result<String, SessionError> {
//!         self.0.pop().ok_or(SessionError::Protocol("nothing to read".into()))
//!     }
//!
//!     async fn close(&mut self) -> Result<(), SessionError> {
//!         Ok(())
//!     }
//! }
//!
//! struct LoopbackTransport;
//!
//! impl Transport for LoopbackTransport {
//!     type Session = Loopback;
//!
//!     async fn open(&self, _address: &str, _timeout: Duration) -> Result<Loopback, SessionError> {
//!         Ok(Loopback(Vec::new()))
//!     }
//! }
//! ```

mod handle;

pub use handle::SessionHandle;

use std::future::Future;
use std::time::Duration;

use crate::error::SessionError;

/// An open, stateful communication channel to one instrument.
pub trait Session: Send + 'static {
    /// Sends one message to the instrument.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the message could not be sent.
    fn write(&mut self, message: &str) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Receives one message from the instrument.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if no message could be received.
    fn read(&mut self) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Closes the channel.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the channel did not close cleanly. The
    /// session is considered closed either way.
    fn close(&mut self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Opens sessions to instruments.
pub trait Transport: Send + Sync + 'static {
    /// The session type produced by this transport.
    type Session: Session;

    /// Opens a session to `address`.
    ///
    /// The caller also enforces `timeout` around the returned future, so
    /// implementations may ignore it if the underlying library has no
    /// timeout of its own.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the instrument cannot be reached.
    fn open(
        &self,
        address: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}
