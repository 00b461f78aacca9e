// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the instrument library.
//!
//! The hierarchy has three levels:
//!
//! - [`SessionError`]: failures of the communication session itself
//!   (open, close, read, write).
//! - [`DeviceError`]: failures raised by a device definition, a property or
//!   action delegate, or a lifecycle hook.
//! - [`Error`]: what the public API returns. Device failures are always
//!   attributed to the device that produced them.

use thiserror::Error;

use crate::event::DeviceId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A failure attributed to a specific device.
    #[error("device '{name}' ({device}): {source}")]
    Device {
        /// The device that produced the error.
        device: DeviceId,
        /// Display name of the device.
        name: String,
        /// The underlying failure.
        #[source]
        source: DeviceError,
    },

    /// The device configuration was rejected before connecting.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation requires an open session.
    #[error("device '{name}' ({device}) is not connected")]
    NotConnected {
        /// The device that is not connected.
        device: DeviceId,
        /// Display name of the device.
        name: String,
    },
}

impl Error {
    /// Wraps a device failure with the identity of its device.
    #[must_use]
    pub fn device(device: DeviceId, name: impl Into<String>, source: DeviceError) -> Self {
        Self::Device {
            device,
            name: name.into(),
            source,
        }
    }

    /// Returns the device this error is attributed to, if any.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            Self::Device { device, .. } | Self::NotConnected { device, .. } => Some(*device),
            Self::InvalidConfiguration(_) => None,
        }
    }
}

/// Errors raised by devices, their properties, actions and lifecycle hooks.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The communication session failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Device-specific initialization failed.
    ///
    /// Any other error returned by the `initialize` hook is wrapped in this
    /// variant when it is reported.
    #[error("initialization failed: {0}")]
    Initialize(String),

    /// The device identifier could not be fetched.
    ///
    /// Wraps errors returned by the `identify` hook.
    #[error("identification failed: {0}")]
    Identify(String),

    /// A property getter or setter failed.
    #[error("property '{name}' failed: {message}")]
    Property {
        /// Name of the property.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// An action delegate failed or panicked.
    #[error("action '{name}' failed: {message}")]
    Action {
        /// Name of the action.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// A value could not be converted from its display form.
    #[error("parse error: {0}")]
    Parse(String),

    /// The property cannot be written.
    #[error("property '{0}' is not writable")]
    NotWritable(String),

    /// Any other device failure.
    #[error("{0}")]
    Failed(String),
}

/// Errors related to the communication session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening the session failed.
    #[error("failed to open '{address}': {message}")]
    OpenFailed {
        /// Address that was being opened.
        address: String,
        /// Description of the failure.
        message: String,
    },

    /// An operation exceeded its timeout.
    #[error("session timed out after {millis} ms")]
    Timeout {
        /// Elapsed time in milliseconds.
        millis: u64,
    },

    /// The session is not open.
    #[error("session is not open")]
    NotOpen,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The instrument replied with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
