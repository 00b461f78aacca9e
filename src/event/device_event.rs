// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use serde::{Deserialize, Serialize};

use crate::controller::ConnectionState;

use super::DeviceId;

/// Signals raised while a device is configured, connected and driven.
///
/// Every event carries the [`DeviceId`] of the device that raised it, so a
/// single subscriber can follow many devices. Errors are carried as rendered
/// messages to keep events cheap to clone across broadcast receivers.
///
/// # Examples
///
/// ```
/// use instrument_lib::event::{DeviceEvent, DeviceId};
///
/// let device_id = DeviceId::new();
/// let event = DeviceEvent::getter_failed(device_id, "temperature", "timeout");
///
/// assert!(event.is_failure());
/// assert_eq!(event.device_id(), device_id);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// The connection state machine moved to a new state.
    ConnectionStateChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// The state that is now current.
        state: ConnectionState,
    },

    /// The connect sequence finished and the device is usable.
    Connected {
        /// The ID of the device.
        device_id: DeviceId,
        /// Identifier reported by the instrument.
        identifier: String,
    },

    /// The session was closed.
    Disconnected {
        /// The ID of the device.
        device_id: DeviceId,
        /// Error message if the disconnection was caused by a failure.
        error: Option<String>,
    },

    /// A property read completed and stored a new value.
    GetterUpdated {
        /// The ID of the device.
        device_id: DeviceId,
        /// Name of the property.
        cell: String,
        /// Display form of the new value.
        value: String,
    },

    /// A property read failed; the last known value is unchanged.
    GetterFailed {
        /// The ID of the device.
        device_id: DeviceId,
        /// Name of the property.
        cell: String,
        /// Description of the failure.
        error: String,
    },

    /// A property write completed.
    SetterCompleted {
        /// The ID of the device.
        device_id: DeviceId,
        /// Name of the property.
        cell: String,
    },

    /// A property write failed.
    SetterFailed {
        /// The ID of the device.
        device_id: DeviceId,
        /// Name of the property.
        cell: String,
        /// Description of the failure.
        error: String,
    },

    /// The auto-refresher finished one pass over every property.
    AutoUpdateCycle {
        /// The ID of the device.
        device_id: DeviceId,
        /// Number of completed passes, starting at 1.
        cycle: u64,
    },

    /// A property read failed during auto-refresh.
    AutoUpdateException {
        /// The ID of the device.
        device_id: DeviceId,
        /// Name of the property.
        cell: String,
        /// Description of the failure.
        error: String,
    },

    /// An action finished successfully.
    ActionCompleted {
        /// The ID of the device.
        device_id: DeviceId,
        /// Name of the action.
        action: String,
    },

    /// An action delegate failed.
    ActionFailed {
        /// The ID of the device.
        device_id: DeviceId,
        /// Name of the action.
        action: String,
        /// Description of the failure.
        error: String,
    },

    /// Any other failure attributed to the device.
    Exception {
        /// The ID of the device.
        device_id: DeviceId,
        /// Description of the failure.
        error: String,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::ConnectionStateChanged { device_id, .. }
            | Self::Connected { device_id, .. }
            | Self::Disconnected { device_id, .. }
            | Self::GetterUpdated { device_id, .. }
            | Self::GetterFailed { device_id, .. }
            | Self::SetterCompleted { device_id, .. }
            | Self::SetterFailed { device_id, .. }
            | Self::AutoUpdateCycle { device_id, .. }
            | Self::AutoUpdateException { device_id, .. }
            | Self::ActionCompleted { device_id, .. }
            | Self::ActionFailed { device_id, .. }
            | Self::Exception { device_id, .. } => *device_id,
        }
    }

    /// Returns `true` if this is a connection lifecycle event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::ConnectionStateChanged { .. } | Self::Connected { .. } | Self::Disconnected { .. }
        )
    }

    /// Returns `true` if this event reports a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match self {
            Self::GetterFailed { .. }
            | Self::SetterFailed { .. }
            | Self::AutoUpdateException { .. }
            | Self::ActionFailed { .. }
            | Self::Exception { .. } => true,
            Self::Disconnected { error, .. } => error.is_some(),
            _ => false,
        }
    }

    /// Returns the property name for property events.
    #[must_use]
    pub fn cell(&self) -> Option<&str> {
        match self {
            Self::GetterUpdated { cell, .. }
            | Self::GetterFailed { cell, .. }
            | Self::SetterCompleted { cell, .. }
            | Self::SetterFailed { cell, .. }
            | Self::AutoUpdateException { cell, .. } => Some(cell),
            _ => None,
        }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(device_id: DeviceId, state: ConnectionState) -> Self {
        Self::ConnectionStateChanged { device_id, state }
    }

    /// Creates a connected event.
    #[must_use]
    pub fn connected(device_id: DeviceId, identifier: impl Into<String>) -> Self {
        Self::Connected {
            device_id,
            identifier: identifier.into(),
        }
    }

    /// Creates a disconnected event.
    #[must_use]
    pub fn disconnected(device_id: DeviceId) -> Self {
        Self::Disconnected {
            device_id,
            error: None,
        }
    }

    /// Creates a disconnected event with an error.
    #[must_use]
    pub fn disconnected_with_error(device_id: DeviceId, error: impl Into<String>) -> Self {
        Self::Disconnected {
            device_id,
            error: Some(error.into()),
        }
    }

    /// Creates a getter updated event.
    #[must_use]
    pub fn getter_updated(
        device_id: DeviceId,
        cell: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::GetterUpdated {
            device_id,
            cell: cell.into(),
            value: value.into(),
        }
    }

    /// Creates a getter failed event.
    #[must_use]
    pub fn getter_failed(
        device_id: DeviceId,
        cell: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::GetterFailed {
            device_id,
            cell: cell.into(),
            error: error.into(),
        }
    }

    /// Creates a setter completed event.
    #[must_use]
    pub fn setter_completed(device_id: DeviceId, cell: impl Into<String>) -> Self {
        Self::SetterCompleted {
            device_id,
            cell: cell.into(),
        }
    }

    /// Creates a setter failed event.
    #[must_use]
    pub fn setter_failed(
        device_id: DeviceId,
        cell: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::SetterFailed {
            device_id,
            cell: cell.into(),
            error: error.into(),
        }
    }

    /// Creates an auto-update cycle event.
    #[must_use]
    pub fn auto_update_cycle(device_id: DeviceId, cycle: u64) -> Self {
        Self::AutoUpdateCycle { device_id, cycle }
    }

    /// Creates an auto-update exception event.
    #[must_use]
    pub fn auto_update_exception(
        device_id: DeviceId,
        cell: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::AutoUpdateException {
            device_id,
            cell: cell.into(),
            error: error.into(),
        }
    }

    /// Creates an action completed event.
    #[must_use]
    pub fn action_completed(device_id: DeviceId, action: impl Into<String>) -> Self {
        Self::ActionCompleted {
            device_id,
            action: action.into(),
        }
    }

    /// Creates an action failed event.
    #[must_use]
    pub fn action_failed(
        device_id: DeviceId,
        action: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::ActionFailed {
            device_id,
            action: action.into(),
            error: error.into(),
        }
    }

    /// Creates an exception event.
    #[must_use]
    pub fn exception(device_id: DeviceId, error: impl Into<String>) -> Self {
        Self::Exception {
            device_id,
            error: error.into(),
        }
    }
}
