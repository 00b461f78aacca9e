// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a device is in its connect/disconnect lifecycle.
///
/// ```text
/// Disconnected ──connect──▶ Initializing ──ok──▶ Connected
///                               │                   │
///                     failure / cancel          disconnect
///                               ▼                   ▼
///     DisconnectedWithError | Disconnected ◀── DeInitializing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No session is open.
    #[default]
    Disconnected,
    /// The session is being opened and the device prepared.
    Initializing,
    /// The device is usable.
    Connected,
    /// The device is being torn down.
    DeInitializing,
    /// The last connect attempt failed.
    DisconnectedWithError,
}

impl ConnectionState {
    /// Returns true if the device is connected.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if no session is open and nothing is in progress.
    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Disconnected | Self::DisconnectedWithError)
    }

    /// Returns true while connecting or disconnecting.
    #[must_use]
    pub fn is_transitioning(self) -> bool {
        matches!(self, Self::Initializing | Self::DeInitializing)
    }

    /// Returns true if the last connect attempt failed.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::DisconnectedWithError)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Initializing => "initializing",
            Self::Connected => "connected",
            Self::DeInitializing => "de-initializing",
            Self::DisconnectedWithError => "disconnected with error",
        };
        f.write_str(text)
    }
}
