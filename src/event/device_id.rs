// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity of a device instance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one built device for its whole lifetime.
///
/// Two devices configured with the same address and name still get distinct
/// IDs, which is what events and errors are attributed with.
///
/// ```
/// use instrument_lib::event::DeviceId;
///
/// let id = DeviceId::new();
/// let parsed: DeviceId = id.to_string().parse().unwrap();
/// assert_eq!(parsed, id);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Generates a random ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an ID that was stored earlier.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the ID as a UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the first eight hex digits, enough to tell devices apart in
    /// log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let mut buf = Uuid::encode_buffer();
        self.0.simple().encode_lower(&mut buf)[..8].to_string()
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceId").field(&self.short()).finish()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for DeviceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for DeviceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct() {
        assert_ne!(DeviceId::new(), DeviceId::new());
    }

    #[test]
    fn display_and_parse_agree() {
        let text = "0f1e2d3c-4b5a-4968-8776-655443322110";
        let id: DeviceId = text.parse().unwrap();

        assert_eq!(id.to_string(), text);
        assert_eq!(id.short(), "0f1e2d3c");
        assert_eq!(format!("{id:?}"), r#"DeviceId("0f1e2d3c")"#);
    }

    #[test]
    fn rejects_garbage() {
        assert!("oven-1".parse::<DeviceId>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&DeviceId::from(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
