// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::refresh::RefreshPolicy;

/// Default time allowed for opening a session.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for one instrument.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use instrument_lib::device::DeviceConfig;
/// use instrument_lib::refresh::RefreshPolicy;
///
/// let config = DeviceConfig::new("TCPIP0::192.168.1.20::INSTR")
///     .with_friendly_name("Bench PSU")
///     .with_open_timeout(Duration::from_secs(5))
///     .with_refresh(RefreshPolicy::default().with_delay(Duration::from_millis(100)));
///
/// assert_eq!(config.display_name(), "Bench PSU");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Resource string handed to the transport.
    pub address: String,
    /// Time allowed for opening the session.
    #[serde(default = "default_open_timeout")]
    pub open_timeout: Duration,
    /// Optional friendly name for the device.
    #[serde(default)]
    pub friendly_name: Option<String>,
    /// Background polling while connected.
    #[serde(default)]
    pub refresh: RefreshPolicy,
}

fn default_open_timeout() -> Duration {
    DEFAULT_OPEN_TIMEOUT
}

impl DeviceConfig {
    /// Creates a configuration for the instrument at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            friendly_name: None,
            refresh: RefreshPolicy::default(),
        }
    }

    /// Sets a friendly name for the device.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    /// Sets the time allowed for opening the session.
    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets the background polling policy.
    #[must_use]
    pub fn with_refresh(mut self, policy: RefreshPolicy) -> Self {
        self.refresh = policy;
        self
    }

    /// Returns the friendly name, or the address if none was set.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.address)
    }

    /// Parses and validates a configuration stored as JSON.
    ///
    /// Missing optional fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if the JSON is malformed or the
    /// configuration is invalid.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfiguration(format!("malformed device config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfiguration(format!("cannot serialize device config: {e}")))
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if the address is empty or the
    /// open timeout is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.address.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "device address must not be empty".to_string(),
            ));
        }
        if self.open_timeout.is_zero() {
            return Err(Error::InvalidConfiguration(format!(
                "open timeout for '{}' must be greater than zero",
                self.display_name()
            )));
        }
        Ok(())
    }
}
