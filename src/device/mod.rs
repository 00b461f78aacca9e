// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device definitions.
//!
//! A [`Device`] bundles everything the connection controller needs to drive
//! one instrument: the transport that opens its session, its configuration,
//! its lifecycle hooks, and the properties and actions it exposes.
//!
//! Devices are assembled with a [`DeviceBuilder`]. Property and action
//! delegates talk to the instrument through the device's
//! [`SessionHandle`], so the builder hands out the handle (and the event
//! emitter cells publish through) before the device is built.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use instrument_lib::action::Action;
//! use instrument_lib::cell::AsyncCell;
//! use instrument_lib::device::{DeviceBuilder, DeviceConfig};
//! use instrument_lib::error::{DeviceError, SessionError};
//! use instrument_lib::session::{Session, Transport};
//!
//! # struct Null;
//! # impl Session for Null {
//! #     async fn write(&mut self, _: &str) -> Result<(), SessionError> { Ok(()) }
//! #     async fn read(&mut self) -> Result<String, SessionError> { Ok("0".into()) }
//! #     async fn close(&mut self) -> Result<(), SessionError> { Ok(()) }
//! # }
//! # struct NullTransport;
//! # impl Transport for NullTransport {
//! #     type Session = Null;
//! #     async fn open(&self, _: &str, _: Duration) -> Result<Null, SessionError> { Ok(Null) }
//! # }
//! # fn example() -> instrument_lib::Result<()> {
//! let builder = DeviceBuilder::new(NullTransport, DeviceConfig::new("ASRL1::INSTR"));
//! let session = builder.session();
//!
//! let voltage = AsyncCell::<f64>::builder("voltage")
//!     .getter({
//!         let session = session.clone();
//!         move || {
//!             let session = session.clone();
//!             async move {
//!                 let reply = session.query("MEAS:VOLT?").await?;
//!                 reply.trim().parse::<f64>().map_err(|e| DeviceError::Parse(format!("{e}")))
//!             }
//!         }
//!     })
//!     .build(builder.emitter())?;
//!
//! let output_off = Action::new("output_off", move || {
//!     let session = session.clone();
//!     async move { session.write("OUTP OFF").await.map_err(DeviceError::from) }
//! });
//!
//! let device = builder.add_cell(&voltage).add_action(output_off).build()?;
//! assert_eq!(device.cells().len(), 1);
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod hooks;

pub use builder::DeviceBuilder;
pub use config::{DEFAULT_OPEN_TIMEOUT, DeviceConfig};
pub use hooks::{DeviceHooks, NoHooks};

use std::sync::Arc;

use crate::action::Action;
use crate::cell::Refreshable;
use crate::event::{DeviceId, EventBus, EventEmitter};
use crate::session::{SessionHandle, Transport};

/// A fully configured instrument, ready to be connected.
pub struct Device<T: Transport, H = NoHooks> {
    id: DeviceId,
    config: DeviceConfig,
    transport: T,
    hooks: H,
    session: SessionHandle<T::Session>,
    emitter: EventEmitter,
    cells: Vec<Arc<dyn Refreshable>>,
    actions: Vec<Action>,
}

impl<T: Transport, H: DeviceHooks<T::Session>> Device<T, H> {
    /// Returns the device ID.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Returns the name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config.display_name()
    }

    /// Returns the device configuration.
    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Returns the handle to the device's session.
    #[must_use]
    pub fn session(&self) -> &SessionHandle<T::Session> {
        &self.session
    }

    /// Returns the event bus the device publishes to.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        self.emitter.bus()
    }

    /// Returns the emitter bound to this device.
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Returns the properties in registration order.
    #[must_use]
    pub fn cells(&self) -> &[Arc<dyn Refreshable>] {
        &self.cells
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn cell(&self, name: &str) -> Option<&Arc<dyn Refreshable>> {
        self.cells.iter().find(|c| c.name() == name)
    }

    /// Returns the actions in registration order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Looks up an action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn hooks(&self) -> &H {
        &self.hooks
    }
}

impl<T: Transport, H> std::fmt::Debug for Device<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("cells", &self.cells.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}
