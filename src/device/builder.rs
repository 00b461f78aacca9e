// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device builder.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use super::{Device, DeviceConfig, DeviceHooks, NoHooks};
use crate::action::Action;
use crate::cell::{AsyncCell, Refreshable};
use crate::error::Error;
use crate::event::{DeviceId, EventBus, EventEmitter};
use crate::session::{SessionHandle, Transport};

/// Builder for [`Device`].
///
/// The device ID, session handle and event emitter exist from the moment the
/// builder is created, so cells and actions can capture them.
pub struct DeviceBuilder<T: Transport, H = NoHooks> {
    config: DeviceConfig,
    transport: T,
    hooks: H,
    session: SessionHandle<T::Session>,
    emitter: EventEmitter,
    cells: Vec<Arc<dyn Refreshable>>,
    actions: Vec<Action>,
}

impl<T: Transport> DeviceBuilder<T, NoHooks> {
    /// Creates a builder publishing to a new event bus.
    #[must_use]
    pub fn new(transport: T, config: DeviceConfig) -> Self {
        Self::with_event_bus(transport, config, EventBus::new())
    }

    /// Creates a builder publishing to a shared event bus.
    ///
    /// Use this to follow several devices through one subscription.
    #[must_use]
    pub fn with_event_bus(transport: T, config: DeviceConfig, bus: EventBus) -> Self {
        Self {
            config,
            transport,
            hooks: NoHooks,
            session: SessionHandle::new(),
            emitter: bus.emitter(DeviceId::new()),
            cells: Vec::new(),
            actions: Vec::new(),
        }
    }
}

impl<T: Transport, H: DeviceHooks<T::Session>> DeviceBuilder<T, H> {
    /// Sets the lifecycle hooks.
    #[must_use]
    pub fn with_hooks<H2: DeviceHooks<T::Session>>(self, hooks: H2) -> DeviceBuilder<T, H2> {
        DeviceBuilder {
            config: self.config,
            transport: self.transport,
            hooks,
            session: self.session,
            emitter: self.emitter,
            cells: self.cells,
            actions: self.actions,
        }
    }

    /// Returns the ID the device will have.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.emitter.device_id()
    }

    /// Returns a clone of the device's session handle.
    #[must_use]
    pub fn session(&self) -> SessionHandle<T::Session> {
        self.session.clone()
    }

    /// Returns the emitter cells should be built with.
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Registers a property.
    ///
    /// The device keeps a clone; the caller keeps the typed cell for reading
    /// and writing. The cell must have been built with [`Self::emitter`].
    #[must_use]
    pub fn add_cell<V>(mut self, cell: &AsyncCell<V>) -> Self
    where
        V: Clone + Debug + Send + Sync + 'static,
    {
        self.cells.push(Arc::new(cell.clone()));
        self
    }

    /// Registers an action.
    #[must_use]
    pub fn add_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Validates the configuration and builds the device.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if the configuration is invalid,
    /// a property was built for another device, or two properties or two
    /// actions share a name.
    pub fn build(self) -> Result<Device<T, H>, Error> {
        self.config.validate()?;
        let id = self.emitter.device_id();
        if let Some(stray) = self.cells.iter().find(|c| c.device_id() != id) {
            return Err(Error::InvalidConfiguration(format!(
                "property '{}' reports to device {} instead of {id}",
                stray.name(),
                stray.device_id()
            )));
        }
        ensure_unique("property", self.cells.iter().map(|c| c.name()))?;
        ensure_unique("action", self.actions.iter().map(Action::name))?;

        tracing::debug!(
            device_id = %self.emitter.device_id(),
            name = %self.config.display_name(),
            cells = self.cells.len(),
            actions = self.actions.len(),
            "device built"
        );

        Ok(Device {
            id: self.emitter.device_id(),
            config: self.config,
            transport: self.transport,
            hooks: self.hooks,
            session: self.session,
            emitter: self.emitter,
            cells: self.cells,
            actions: self.actions,
        })
    }
}

fn ensure_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::InvalidConfiguration(format!(
                "duplicate {kind} name '{name}'"
            )));
        }
    }
    Ok(())
}

impl<T: Transport, H> std::fmt::Debug for DeviceBuilder<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuilder")
            .field("config", &self.config)
            .field("cells", &self.cells.len())
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::SessionError;
    use crate::session::Session;

    struct Idle;

    impl Session for Idle {
        async fn write(&mut self, _message: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn read(&mut self) -> Result<String, SessionError> {
            Ok(String::new())
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    struct IdleTransport;

    impl Transport for IdleTransport {
        type Session = Idle;

        async fn open(&self, _address: &str, _timeout: Duration) -> Result<Idle, SessionError> {
            Ok(Idle)
        }
    }

    fn builder() -> DeviceBuilder<IdleTransport> {
        DeviceBuilder::new(IdleTransport, DeviceConfig::new("ASRL1::INSTR").with_friendly_name("Oven"))
    }

    fn cell(builder: &DeviceBuilder<IdleTransport>, name: &str) -> AsyncCell<f64> {
        AsyncCell::builder(name)
            .getter(|| async { Ok(0.0) })
            .build(builder.emitter())
            .unwrap()
    }

    #[test]
    fn builds_device_with_cells_and_actions() {
        let builder = builder();
        let id = builder.device_id();
        let temperature = cell(&builder, "temperature");
        let setpoint = cell(&builder, "setpoint");

        let device = builder
            .add_cell(&temperature)
            .add_cell(&setpoint)
            .add_action(Action::new("reset", || async { Ok(()) }))
            .build()
            .unwrap();

        assert_eq!(device.id(), id);
        assert_eq!(device.name(), "Oven");
        assert_eq!(device.cells().len(), 2);
        assert_eq!(device.cells()[0].name(), "temperature");
        assert!(device.cell("setpoint").is_some());
        assert!(device.action("reset").is_some());
        assert!(device.action("missing").is_none());
        assert!(!device.session().is_open());
    }

    #[test]
    fn rejects_duplicate_cell_names() {
        let builder = builder();
        let a = cell(&builder, "temperature");
        let b = cell(&builder, "temperature");

        let err = builder.add_cell(&a).add_cell(&b).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(msg) if msg.contains("temperature")));
    }

    #[test]
    fn rejects_cell_built_for_another_device() {
        let other = builder();
        let stray = cell(&other, "temperature");

        let err = builder().add_cell(&stray).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(msg) if msg.contains("temperature")));
    }

    #[test]
    fn rejects_duplicate_action_names() {
        let err = builder()
            .add_action(Action::new("zero", || async { Ok(()) }))
            .add_action(Action::new("zero", || async { Ok(()) }))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_invalid_config() {
        let result = DeviceBuilder::new(IdleTransport, DeviceConfig::new("")).build();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn shared_bus_sees_every_device() {
        let bus = EventBus::new();
        let a = DeviceBuilder::with_event_bus(IdleTransport, DeviceConfig::new("A"), bus.clone());
        let b = DeviceBuilder::with_event_bus(IdleTransport, DeviceConfig::new("B"), bus.clone());

        let _rx = bus.subscribe();
        assert_ne!(a.device_id(), b.device_id());
        assert_eq!(a.emitter().bus().subscriber_count(), 1);
        assert_eq!(b.emitter().bus().subscriber_count(), 1);
    }
}
