// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for device signals.
//!
//! Every asynchronous outcome in this library (connection state changes,
//! property reads and writes, auto-refresh cycles, action completions and
//! failures) is reported as a [`DeviceEvent`] on an [`EventBus`] rather than
//! thrown at a caller. The bus uses tokio's broadcast channel so any number
//! of subscribers can observe the same device.
//!
//! # Examples
//!
//! ```
//! use instrument_lib::event::{DeviceEvent, DeviceId, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! let device_id = DeviceId::new();
//! bus.publish(DeviceEvent::connected(device_id, "ACME,TC-1,0001,1.0"));
//! ```

mod device_event;
mod device_id;
mod event_bus;

pub use device_event::DeviceEvent;
pub use device_id::DeviceId;
pub use event_bus::{DEFAULT_EVENT_CAPACITY, EventBus, EventEmitter};
