// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcasting of device events.

use tokio::sync::broadcast;

use super::{DeviceEvent, DeviceId};

/// Number of events a subscriber may fall behind before it starts missing
/// the oldest ones.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A broadcast channel of [`DeviceEvent`]s.
///
/// One bus may be shared by many devices. Clones publish to and subscribe
/// from the same channel. A subscriber that falls more than the channel
/// capacity behind receives `RecvError::Lagged` and skips ahead; publishing
/// never blocks.
///
/// ```
/// use instrument_lib::event::{DeviceEvent, DeviceId, EventBus};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// let emitter = bus.emitter(DeviceId::new());
/// emitter.emit(DeviceEvent::disconnected);
///
/// assert_eq!(rx.try_recv().unwrap().device_id(), emitter.device_id());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Creates a bus holding up to [`DEFAULT_EVENT_CAPACITY`] undelivered
    /// events per subscriber.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a bus with a custom backlog per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tx: broadcast::Sender::new(capacity),
        }
    }

    /// Receives every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }

    /// Returns how many receivers are subscribed.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publishes `event` and returns how many subscribers it reached.
    ///
    /// Events published while nobody listens are dropped.
    pub fn publish(&self, event: DeviceEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Returns an emitter that tags events with `device_id`.
    #[must_use]
    pub fn emitter(&self, device_id: DeviceId) -> EventEmitter {
        EventEmitter::new(device_id, self.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes events on behalf of one device.
///
/// Cells, actions, the auto-refresher and the connection controller each hold
/// a clone, so every signal they raise carries the owning device's ID.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    device_id: DeviceId,
    bus: EventBus,
}

impl EventEmitter {
    /// Creates an emitter for the given device.
    #[must_use]
    pub fn new(device_id: DeviceId, bus: EventBus) -> Self {
        Self { device_id, bus }
    }

    /// Returns the device this emitter publishes for.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Returns the underlying bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Builds an event for this device and publishes it.
    pub fn emit(&self, make: impl FnOnce(DeviceId) -> DeviceEvent) {
        self.bus.publish(make(self.device_id));
    }
}
