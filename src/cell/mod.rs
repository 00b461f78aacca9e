// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Asynchronous device properties.
//!
//! An [`AsyncCell`] is one named value exposed by an instrument: a measured
//! temperature, a setpoint, an output state. Reading and writing it talks to
//! the instrument, so both paths run as background tasks and report their
//! outcome through [`DeviceEvent`](crate::event::DeviceEvent)s instead of
//! returning errors.
//!
//! # Guarantees
//!
//! - At most one read runs per cell. Requesting a refresh while a read is in
//!   flight does nothing; awaiting [`AsyncCell::await_get_refresh`] observes
//!   the read already running.
//! - Writes are never coalesced, but they are serialized: each write waits for
//!   the previous one on the same cell, so at most one setter runs at a time
//!   and writes reach the instrument in call order.
//! - Reads and writes of the same cell are not ordered against each other.
//!   Await [`AsyncCell::await_set_processing`] before reading if you need
//!   read-after-write.
//!
//! # Examples
//!
//! ```
//! use instrument_lib::cell::{AsyncCell, DisplayCodec};
//! use instrument_lib::event::{DeviceId, EventBus, EventEmitter};
//!
//! # fn example() -> instrument_lib::Result<()> {
//! let emitter = EventEmitter::new(DeviceId::new(), EventBus::new());
//!
//! let setpoint = AsyncCell::<f64>::builder("setpoint")
//!     .getter(|| async { Ok(21.5) })
//!     .setter(|_value| async { Ok(()) })
//!     .auto_refresh_after_set(true)
//!     .display(DisplayCodec::parsed())
//!     .build(&emitter)?;
//!
//! assert!(setpoint.can_get() && setpoint.can_set());
//! # Ok(())
//! # }
//! ```

mod async_cell;
mod codec;

pub use async_cell::{AsyncCell, CellBuilder, Getter, Setter};
pub use codec::DisplayCodec;

use crate::event::DeviceId;
use crate::task::TaskHandle;

/// Which directions a property supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// The property can only be read.
    ReadOnly,
    /// The property can only be written.
    WriteOnly,
    /// The property can be read and written.
    ReadWrite,
}

impl Access {
    /// Returns `true` if reads are supported.
    #[must_use]
    pub fn can_get(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Returns `true` if writes are supported.
    #[must_use]
    pub fn can_set(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Type-erased view of a property, used to drive cells of different value
/// types from one list.
pub trait Refreshable: Send + Sync {
    /// Name of the property.
    fn name(&self) -> &str;

    /// Device the property's events are attributed to.
    fn device_id(&self) -> DeviceId;

    /// Supported directions.
    fn access(&self) -> Access;

    /// Starts a read unless one is in flight.
    fn request_get_refresh(&self);

    /// Handle to the current or most recent read.
    fn await_get_refresh(&self) -> TaskHandle;

    /// Handle to the last queued write.
    fn await_set_processing(&self) -> TaskHandle;

    /// Display form of the last known value.
    fn display_value(&self) -> Option<String>;
}
