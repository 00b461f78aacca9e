// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device connection lifecycle.
//!
//! A [`ConnectionController`] drives one [`Device`](crate::device::Device)
//! through its lifecycle.
//!
//! Connecting runs, in order:
//!
//! 1. open the session (bounded by the configured timeout)
//! 2. the device's `initialize` hook
//! 3. the device's `identify` hook
//! 4. one read of every readable property; any failure aborts the attempt
//! 5. start the auto-refresher (if enabled)
//!
//! Disconnecting stops the auto-refresher, waits for running actions and for
//! every pending property read and write, runs the `de_initialize` hook and
//! closes the session. A failed or cancelled connect attempt tears down the
//! same way.
//!
//! Both directions are started with `begin_*` methods that return
//! immediately, and awaited through the matching `await_*` handles. Starting
//! a disconnect while a connect is still running cancels the connect.
//!
//! # Example
//!
//! ```no_run
//! use instrument_lib::controller::{ConnectionController, ConnectionState};
//! # use std::sync::Arc;
//! # use instrument_lib::device::Device;
//! # use instrument_lib::session::Transport;
//!
//! # async fn example<T: Transport>(device: Device<T>) {
//! let controller = ConnectionController::new(Arc::new(device));
//!
//! controller.begin_connect();
//! controller.await_connect().wait().await;
//!
//! if controller.state() == ConnectionState::Connected {
//!     controller.begin_disconnect();
//!     controller.await_disconnect().wait().await;
//! }
//! # }
//! ```

mod connection_controller;
mod connection_state;

pub use connection_controller::ConnectionController;
pub use connection_state::ConnectionState;
