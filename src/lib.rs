// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instrument Lib - device lifecycle and concurrency core for laboratory
//! instruments.
//!
//! This library drives instruments (power supplies, temperature controllers,
//! meters) that are reached through a text-based session such as VISA, a
//! serial port or a raw socket. It does not implement any transport itself;
//! applications provide one through the [`session::Transport`] trait.
//!
//! # Building Blocks
//!
//! - **Properties**: [`AsyncCell`] is a named value with an async getter
//!   and/or setter. Reads are single-flight, writes are queued in order.
//! - **Actions**: [`Action`]s run through an [`ActionExecutor`], which never
//!   runs the same action twice at once.
//! - **Polling**: an [`AutoRefresher`] keeps every property current while the
//!   device is connected.
//! - **Lifecycle**: a [`ConnectionController`] opens the session, prepares the
//!   device, primes every property and tears it all down again, cancellably.
//!
//! Failures of background work never surface as panics or lost errors: they
//! are published as [`DeviceEvent`]s attributed to the device.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use instrument_lib::error::{DeviceError, SessionError};
//! use instrument_lib::session::{Session, Transport};
//! use instrument_lib::{AsyncCell, ConnectionController, DeviceBuilder, DeviceConfig};
//!
//! # struct Socket;
//! # impl Session for Socket {
//! #     async fn write(&mut self, _: &str) -> Result<(), SessionError> { Ok(()) }
//! #     async fn read(&mut self) -> Result<String, SessionError> { Ok("21.5".into()) }
//! #     async fn close(&mut self) -> Result<(), SessionError> { Ok(()) }
//! # }
//! # struct Tcp;
//! # impl Transport for Tcp {
//! #     type Session = Socket;
//! #     async fn open(&self, _: &str, _: Duration) -> Result<Socket, SessionError> { Ok(Socket) }
//! # }
//! #[tokio::main]
//! async fn main() -> instrument_lib::Result<()> {
//!     let builder = DeviceBuilder::new(Tcp, DeviceConfig::new("192.168.1.20:5025"));
//!     let session = builder.session();
//!
//!     let setpoint = AsyncCell::<f64>::builder("setpoint")
//!         .getter({
//!             let session = session.clone();
//!             move || {
//!                 let session = session.clone();
//!                 async move {
//!                     let reply = session.query("SOUR:TEMP?").await?;
//!                     reply.trim().parse::<f64>().map_err(|e| DeviceError::Parse(e.to_string()))
//!                 }
//!             }
//!         })
//!         .setter(move |value| {
//!             let session = session.clone();
//!             async move {
//!                 session.write(&format!("SOUR:TEMP {value}")).await.map_err(DeviceError::from)
//!             }
//!         })
//!         .auto_refresh_after_set(true)
//!         .build(builder.emitter())?;
//!
//!     let device = builder.add_cell(&setpoint).build()?;
//!     let controller = ConnectionController::new(Arc::new(device));
//!
//!     controller.begin_connect();
//!     controller.await_connect().wait().await;
//!
//!     setpoint.write(25.0);
//!     setpoint.await_set_processing().wait().await;
//!
//!     controller.begin_disconnect();
//!     controller.await_disconnect().wait().await;
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod cell;
pub mod controller;
pub mod device;
pub mod error;
pub mod event;
pub mod refresh;
pub mod session;
pub mod task;

pub use action::{Action, ActionExecutor};
pub use cell::{Access, AsyncCell, CellBuilder, DisplayCodec, Refreshable};
pub use controller::{ConnectionController, ConnectionState};
pub use device::{Device, DeviceBuilder, DeviceConfig, DeviceHooks, NoHooks};
pub use error::{DeviceError, Error, Result, SessionError};
pub use event::{DeviceEvent, DeviceId, EventBus, EventEmitter};
pub use refresh::{AutoRefresher, RefreshPolicy};
pub use session::{Session, SessionHandle, Transport};
pub use task::{TaskHandle, TaskOutcome};
