// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection controller implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::ConnectionState;
use crate::action::ActionExecutor;
use crate::device::{Device, DeviceHooks, NoHooks};
use crate::error::{DeviceError, Error, Result, SessionError};
use crate::event::{DeviceEvent, DeviceId};
use crate::refresh::AutoRefresher;
use crate::session::{Session, Transport};
use crate::task::{TaskHandle, TaskOutcome};

/// Drives one device through connect and disconnect.
///
/// The controller owns the device's [`ActionExecutor`] and
/// [`AutoRefresher`]. It can be cloned cheaply; all clones control the same
/// device. After a full disconnect the same controller may connect again.
///
/// Every failure is attributed to the device: errors returned to callers are
/// [`Error::Device`] or [`Error::NotConnected`], and failures of background
/// work are published as [`DeviceEvent`]s carrying the device ID.
pub struct ConnectionController<T: Transport, H: DeviceHooks<T::Session> = NoHooks> {
    inner: Arc<ControllerInner<T, H>>,
}

struct ControllerInner<T: Transport, H: DeviceHooks<T::Session>> {
    device: Arc<Device<T, H>>,
    executor: ActionExecutor,
    refresher: AutoRefresher,
    state: watch::Sender<ConnectionState>,
    lifecycle: Mutex<Lifecycle>,
    identifier: Mutex<Option<String>>,
    updating: AtomicBool,
}

/// Handles of the most recent connect and disconnect tasks.
struct Lifecycle {
    connect: TaskHandle,
    disconnect: TaskHandle,
    cancel: CancellationToken,
}

enum ConnectAbort {
    Cancelled,
    Failed(DeviceError),
}

impl<T: Transport, H: DeviceHooks<T::Session>> ConnectionController<T, H> {
    /// Creates a disconnected controller for `device`.
    #[must_use]
    pub fn new(device: Arc<Device<T, H>>) -> Self {
        let emitter = device.emitter().clone();
        let refresher = AutoRefresher::new(
            device.cells().to_vec(),
            device.config().refresh.delay,
            emitter.clone(),
        );
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(ControllerInner {
                device,
                executor: ActionExecutor::new(emitter),
                refresher,
                state,
                lifecycle: Mutex::new(Lifecycle {
                    connect: TaskHandle::completed(),
                    disconnect: TaskHandle::completed(),
                    cancel: CancellationToken::new(),
                }),
                identifier: Mutex::new(None),
                updating: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the controlled device.
    #[must_use]
    pub fn device(&self) -> &Arc<Device<T, H>> {
        &self.inner.device
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Returns the identifier reported while connecting, if connected.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        self.inner.identifier.lock().clone()
    }

    /// Returns the executor for this device's actions.
    #[must_use]
    pub fn executor(&self) -> &ActionExecutor {
        &self.inner.executor
    }

    /// Returns the background refresher.
    #[must_use]
    pub fn refresher(&self) -> &AutoRefresher {
        &self.inner.refresher
    }

    /// Starts connecting.
    ///
    /// Returns `false` without doing anything if a connect or disconnect is
    /// already in progress or the device is connected.
    pub fn begin_connect(&self) -> bool {
        let inner = &self.inner;
        let (cancel, completer) = {
            let mut lifecycle = inner.lifecycle.lock();
            if !lifecycle.connect.is_finished() || !lifecycle.disconnect.is_finished() {
                tracing::debug!(device_id = %inner.id(), "connect rejected, lifecycle busy");
                return false;
            }
            if !inner.state().is_idle() {
                tracing::debug!(device_id = %inner.id(), state = %inner.state(), "connect rejected");
                return false;
            }

            let (completer, handle) = TaskHandle::pending();
            lifecycle.connect = handle;
            lifecycle.cancel = CancellationToken::new();
            inner.set_state(ConnectionState::Initializing);
            (lifecycle.cancel.clone(), completer)
        };

        tracing::info!(
            device_id = %inner.id(),
            name = %inner.device.name(),
            address = %inner.device.config().address,
            "connecting"
        );

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let outcome = inner.run_connect(cancel).await;
            completer.complete(outcome);
        });
        true
    }

    /// Returns a handle for the running connect attempt, or a completed
    /// handle if none is running.
    #[must_use]
    pub fn await_connect(&self) -> TaskHandle {
        self.inner.lifecycle.lock().connect.clone()
    }

    /// Starts disconnecting.
    ///
    /// A connect attempt that is still running is cancelled and tears itself
    /// down. Returns `false` without doing anything if the device is neither
    /// connected nor connecting, or a disconnect was already requested.
    pub fn begin_disconnect(&self) -> bool {
        let inner = &self.inner;
        let (connect, completer) = {
            let mut lifecycle = inner.lifecycle.lock();
            if !lifecycle.disconnect.is_finished() {
                tracing::debug!(device_id = %inner.id(), "disconnect already requested");
                return false;
            }
            if lifecycle.connect.is_finished() && inner.state().is_idle() {
                tracing::debug!(device_id = %inner.id(), "disconnect rejected, not connected");
                return false;
            }

            let (completer, handle) = TaskHandle::pending();
            lifecycle.disconnect = handle;
            lifecycle.cancel.cancel();
            (lifecycle.connect.clone(), completer)
        };

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            connect.wait().await;
            inner.run_disconnect().await;
            completer.complete(TaskOutcome::Succeeded);
        });
        true
    }

    /// Returns a handle for the running disconnect, or a completed handle if
    /// none is running.
    #[must_use]
    pub fn await_disconnect(&self) -> TaskHandle {
        self.inner.lifecycle.lock().disconnect.clone()
    }

    /// Reads every readable property once, in registration order.
    ///
    /// Returns immediately if an update is already running. A property that
    /// fails to read is reported through a `GetterFailed` event and does not
    /// stop the update.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the device is not connected.
    pub async fn update_all(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_connected()?;

        if inner.updating.swap(true, Ordering::AcqRel) {
            tracing::debug!(device_id = %inner.id(), "update already running");
            return Ok(());
        }
        let _updating = UpdateGuard(&inner.updating);

        for cell in inner.device.cells().iter().filter(|c| c.access().can_get()) {
            cell.request_get_refresh();
            let outcome = cell.await_get_refresh().wait().await;
            if let Some(error) = outcome.error() {
                tracing::debug!(device_id = %inner.id(), cell = %cell.name(), %error, "update skipped property");
            }
        }
        Ok(())
    }

    /// Runs the device's reset hook.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the device is not connected and
    /// `Error::Device` if the reset failed.
    pub async fn reset(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_connected()?;

        if let Err(source) = inner.device.hooks().reset(inner.device.session()).await {
            let error = inner.attribute(source);
            tracing::warn!(device_id = %inner.id(), error = %error, "reset failed");
            inner.emit(|id| DeviceEvent::exception(id, error.to_string()));
            return Err(error);
        }

        tracing::info!(device_id = %inner.id(), "device reset");
        Ok(())
    }

    /// Starts the device action named `name` through the executor.
    ///
    /// Returns `false` if there is no such action or it could not start.
    pub fn begin_action(&self, name: &str) -> bool {
        match self.inner.device.action(name) {
            Some(action) => self.inner.executor.begin_execute(action),
            None => {
                tracing::warn!(device_id = %self.inner.id(), action = %name, "unknown action");
                false
            }
        }
    }
}

impl<T: Transport, H: DeviceHooks<T::Session>> ControllerInner<T, H> {
    fn id(&self) -> DeviceId {
        self.device.id()
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(device_id = %self.id(), from = %previous, to = %state, "state changed");
            self.emit(|id| DeviceEvent::state_changed(id, state));
        }
    }

    fn emit(&self, make: impl FnOnce(DeviceId) -> DeviceEvent) {
        self.device.emitter().emit(make);
    }

    fn attribute(&self, source: DeviceError) -> Error {
        Error::device(self.id(), self.device.name(), source)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.state().is_connected() && self.device.session().is_open() {
            Ok(())
        } else {
            Err(Error::NotConnected {
                device: self.id(),
                name: self.device.name().to_string(),
            })
        }
    }

    async fn run_connect(&self, cancel: CancellationToken) -> TaskOutcome {
        match self.connect_sequence(&cancel).await {
            Ok(identifier) => {
                if self.device.config().refresh.enabled {
                    self.refresher.start();
                }
                *self.identifier.lock() = Some(identifier.clone());
                self.set_state(ConnectionState::Connected);
                tracing::info!(device_id = %self.id(), %identifier, "connected");
                self.emit(|id| DeviceEvent::connected(id, identifier));
                TaskOutcome::Succeeded
            }
            Err(ConnectAbort::Cancelled) => {
                tracing::info!(device_id = %self.id(), "connect cancelled");
                self.teardown().await;
                self.set_state(ConnectionState::Disconnected);
                self.emit(DeviceEvent::disconnected);
                TaskOutcome::Cancelled
            }
            Err(ConnectAbort::Failed(source)) => {
                let message = self.attribute(source).to_string();
                tracing::warn!(device_id = %self.id(), error = %message, "connect failed");
                self.emit(|id| DeviceEvent::exception(id, &message));
                self.teardown().await;
                self.set_state(ConnectionState::DisconnectedWithError);
                self.emit(|id| DeviceEvent::disconnected_with_error(id, &message));
                TaskOutcome::Failed(message)
            }
        }
    }

    /// Opens the session and prepares the device, returning its identifier.
    ///
    /// Cancellation is observed while opening and while preparing, never
    /// while the opened session is being installed: once a session exists
    /// it is always handed to the session handle so teardown closes it.
    async fn connect_sequence(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ConnectAbort> {
        let config = self.device.config();
        let session = self.device.session();

        let opening = tokio::time::timeout(
            config.open_timeout,
            self.device.transport().open(&config.address, config.open_timeout),
        );
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ConnectAbort::Cancelled),
            opened = opening => match opened {
                Ok(Ok(opened)) => Ok(opened),
                Ok(Err(e)) => Err(ConnectAbort::Failed(e.into())),
                Err(_) => Err(ConnectAbort::Failed(
                    SessionError::Timeout {
                        millis: u64::try_from(config.open_timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                    .into(),
                )),
            },
        }?;

        if let Some(mut stale) = session.install(opened).await
            && let Err(e) = stale.close().await
        {
            tracing::warn!(device_id = %self.id(), error = %e, "closing stale session failed");
        }
        tracing::debug!(device_id = %self.id(), "session opened");

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ConnectAbort::Cancelled),
            prepared = self.prepare() => prepared.map_err(ConnectAbort::Failed),
        }
    }

    /// Runs the initialization hooks and primes every readable property.
    async fn prepare(&self) -> std::result::Result<String, DeviceError> {
        let session = self.device.session();

        self.device
            .hooks()
            .initialize(session)
            .await
            .map_err(|e| hook_failure(e, DeviceError::Initialize))?;
        let identifier = self
            .device
            .hooks()
            .identify(session)
            .await
            .map_err(|e| hook_failure(e, DeviceError::Identify))?;
        tracing::debug!(device_id = %self.id(), %identifier, "device identified");

        for cell in self.device.cells().iter().filter(|c| c.access().can_get()) {
            cell.request_get_refresh();
            let outcome = cell.await_get_refresh().wait().await;
            if !outcome.is_success() {
                return Err(DeviceError::Property {
                    name: cell.name().to_string(),
                    message: outcome.error().unwrap_or("read was cancelled").to_string(),
                });
            }
        }

        Ok(identifier)
    }

    async fn run_disconnect(&self) {
        // A connect attempt that did not reach Connected has torn down already
        if !self.state().is_connected() {
            return;
        }

        self.set_state(ConnectionState::DeInitializing);
        tracing::info!(device_id = %self.id(), "disconnecting");
        self.teardown().await;
        self.set_state(ConnectionState::Disconnected);
        self.emit(DeviceEvent::disconnected);
        tracing::info!(device_id = %self.id(), "disconnected");
    }

    /// Stops background work, drains pending operations and closes the
    /// session.
    async fn teardown(&self) {
        self.refresher.stop().await;
        self.executor.await_all().await;

        // Writes first: a finished write may queue a refresh read
        let cells = self.device.cells();
        let writes: Vec<TaskHandle> = cells.iter().map(|c| c.await_set_processing()).collect();
        TaskHandle::wait_all(&writes).await;
        let reads: Vec<TaskHandle> = cells.iter().map(|c| c.await_get_refresh()).collect();
        TaskHandle::wait_all(&reads).await;

        let session = self.device.session();
        if session.is_open()
            && let Err(e) = self.device.hooks().de_initialize(session).await
        {
            tracing::warn!(device_id = %self.id(), error = %e, "de-initialize failed");
        }

        if let Some(mut opened) = session.take().await {
            match opened.close().await {
                Ok(()) => tracing::debug!(device_id = %self.id(), "session closed"),
                Err(e) => tracing::warn!(device_id = %self.id(), error = %e, "closing session failed"),
            }
        }
        *self.identifier.lock() = None;
    }
}

impl<T: Transport, H: DeviceHooks<T::Session>> Drop for ControllerInner<T, H> {
    fn drop(&mut self) {
        self.lifecycle.get_mut().cancel.cancel();

        let session = self.device.session().clone();
        if session.is_open()
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            let device_id = self.id();
            runtime.spawn(async move {
                if let Some(mut opened) = session.take().await
                    && let Err(e) = opened.close().await
                {
                    tracing::warn!(%device_id, error = %e, "closing session on drop failed");
                }
            });
        }
    }
}

/// Files a hook failure under the lifecycle step it interrupted.
fn hook_failure(error: DeviceError, step: fn(String) -> DeviceError) -> DeviceError {
    match error {
        DeviceError::Initialize(_) | DeviceError::Identify(_) => error,
        other => step(other.to_string()),
    }
}

/// Clears the update flag on every exit path.
struct UpdateGuard<'a>(&'a AtomicBool);

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Transport, H: DeviceHooks<T::Session>> Clone for ConnectionController<T, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport, H: DeviceHooks<T::Session>> std::fmt::Debug for ConnectionController<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionController")
            .field("device", &self.inner.device)
            .field("state", &self.inner.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::device::{DeviceBuilder, DeviceConfig};
    use crate::session::SessionHandle;

    /// Counts closes; replies "1" to every read.
    struct Probe(Arc<AtomicUsize>);

    impl Session for Probe {
        async fn write(&mut self, _message: &str) -> std::result::Result<(), SessionError> {
            Ok(())
        }

        async fn read(&mut self) -> std::result::Result<String, SessionError> {
            Ok("1".to_string())
        }

        async fn close(&mut self) -> std::result::Result<(), SessionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    type OnOpen = Arc<Mutex<Option<Box<dyn Fn() + Send + Sync>>>>;

    struct ProbeTransport {
        closes: Arc<AtomicUsize>,
        delay: Duration,
        on_open: OnOpen,
    }

    impl Transport for ProbeTransport {
        type Session = Probe;

        async fn open(
            &self,
            _address: &str,
            _timeout: Duration,
        ) -> std::result::Result<Probe, SessionError> {
            tokio::time::sleep(self.delay).await;
            if let Some(callback) = self.on_open.lock().as_ref() {
                callback();
            }
            Ok(Probe(Arc::clone(&self.closes)))
        }
    }

    fn transport(delay: Duration) -> (ProbeTransport, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = ProbeTransport {
            closes: Arc::clone(&closes),
            delay,
            on_open: Arc::new(Mutex::new(None)),
        };
        (transport, closes)
    }

    fn controller(delay: Duration) -> (ConnectionController<ProbeTransport>, Arc<AtomicUsize>) {
        let (transport, closes) = transport(delay);
        let device = DeviceBuilder::new(transport, DeviceConfig::new("TCPIP0::probe::INSTR"))
            .build()
            .unwrap();
        (ConnectionController::new(Arc::new(device)), closes)
    }

    /// Identification always fails with a transport error.
    struct Mute;

    impl DeviceHooks<Probe> for Mute {
        async fn identify(
            &self,
            _session: &SessionHandle<Probe>,
        ) -> std::result::Result<String, DeviceError> {
            Err(SessionError::Protocol("no reply to *IDN?".to_string()).into())
        }
    }

    #[tokio::test]
    async fn connect_then_disconnect() {
        let (controller, closes) = controller(Duration::ZERO);
        let mut states = controller.watch_state();

        assert!(controller.begin_connect());
        assert!(controller.await_connect().wait().await.is_success());
        assert_eq!(controller.state(), ConnectionState::Connected);
        assert_eq!(controller.identifier().as_deref(), Some(""));
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

        assert!(controller.begin_disconnect());
        controller.await_disconnect().wait().await;
        assert_eq!(controller.state(), ConnectionState::Disconnected);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(controller.identifier(), None);
    }

    #[tokio::test]
    async fn second_connect_is_rejected_while_connecting() {
        let (controller, _closes) = controller(Duration::from_millis(20));

        assert!(controller.begin_connect());
        assert!(!controller.begin_connect());
        controller.await_connect().wait().await;
        assert!(!controller.begin_connect());
    }

    #[tokio::test]
    async fn disconnect_when_idle_is_rejected() {
        let (controller, closes) = controller(Duration::ZERO);

        assert!(!controller.begin_disconnect());
        assert!(controller.await_disconnect().is_finished());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_disconnect_is_rejected() {
        let (controller, closes) = controller(Duration::ZERO);
        controller.begin_connect();
        controller.await_connect().wait().await;

        assert!(controller.begin_disconnect());
        assert!(!controller.begin_disconnect());
        controller.await_disconnect().wait().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn controller_can_reconnect() {
        let (controller, closes) = controller(Duration::ZERO);

        for _ in 0..2 {
            assert!(controller.begin_connect());
            controller.await_connect().wait().await;
            assert!(controller.begin_disconnect());
            controller.await_disconnect().wait().await;
        }
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn open_timeout_fails_connect() {
        let (transport, closes) = transport(Duration::from_secs(60));
        let device = DeviceBuilder::new(
            transport,
            DeviceConfig::new("slow").with_open_timeout(Duration::from_millis(10)),
        )
        .build()
        .unwrap();
        let controller = ConnectionController::new(Arc::new(device));

        controller.begin_connect();
        let outcome = controller.await_connect().wait().await;

        assert!(outcome.error().is_some_and(|e| e.contains("timed out")));
        assert_eq!(controller.state(), ConnectionState::DisconnectedWithError);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disconnect_requested_as_session_opens_closes_it_once() {
        let (transport, closes) = transport(Duration::ZERO);
        let on_open = Arc::clone(&transport.on_open);
        let device = DeviceBuilder::new(transport, DeviceConfig::new("TCPIP0::probe::INSTR"))
            .build()
            .unwrap();
        let controller = ConnectionController::new(Arc::new(device));
        *on_open.lock() = Some(Box::new({
            let controller = controller.clone();
            move || {
                controller.begin_disconnect();
            }
        }));

        assert!(controller.begin_connect());
        let outcome = controller.await_connect().wait().await;
        controller.await_disconnect().wait().await;
        // Break the controller -> transport -> callback cycle
        on_open.lock().take();

        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert_eq!(controller.state(), ConnectionState::Disconnected);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!controller.device().session().is_open());
    }

    #[tokio::test]
    async fn identify_failure_is_reported_as_such() {
        let (transport, closes) = transport(Duration::ZERO);
        let device = DeviceBuilder::new(transport, DeviceConfig::new("TCPIP0::probe::INSTR"))
            .with_hooks(Mute)
            .build()
            .unwrap();
        let controller = ConnectionController::new(Arc::new(device));

        controller.begin_connect();
        let outcome = controller.await_connect().wait().await;

        let message = outcome.error().unwrap();
        assert!(message.contains("identification failed"));
        assert!(message.contains("no reply to *IDN?"));
        assert_eq!(controller.state(), ConnectionState::DisconnectedWithError);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn operations_require_connection() {
        let (controller, _closes) = controller(Duration::ZERO);

        assert!(matches!(
            controller.update_all().await,
            Err(Error::NotConnected { .. })
        ));
        assert!(matches!(
            controller.reset().await,
            Err(Error::NotConnected { .. })
        ));
        assert!(!controller.begin_action("missing"));
    }
}
