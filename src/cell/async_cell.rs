// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-flight asynchronous property cell.

use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{Access, DisplayCodec, Refreshable};
use crate::error::{DeviceError, Error};
use crate::event::{DeviceEvent, DeviceId, EventEmitter};
use crate::task::{TaskHandle, TaskOutcome};

/// Reads a property value from the instrument.
pub type Getter<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, DeviceError>> + Send + Sync>;

/// Writes a property value to the instrument.
pub type Setter<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<(), DeviceError>> + Send + Sync>;

/// A named, asynchronously readable and writable device property.
///
/// Cloning a cell is cheap and every clone refers to the same property.
/// See the [module documentation](super) for the concurrency guarantees.
pub struct AsyncCell<T> {
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    name: String,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
    codec: Option<DisplayCodec<T>>,
    auto_refresh_after_set: bool,
    value: watch::Sender<Option<T>>,
    tasks: Mutex<InFlight<T>>,
    emitter: EventEmitter,
}

/// In-flight bookkeeping, always mutated under the cell's lock.
struct InFlight<T> {
    get: TaskHandle,
    set: TaskHandle,
    /// Bumped on every write so the newest write owns the staging value.
    set_generation: u64,
    staged: Option<T>,
}

impl<T> AsyncCell<T>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    /// Starts building a cell with the given name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CellBuilder<T> {
        CellBuilder::new(name)
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the device this cell reports events for.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.inner.emitter.device_id()
    }

    /// Returns the supported directions.
    #[must_use]
    pub fn access(&self) -> Access {
        match (self.inner.getter.is_some(), self.inner.setter.is_some()) {
            (true, true) => Access::ReadWrite,
            (false, true) => Access::WriteOnly,
            _ => Access::ReadOnly,
        }
    }

    /// Returns `true` if the property can be read.
    #[must_use]
    pub fn can_get(&self) -> bool {
        self.inner.getter.is_some()
    }

    /// Returns `true` if the property can be written.
    #[must_use]
    pub fn can_set(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Returns `true` if every successful write is followed by a read.
    #[must_use]
    pub fn auto_refresh_after_set(&self) -> bool {
        self.inner.auto_refresh_after_set
    }

    /// Returns the last value read from the instrument.
    ///
    /// Write-only cells never read, so they return `None` unless an initial
    /// value was configured.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Returns the value of the newest write that has not finished yet.
    #[must_use]
    pub fn staged_value(&self) -> Option<T> {
        self.inner.tasks.lock().staged.clone()
    }

    /// Subscribes to changes of the last known value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.inner.value.subscribe()
    }

    /// Returns the last known value rendered for display.
    ///
    /// Uses the cell's [`DisplayCodec`] if one was configured, the `Debug`
    /// rendering otherwise.
    #[must_use]
    pub fn display_value(&self) -> Option<String> {
        self.inner.value.borrow().as_ref().map(|v| self.inner.render(v))
    }

    /// Starts a read unless one is already in flight.
    ///
    /// The outcome is reported through `GetterUpdated` / `GetterFailed`
    /// events; a failed read leaves the last known value unchanged.
    pub fn request_get_refresh(&self) {
        self.inner.request_get();
    }

    /// Returns a handle for the current or most recently started read.
    #[must_use]
    pub fn await_get_refresh(&self) -> TaskHandle {
        self.inner.tasks.lock().get.clone()
    }

    /// Queues a write of `value`.
    ///
    /// Each call is honored in call order; a write waits for the previous
    /// write of this cell before its setter runs. Writes to a read-only cell
    /// are ignored. The outcome is reported through `SetterCompleted` /
    /// `SetterFailed` events.
    pub fn write(&self, value: T) {
        self.inner.write(value);
    }

    /// Parses `text` with the cell's codec and queues a write.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::NotWritable` for read-only cells and
    /// `DeviceError::Parse` if the text cannot be converted (or no codec was
    /// configured). Failures of the write itself are reported as events.
    pub fn write_display(&self, text: &str) -> Result<(), DeviceError> {
        if !self.can_set() {
            return Err(DeviceError::NotWritable(self.inner.name.clone()));
        }
        let codec = self.inner.codec.as_ref().ok_or_else(|| {
            DeviceError::Parse(format!("property '{}' has no display codec", self.inner.name))
        })?;
        let value = codec.from_display(text)?;
        self.write(value);
        Ok(())
    }

    /// Returns a handle that completes once every queued write has finished.
    #[must_use]
    pub fn await_set_processing(&self) -> TaskHandle {
        self.inner.tasks.lock().set.clone()
    }
}

impl<T> CellInner<T>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    fn render(&self, value: &T) -> String {
        match &self.codec {
            Some(codec) => codec.to_display(value),
            None => format!("{value:?}"),
        }
    }

    fn panicked(&self, delegate: &str) -> DeviceError {
        DeviceError::Property {
            name: self.name.clone(),
            message: format!("{delegate} panicked"),
        }
    }

    fn request_get(self: &Arc<Self>) {
        if self.getter.is_none() {
            return;
        }
        let mut tasks = self.tasks.lock();
        if !tasks.get.is_finished() {
            tracing::trace!(cell = %self.name, "read already in flight");
            return;
        }
        let (completer, handle) = TaskHandle::pending();
        tasks.get = handle;
        drop(tasks);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = inner.run_get().await;
            completer.complete(outcome);
        });
    }

    /// Requests a read that observes a write which just completed.
    ///
    /// A read already in flight may have sampled the instrument before the
    /// write landed, so the fresh read is queued behind it instead of being
    /// dropped.
    fn request_get_after_write(self: &Arc<Self>) {
        if self.getter.is_none() {
            return;
        }
        let mut tasks = self.tasks.lock();
        let running = tasks.get.clone();
        let (completer, handle) = TaskHandle::pending();
        tasks.get = handle;
        drop(tasks);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            running.wait().await;
            let outcome = inner.run_get().await;
            completer.complete(outcome);
        });
    }

    async fn run_get(&self) -> TaskOutcome {
        let Some(getter) = &self.getter else {
            return TaskOutcome::Succeeded;
        };
        let read = AssertUnwindSafe(async { getter().await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(self.panicked("getter")));
        match read {
            Ok(value) => {
                let rendered = self.render(&value);
                tracing::trace!(cell = %self.name, value = %rendered, "property read");
                self.value.send_replace(Some(value));
                self.emitter
                    .emit(|id| DeviceEvent::getter_updated(id, &self.name, rendered));
                TaskOutcome::Succeeded
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    device_id = %self.emitter.device_id(),
                    cell = %self.name,
                    error = %message,
                    "property read failed"
                );
                self.emitter
                    .emit(|id| DeviceEvent::getter_failed(id, &self.name, &message));
                TaskOutcome::Failed(message)
            }
        }
    }

    fn write(self: &Arc<Self>, value: T) {
        let Some(setter) = self.setter.clone() else {
            tracing::debug!(cell = %self.name, "ignoring write to read-only property");
            return;
        };

        let (completer, handle) = TaskHandle::pending();
        let (previous, generation) = {
            let mut tasks = self.tasks.lock();
            tasks.set_generation += 1;
            tasks.staged = Some(value.clone());
            (
                std::mem::replace(&mut tasks.set, handle),
                tasks.set_generation,
            )
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            previous.wait().await;
            let outcome = inner.run_set(&setter, value).await;
            {
                let mut tasks = inner.tasks.lock();
                if tasks.set_generation == generation {
                    tasks.staged = None;
                }
            }
            completer.complete(outcome);
        });
    }

    async fn run_set(self: &Arc<Self>, setter: &Setter<T>, value: T) -> TaskOutcome {
        tracing::trace!(cell = %self.name, ?value, "writing property");
        let written = AssertUnwindSafe(async move { setter(value).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(self.panicked("setter")));
        match written {
            Ok(()) => {
                self.emitter
                    .emit(|id| DeviceEvent::setter_completed(id, &self.name));
                if self.auto_refresh_after_set {
                    self.request_get_after_write();
                }
                TaskOutcome::Succeeded
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    device_id = %self.emitter.device_id(),
                    cell = %self.name,
                    error = %message,
                    "property write failed"
                );
                self.emitter
                    .emit(|id| DeviceEvent::setter_failed(id, &self.name, &message));
                TaskOutcome::Failed(message)
            }
        }
    }
}

impl<T> Refreshable for AsyncCell<T>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        AsyncCell::name(self)
    }

    fn device_id(&self) -> DeviceId {
        AsyncCell::device_id(self)
    }

    fn access(&self) -> Access {
        AsyncCell::access(self)
    }

    fn request_get_refresh(&self) {
        AsyncCell::request_get_refresh(self);
    }

    fn await_get_refresh(&self) -> TaskHandle {
        AsyncCell::await_get_refresh(self)
    }

    fn await_set_processing(&self) -> TaskHandle {
        AsyncCell::await_set_processing(self)
    }

    fn display_value(&self) -> Option<String> {
        AsyncCell::display_value(self)
    }
}

impl<T> Clone for AsyncCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for AsyncCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCell")
            .field("name", &self.inner.name)
            .field("value", &*self.inner.value.borrow())
            .field("auto_refresh_after_set", &self.inner.auto_refresh_after_set)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AsyncCell`].
///
/// A cell needs at least a getter or a setter; which ones are present decides
/// its [`Access`].
pub struct CellBuilder<T> {
    name: String,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
    codec: Option<DisplayCodec<T>>,
    auto_refresh_after_set: bool,
    initial: Option<T>,
}

impl<T> CellBuilder<T>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    /// Creates a builder for a cell named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            getter: None,
            setter: None,
            codec: None,
            auto_refresh_after_set: false,
            initial: None,
        }
    }

    /// Sets the read delegate.
    #[must_use]
    pub fn getter<F, Fut>(mut self, getter: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DeviceError>> + Send + 'static,
    {
        self.getter = Some(Arc::new(move || getter().boxed()));
        self
    }

    /// Sets the write delegate.
    #[must_use]
    pub fn setter<F, Fut>(mut self, setter: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeviceError>> + Send + 'static,
    {
        self.setter = Some(Arc::new(move |value| setter(value).boxed()));
        self
    }

    /// Requests a read after every successful write.
    #[must_use]
    pub fn auto_refresh_after_set(mut self, enabled: bool) -> Self {
        self.auto_refresh_after_set = enabled;
        self
    }

    /// Sets the display conversion.
    #[must_use]
    pub fn display(mut self, codec: DisplayCodec<T>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Sets the value reported before the first read.
    #[must_use]
    pub fn initial(mut self, value: T) -> Self {
        self.initial = Some(value);
        self
    }

    /// Builds the cell; its events are published through `emitter`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if the name is empty or neither
    /// a getter nor a setter was given.
    pub fn build(self, emitter: &EventEmitter) -> Result<AsyncCell<T>, Error> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "property name must not be empty".to_string(),
            ));
        }
        if self.getter.is_none() && self.setter.is_none() {
            return Err(Error::InvalidConfiguration(format!(
                "property '{}' has neither a getter nor a setter",
                self.name
            )));
        }

        let (value, _) = watch::channel(self.initial);
        Ok(AsyncCell {
            inner: Arc::new(CellInner {
                name: self.name,
                getter: self.getter,
                setter: self.setter,
                codec: self.codec,
                auto_refresh_after_set: self.auto_refresh_after_set,
                value,
                tasks: Mutex::new(InFlight {
                    get: TaskHandle::completed(),
                    set: TaskHandle::completed(),
                    set_generation: 0,
                    staged: None,
                }),
                emitter: emitter.clone(),
            }),
        })
    }
}

impl<T> Debug for CellBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellBuilder")
            .field("name", &self.name)
            .field("has_getter", &self.getter.is_some())
            .field("has_setter", &self.setter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::event::EventBus;

    fn emitter() -> EventEmitter {
        EventEmitter::new(DeviceId::new(), EventBus::new())
    }

    /// A read-write cell backed by a shared value, counting delegate calls.
    struct Backing {
        value: Arc<Mutex<f64>>,
        reads: Arc<AtomicUsize>,
        writes: Arc<AtomicUsize>,
    }

    impl Backing {
        fn new(initial: f64) -> Self {
            Self {
                value: Arc::new(Mutex::new(initial)),
                reads: Arc::new(AtomicUsize::new(0)),
                writes: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn cell(&self, auto_refresh: bool) -> AsyncCell<f64> {
            let (value, reads) = (Arc::clone(&self.value), Arc::clone(&self.reads));
            let (target, writes) = (Arc::clone(&self.value), Arc::clone(&self.writes));
            AsyncCell::builder("setpoint")
                .getter(move || {
                    let value = Arc::clone(&value);
                    reads.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(*value.lock()) }
                })
                .setter(move |v| {
                    let target = Arc::clone(&target);
                    writes.fetch_add(1, Ordering::SeqCst);
                    async move {
                        *target.lock() = v;
                        Ok(())
                    }
                })
                .auto_refresh_after_set(auto_refresh)
                .display(DisplayCodec::parsed())
                .build(&emitter())
                .unwrap()
        }
    }

    #[tokio::test]
    async fn back_to_back_refreshes_invoke_getter_once() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let cell = {
            let (gate, calls) = (Arc::clone(&gate), Arc::clone(&calls));
            AsyncCell::builder("temperature")
                .getter(move || {
                    let gate = Arc::clone(&gate);
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        gate.notified().await;
                        Ok(20.0_f64)
                    }
                })
                .build(&emitter())
                .unwrap()
        };

        cell.request_get_refresh();
        cell.request_get_refresh();
        tokio::task::yield_now().await;
        gate.notify_one();

        assert!(cell.await_get_refresh().wait().await.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.value(), Some(20.0));
    }

    #[tokio::test]
    async fn failed_read_keeps_last_value_and_signals() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let emitter = EventEmitter::new(DeviceId::new(), bus);
        let cell = AsyncCell::<i32>::builder("pressure")
            .getter(|| async { Err(DeviceError::Failed("sensor unplugged".into())) })
            .initial(7)
            .build(&emitter)
            .unwrap();

        cell.request_get_refresh();
        let outcome = cell.await_get_refresh().wait().await;

        assert_eq!(outcome.error(), Some("sensor unplugged"));
        assert_eq!(cell.value(), Some(7));
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            DeviceEvent::getter_failed(emitter.device_id(), "pressure", "sensor unplugged")
        );
    }

    #[tokio::test]
    async fn read_only_cell_ignores_writes() {
        let cell = AsyncCell::<f64>::builder("temperature")
            .getter(|| async { Ok(20.0) })
            .initial(19.0)
            .build(&emitter())
            .unwrap();

        cell.write(99.0);

        assert_eq!(cell.access(), Access::ReadOnly);
        assert!(cell.await_set_processing().is_finished());
        assert_eq!(cell.value(), Some(19.0));
        assert!(matches!(
            cell.write_display("5"),
            Err(DeviceError::NotWritable(_))
        ));
    }

    #[tokio::test]
    async fn write_only_cell_never_reads() {
        let cell = AsyncCell::<u32>::builder("trigger_count")
            .setter(|_| async { Ok(()) })
            .build(&emitter())
            .unwrap();

        cell.request_get_refresh();

        assert_eq!(cell.access(), Access::WriteOnly);
        assert!(cell.await_get_refresh().is_finished());
        assert_eq!(cell.value(), None);
    }

    #[tokio::test]
    async fn auto_refresh_after_set_reads_once() {
        let backing = Backing::new(20.0);
        let cell = backing.cell(true);

        cell.write(25.0);
        assert!(cell.await_set_processing().wait().await.is_success());
        assert!(cell.await_get_refresh().wait().await.is_success());

        assert_eq!(backing.writes.load(Ordering::SeqCst), 1);
        assert_eq!(backing.reads.load(Ordering::SeqCst), 1);
        assert_eq!(cell.value(), Some(25.0));
    }

    #[tokio::test]
    async fn no_refresh_after_set_when_disabled() {
        let backing = Backing::new(20.0);
        let cell = backing.cell(false);

        cell.write(25.0);
        cell.await_set_processing().wait().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(backing.reads.load(Ordering::SeqCst), 0);
        assert_eq!(cell.value(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn writes_are_applied_in_call_order() {
        let backing = Backing::new(0.0);
        let cell = backing.cell(false);

        for i in 1..=20 {
            cell.write(f64::from(i));
        }
        cell.await_set_processing().wait().await;

        assert_eq!(backing.writes.load(Ordering::SeqCst), 20);
        assert_eq!(*backing.value.lock(), 20.0);
    }

    #[tokio::test]
    async fn staged_value_tracks_newest_pending_write() {
        let backing = Backing::new(0.0);
        let cell = backing.cell(false);

        // Nothing runs on the current-thread runtime until the test yields
        cell.write(1.0);
        cell.write(2.0);
        assert_eq!(cell.staged_value(), Some(2.0));

        cell.await_set_processing().wait().await;
        assert_eq!(cell.staged_value(), None);
    }

    #[tokio::test]
    async fn write_display_parses_with_codec() {
        let backing = Backing::new(0.0);
        let cell = backing.cell(true);

        cell.write_display("12.5").unwrap();
        cell.await_set_processing().wait().await;
        cell.await_get_refresh().wait().await;

        assert_eq!(cell.display_value().as_deref(), Some("12.5"));
        assert!(matches!(
            cell.write_display("warm"),
            Err(DeviceError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn panicking_getter_is_reported_as_failure() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let emitter = EventEmitter::new(DeviceId::new(), bus);
        let cell = AsyncCell::<f64>::builder("humidity")
            .getter(|| async { panic!("driver bug") })
            .initial(40.0)
            .build(&emitter)
            .unwrap();

        cell.request_get_refresh();
        let outcome = cell.await_get_refresh().wait().await;

        let message = "property 'humidity' failed: getter panicked";
        assert_eq!(outcome.error(), Some(message));
        assert_eq!(cell.value(), Some(40.0));
        assert_eq!(
            events.recv().await.unwrap(),
            DeviceEvent::getter_failed(emitter.device_id(), "humidity", message)
        );

        // The cell stays usable
        cell.request_get_refresh();
        assert!(!cell.await_get_refresh().wait().await.is_success());
    }

    #[tokio::test]
    async fn panicking_setter_releases_next_write() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let emitter = EventEmitter::new(DeviceId::new(), bus);
        let applied = Arc::new(Mutex::new(Vec::new()));
        let cell = AsyncCell::<i32>::builder("gain")
            .setter({
                let applied = Arc::clone(&applied);
                move |v| {
                    assert!(v >= 0, "negative gain");
                    applied.lock().push(v);
                    async { Ok(()) }
                }
            })
            .build(&emitter)
            .unwrap();

        cell.write(-1);
        cell.write(3);
        assert!(cell.await_set_processing().wait().await.is_success());

        assert_eq!(*applied.lock(), vec![3]);
        assert_eq!(
            events.recv().await.unwrap(),
            DeviceEvent::setter_failed(
                emitter.device_id(),
                "gain",
                "property 'gain' failed: setter panicked"
            )
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DeviceEvent::setter_completed(emitter.device_id(), "gain")
        );
    }

    #[tokio::test]
    async fn failed_write_signals_and_keeps_value() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let emitter = EventEmitter::new(DeviceId::new(), bus);
        let writes = Arc::new(AtomicUsize::new(0));
        let cell = AsyncCell::<f64>::builder("voltage")
            .getter(|| async { Ok(1.5) })
            .setter({
                let writes = Arc::clone(&writes);
                move |v| {
                    writes.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if v > 10.0 {
                            Err(DeviceError::Failed("over range".into()))
                        } else {
                            Ok(())
                        }
                    }
                }
            })
            .initial(1.5)
            .build(&emitter)
            .unwrap();

        cell.write(50.0);
        let rejected = cell.await_set_processing();
        cell.write(2.0);

        assert_eq!(rejected.wait().await.error(), Some("over range"));
        assert!(cell.await_set_processing().wait().await.is_success());
        assert_eq!(writes.load(Ordering::SeqCst), 2);
        assert_eq!(cell.value(), Some(1.5));
        assert_eq!(
            events.recv().await.unwrap(),
            DeviceEvent::setter_failed(emitter.device_id(), "voltage", "over range")
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DeviceEvent::setter_completed(emitter.device_id(), "voltage")
        );
    }

    #[test]
    fn builder_rejects_cell_without_delegates() {
        let result = AsyncCell::<f64>::builder("orphan").build(&emitter());
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn builder_rejects_empty_name() {
        let result = AsyncCell::<f64>::builder("  ")
            .getter(|| async { Ok(1.0) })
            .build(&emitter());
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }
}
