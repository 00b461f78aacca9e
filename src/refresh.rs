// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background polling of device properties.
//!
//! While a device is connected, an [`AutoRefresher`] keeps every readable
//! property current by reading them one after another, pausing for a short
//! delay between passes. One property failing to read is reported through an
//! `AutoUpdateException` event and never stops the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cell::Refreshable;
use crate::event::{DeviceEvent, EventEmitter};

/// Default pause between two refresh passes.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(10);

/// Whether and how fast a connected device is polled.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use instrument_lib::refresh::RefreshPolicy;
///
/// let policy = RefreshPolicy::default().with_delay(Duration::from_millis(250));
/// assert!(policy.enabled);
/// assert_eq!(policy.delay, Duration::from_millis(250));
///
/// assert!(!RefreshPolicy::disabled().enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshPolicy {
    /// Start polling once the device is connected.
    pub enabled: bool,
    /// Pause between two passes over all properties.
    pub delay: Duration,
}

impl RefreshPolicy {
    /// A policy that never polls.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the pause between passes.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: DEFAULT_REFRESH_DELAY,
        }
    }
}

/// Periodically refreshes a fixed set of properties.
///
/// Within one pass the properties are read in the order they were given, one
/// at a time, so at most one refresh is in flight across the whole set.
/// Stopping cancels the inter-pass delay and any wait for a read; a read that
/// already reached the instrument finishes on its own and can be awaited
/// through its cell.
pub struct AutoRefresher {
    cells: Arc<[Arc<dyn Refreshable>]>,
    delay: Duration,
    emitter: EventEmitter,
    cycles: Arc<AtomicU64>,
    running: Mutex<Option<RefreshLoop>>,
}

struct RefreshLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AutoRefresher {
    /// Creates a stopped refresher over `cells`.
    #[must_use]
    pub fn new(cells: Vec<Arc<dyn Refreshable>>, delay: Duration, emitter: EventEmitter) -> Self {
        Self {
            cells: cells.into(),
            delay,
            emitter,
            cycles: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    /// Returns the pause between passes.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns the number of completed passes since creation.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Returns `true` while the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Starts the refresh loop.
    ///
    /// Returns `false` without doing anything if the loop is already running
    /// or there are no properties to refresh.
    pub fn start(&self) -> bool {
        if self.cells.is_empty() {
            tracing::debug!(device_id = %self.emitter.device_id(), "nothing to refresh");
            return false;
        }

        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            tracing::debug!(device_id = %self.emitter.device_id(), "auto-refresh already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(refresh_loop(
            Arc::clone(&self.cells),
            self.delay,
            self.emitter.clone(),
            Arc::clone(&self.cycles),
            cancel.clone(),
        ));
        *running = Some(RefreshLoop { cancel, task });

        tracing::debug!(
            device_id = %self.emitter.device_id(),
            cells = self.cells.len(),
            delay_ms = self.delay.as_millis(),
            "auto-refresh started"
        );
        true
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// Safe to call when the loop was never started and safe to call twice.
    pub async fn stop(&self) {
        let Some(RefreshLoop { cancel, task }) = self.running.lock().take() else {
            return;
        };

        cancel.cancel();
        if let Err(e) = task.await
            && e.is_panic()
        {
            tracing::warn!(
                device_id = %self.emitter.device_id(),
                error = %e,
                "auto-refresh loop panicked"
            );
        }
        tracing::debug!(device_id = %self.emitter.device_id(), "auto-refresh stopped");
    }
}

impl Drop for AutoRefresher {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for AutoRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoRefresher")
            .field("cells", &self.cells.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("delay", &self.delay)
            .field("cycles", &self.cycles())
            .finish_non_exhaustive()
    }
}

async fn refresh_loop(
    cells: Arc<[Arc<dyn Refreshable>]>,
    delay: Duration,
    emitter: EventEmitter,
    cycles: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    loop {
        for cell in cells.iter().filter(|c| c.access().can_get()) {
            cell.request_get_refresh();
            let read = cell.await_get_refresh();
            let outcome = tokio::select! {
                () = cancel.cancelled() => return,
                outcome = read.wait() => outcome,
            };

            if let Some(error) = outcome.error() {
                tracing::warn!(
                    device_id = %emitter.device_id(),
                    cell = %cell.name(),
                    error = %error,
                    "auto-refresh read failed"
                );
                emitter.emit(|id| DeviceEvent::auto_update_exception(id, cell.name(), error));
            }
        }

        let cycle = cycles.fetch_add(1, Ordering::AcqRel) + 1;
        emitter.emit(|id| DeviceEvent::auto_update_cycle(id, cycle));

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::broadcast;

    use super::*;
    use crate::cell::AsyncCell;
    use crate::error::DeviceError;
    use crate::event::{DeviceId, EventBus};

    fn emitter() -> (EventEmitter, broadcast::Receiver<DeviceEvent>) {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        (EventEmitter::new(DeviceId::new(), bus), rx)
    }

    fn counting_cell(name: &str, emitter: &EventEmitter, reads: &Arc<AtomicUsize>) -> Arc<dyn Refreshable> {
        let reads = Arc::clone(reads);
        Arc::new(
            AsyncCell::<u32>::builder(name)
                .getter(move || {
                    let n = reads.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(u32::try_from(n).unwrap_or(u32::MAX)) }
                })
                .build(emitter)
                .unwrap(),
        )
    }

    fn failing_cell(name: &str, emitter: &EventEmitter) -> Arc<dyn Refreshable> {
        Arc::new(
            AsyncCell::<u32>::builder(name)
                .getter(|| async { Err(DeviceError::Failed("no reply".into())) })
                .build(emitter)
                .unwrap(),
        )
    }

    async fn wait_for_cycles(refresher: &AutoRefresher, cycles: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while refresher.cycles() < cycles {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failing_cell_does_not_stop_the_loop() {
        let (emitter, mut events) = emitter();
        let reads = Arc::new(AtomicUsize::new(0));
        let refresher = AutoRefresher::new(
            vec![failing_cell("a", &emitter), counting_cell("b", &emitter, &reads)],
            Duration::from_millis(1),
            emitter,
        );

        assert!(refresher.start());
        wait_for_cycles(&refresher, 3).await;

        assert!(refresher.is_running());
        assert!(reads.load(Ordering::SeqCst) >= 3);

        refresher.stop().await;
        assert!(!refresher.is_running());

        let exceptions: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|e| match e {
                DeviceEvent::AutoUpdateException { cell, .. } => Some(cell),
                _ => None,
            })
            .collect();
        assert!(exceptions.len() >= 3);
        assert!(exceptions.iter().all(|cell| cell == "a"));
    }

    #[tokio::test]
    async fn start_without_cells_is_a_no_op() {
        let (emitter, _events) = emitter();
        let refresher = AutoRefresher::new(Vec::new(), DEFAULT_REFRESH_DELAY, emitter);

        assert!(!refresher.start());
        assert!(!refresher.is_running());
    }

    #[tokio::test]
    async fn start_twice_runs_one_loop() {
        let (emitter, _events) = emitter();
        let reads = Arc::new(AtomicUsize::new(0));
        let refresher = AutoRefresher::new(
            vec![counting_cell("voltage", &emitter, &reads)],
            Duration::from_millis(1),
            emitter,
        );

        assert!(refresher.start());
        assert!(!refresher.start());
        refresher.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (emitter, _events) = emitter();
        let reads = Arc::new(AtomicUsize::new(0));
        let refresher = AutoRefresher::new(
            vec![counting_cell("voltage", &emitter, &reads)],
            DEFAULT_REFRESH_DELAY,
            emitter,
        );

        refresher.stop().await;
        refresher.start();
        refresher.stop().await;
        refresher.stop().await;
        assert!(!refresher.is_running());
    }

    #[tokio::test]
    async fn stop_interrupts_a_long_delay() {
        let (emitter, _events) = emitter();
        let reads = Arc::new(AtomicUsize::new(0));
        let refresher = AutoRefresher::new(
            vec![counting_cell("voltage", &emitter, &reads)],
            Duration::from_secs(3600),
            emitter,
        );

        refresher.start();
        wait_for_cycles(&refresher, 1).await;

        tokio::time::timeout(Duration::from_secs(1), refresher.stop())
            .await
            .unwrap();
        assert_eq!(refresher.cycles(), 1);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cycle_events_are_numbered() {
        let (emitter, mut events) = emitter();
        let reads = Arc::new(AtomicUsize::new(0));
        let refresher = AutoRefresher::new(
            vec![counting_cell("voltage", &emitter, &reads)],
            Duration::from_millis(1),
            emitter,
        );

        refresher.start();
        wait_for_cycles(&refresher, 2).await;
        refresher.stop().await;

        let cycles: Vec<u64> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|e| match e {
                DeviceEvent::AutoUpdateCycle { cycle, .. } => Some(cycle),
                _ => None,
            })
            .collect();
        assert_eq!(&cycles[..2], &[1, 2]);
    }

    #[test]
    fn policy_round_trips_through_json() {
        let policy = RefreshPolicy::default().with_delay(Duration::from_millis(50));
        let json = serde_json::to_string(&policy).unwrap();
        let back: RefreshPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);

        let partial: RefreshPolicy = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
        assert_eq!(partial.delay, DEFAULT_REFRESH_DELAY);
    }
}
