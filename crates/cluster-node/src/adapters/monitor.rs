//! # Heartbeat Monitor
//!
//! Production `Monitor`: one tokio task per node that sends a heartbeat every
//! `heartbeat_frequency` and publishes the resulting description.
//!
//! ```text
//!   Node ──scan()/run()/stop()──► HeartbeatMonitor ──check()──► Heartbeat
//!                                      │
//!                          watch::Sender<Arc<ServerDescription>>
//!                                      │
//!               current_description() ◄┴► subscribe()
//! ```
//!
//! ## Publication
//!
//! Every scan builds a complete `ServerDescription` and swaps it into a
//! `watch` channel with `send_replace`. Readers clone the `Arc` they find
//! there and never observe a partially updated description.
//!
//! ## Cancellation
//!
//! The loop races each wait and each scan against its shutdown channel, so a
//! stop request interrupts an in-flight heartbeat at its next await point.
//! `stop()` waits at most `monitor_stop_timeout` for the task to finish and
//! aborts it after that. Dropping the monitor drops the shutdown sender,
//! which ends the loop as well.
//!
//! ## Runtime
//!
//! The monitor remembers the tokio runtime it was created or last started
//! on. `run()` and `restart()` spawn through that handle, so they may be
//! called from threads that are not runtime workers.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::NodeOptions;
use crate::domain::{
    Address, NodeError, ServerDescription, WireVersionRange, CLIENT_WIRE_VERSIONS,
};
use crate::events::{EventListeners, NodeEvent};
use crate::ports::{Heartbeat, Monitor};

/// State shared between the monitor handle and its loop task.
struct MonitorState<H> {
    address: Address,
    heartbeat: H,
    options: NodeOptions,
    client_wire_versions: WireVersionRange,
    description: watch::Sender<Arc<ServerDescription>>,
    last_scan: RwLock<Option<(SystemTime, Instant)>>,
    scan_requested: Notify,
    listeners: Arc<EventListeners>,
}

impl<H: Heartbeat> MonitorState<H> {
    async fn scan(&self) -> Result<Arc<ServerDescription>, NodeError> {
        let started = Instant::now();
        self.listeners.publish(NodeEvent::HeartbeatStarted {
            address: self.address.clone(),
        });

        let timeout = self.options.connect_timeout();
        let outcome = match tokio::time::timeout(timeout, self.heartbeat.check(&self.address)).await
        {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout {
                address: self.address.to_string(),
                after: timeout,
            }),
        };
        let duration = started.elapsed();

        let described = match outcome {
            Ok(mut reply) => {
                debug!(address = %self.address, ?duration, "heartbeat succeeded");
                self.listeners.publish(NodeEvent::HeartbeatSucceeded {
                    address: self.address.clone(),
                    duration,
                });
                reply.round_trip_time.get_or_insert(duration);
                ServerDescription::from_reply(self.address.clone(), reply, self.client_wire_versions)
                    .map_err(NodeError::from)
            }
            Err(e) => {
                warn!(address = %self.address, error = %e, "heartbeat failed");
                self.listeners.publish(NodeEvent::HeartbeatFailed {
                    address: self.address.clone(),
                    duration,
                    error: e.clone(),
                });
                Err(e)
            }
        };

        let result = match described {
            Ok(description) => {
                let description = Arc::new(description);
                self.publish(Arc::clone(&description));
                Ok(description)
            }
            Err(e) => {
                self.publish(Arc::new(ServerDescription::unknown_with_error(
                    self.address.clone(),
                    e.to_string(),
                )));
                Err(e)
            }
        };

        // Stamped after publication: a reader seeing this time also sees the
        // description it belongs to.
        *self.last_scan.write() = Some((SystemTime::now(), Instant::now()));
        result
    }

    /// Swap in `description`, notifying listeners when it differs.
    fn publish(&self, description: Arc<ServerDescription>) {
        let previous = self.description.send_replace(Arc::clone(&description));
        if !previous.same_state_as(&description) {
            self.listeners.publish(NodeEvent::DescriptionChanged {
                address: self.address.clone(),
                previous,
                current: description,
            });
        }
    }

    /// Time left before another scan is allowed.
    fn throttle_delay(&self) -> Option<Duration> {
        let (_, at) = (*self.last_scan.read())?;
        self.options
            .min_heartbeat_frequency()
            .checked_sub(at.elapsed())
            .filter(|d| !d.is_zero())
    }
}

async fn run_loop<H: Heartbeat>(state: Arc<MonitorState<H>>, mut shutdown: watch::Receiver<bool>) {
    info!(address = %state.address, "monitor loop started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(state.options.heartbeat_frequency()) => {}
            _ = state.scan_requested.notified() => {}
        }

        if let Some(delay) = state.throttle_delay() {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            result = state.scan() => {
                if let Err(NodeError::Compatibility(e)) = result {
                    error!(address = %state.address, error = %e, "server is no longer compatible");
                }
            }
        }
    }

    info!(address = %state.address, "monitor loop stopped");
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Monitor driving a `Heartbeat` on a fixed period.
pub struct HeartbeatMonitor<H: Heartbeat + 'static> {
    state: Arc<MonitorState<H>>,
    task: Mutex<Option<LoopHandle>>,
    runtime: Mutex<Option<Handle>>,
}

impl<H: Heartbeat + 'static> HeartbeatMonitor<H> {
    /// Create a stopped monitor whose cached description is unknown.
    pub fn new(
        address: Address,
        heartbeat: H,
        options: NodeOptions,
        listeners: Arc<EventListeners>,
    ) -> Self {
        let (description, _) = watch::channel(Arc::new(ServerDescription::unknown(address.clone())));
        Self {
            state: Arc::new(MonitorState {
                address,
                heartbeat,
                options,
                client_wire_versions: CLIENT_WIRE_VERSIONS,
                description,
                last_scan: RwLock::new(None),
                scan_requested: Notify::new(),
                listeners,
            }),
            task: Mutex::new(None),
            runtime: Mutex::new(Handle::try_current().ok()),
        }
    }

    /// Check servers against `range` instead of `CLIENT_WIRE_VERSIONS`.
    ///
    /// Only valid before the monitor is shared.
    #[must_use]
    pub fn with_client_wire_versions(mut self, range: WireVersionRange) -> Self {
        if let Some(state) = Arc::get_mut(&mut self.state) {
            state.client_wire_versions = range;
        }
        self
    }

    pub fn address(&self) -> &Address {
        &self.state.address
    }

    /// Receiver notified on every published description.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ServerDescription>> {
        self.state.description.subscribe()
    }

    /// True while the loop task is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.join.is_finished())
    }

    /// Runtime to spawn the loop on: the caller's if it is inside one,
    /// otherwise the last one seen.
    fn runtime(&self) -> Option<Handle> {
        let mut remembered = self.runtime.lock();
        if let Ok(current) = Handle::try_current() {
            *remembered = Some(current);
        }
        remembered.clone()
    }

    fn spawn_loop(&self) -> Option<LoopHandle> {
        let Some(runtime) = self.runtime() else {
            error!(address = %self.state.address, "no tokio runtime, monitor loop not started");
            return None;
        };
        let (shutdown, receiver) = watch::channel(false);
        let join = runtime.spawn(run_loop(Arc::clone(&self.state), receiver));
        Some(LoopHandle { shutdown, join })
    }
}

#[async_trait]
impl<H: Heartbeat + 'static> Monitor for HeartbeatMonitor<H> {
    async fn scan(&self) -> Result<Arc<ServerDescription>, NodeError> {
        self.state.scan().await
    }

    fn run(&self) {
        let mut task = self.task.lock();
        if task
            .as_ref()
            .is_some_and(|handle| !handle.join.is_finished())
        {
            return;
        }
        *task = self.spawn_loop();
    }

    async fn stop(&self) -> bool {
        let handle = self.task.lock().take();
        let Some(LoopHandle { shutdown, mut join }) = handle else {
            return true;
        };

        // Fails only when the loop already exited.
        let _ = shutdown.send(true);

        let timeout = self.state.options.monitor_stop_timeout();
        match tokio::time::timeout(timeout, &mut join).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    address = %self.state.address,
                    ?timeout,
                    "monitor loop did not stop in time, aborting"
                );
                join.abort();
                false
            }
        }
    }

    fn restart(&self) {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            let _ = previous.shutdown.send(true);
        }
        *task = self.spawn_loop();
    }

    fn current_description(&self) -> Arc<ServerDescription> {
        self.state.description.borrow().clone()
    }

    fn last_scan_time(&self) -> Option<SystemTime> {
        self.state.last_scan.read().map(|(at, _)| at)
    }

    fn heartbeat_frequency(&self) -> Duration {
        self.state.options.heartbeat_frequency()
    }

    fn mark_unknown(&self, reason: &str) {
        self.state.publish(Arc::new(ServerDescription::unknown_with_error(
            self.state.address.clone(),
            reason,
        )));
    }

    fn request_scan(&self) {
        self.state.scan_requested.notify_one();
    }
}

#[cfg(test)]
mod tests;
