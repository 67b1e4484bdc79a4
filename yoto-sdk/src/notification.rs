//! Observer notifications
//!
//! Everything observers learn goes through one queue: state changes,
//! command outcomes and connectivity. Producers push onto an unbounded
//! channel and never wait; a hub task delivers to registered observers and
//! to the broadcast channel behind `Coordinator::notifications`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use yoto_api::DeviceId;
use yoto_dispatch::{Command, CommandStatus, CommandUpdate, FailureReason};
use yoto_state::{PlaybackState, StateField};

use crate::registry::ConnectivityChange;

/// What observers are told about
#[derive(Debug, Clone, Serialize)]
pub enum Notification {
    /// A device's observable playback state changed
    DeviceStateChanged {
        device_id: DeviceId,
        state: PlaybackState,
        changes: Vec<StateField>,
    },
    /// A command moved through its lifecycle
    CommandOutcome(Command),
    /// A device's reachability changed
    ConnectivityChanged(ConnectivityChange),
    /// The event transport connected or dropped
    TransportConnectivity { connected: bool },
    /// A catalog refresh succeeded
    CatalogRefreshed { version: u64, cards: usize },
    /// A catalog refresh failed; the previous catalog is still served
    CatalogRefreshFailed { error: String },
}

/// Receives notifications on the hub task
///
/// Implementations should return quickly; slow observers delay everyone
/// behind them. A panicking observer is logged and skipped for that
/// notification; delivery to the others continues.
pub trait Observer: Send + Sync {
    fn on_notification(&self, notification: &Notification);
}

impl<F> Observer for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn on_notification(&self, notification: &Notification) {
        self(notification)
    }
}

/// Handle returned by `Coordinator::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type ObserverList = Arc<RwLock<Vec<(ObserverId, Arc<dyn Observer>)>>>;

pub(crate) struct NotificationHub {
    tx: mpsc::UnboundedSender<Notification>,
    broadcast: broadcast::Sender<Notification>,
    observers: ObserverList,
    next_id: AtomicU64,
    stop: parking_lot::Mutex<Option<oneshot::Sender<()>>>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl NotificationHub {
    /// Starts the delivery task
    ///
    /// `commands` carries the dispatcher's lifecycle updates; they are
    /// delivered from the same task as everything else.
    pub(crate) fn spawn(capacity: usize, commands: mpsc::UnboundedReceiver<CommandUpdate>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (broadcast, _) = broadcast::channel(capacity);
        let observers: ObserverList = Arc::new(RwLock::new(Vec::new()));
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(run_hub(rx, commands, stop_rx, Arc::clone(&observers), broadcast.clone()));

        Self {
            tx,
            broadcast,
            observers,
            next_id: AtomicU64::new(1),
            stop: parking_lot::Mutex::new(Some(stop_tx)),
            task: parking_lot::Mutex::new(Some(task)),
        }
    }

    pub(crate) fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification hub stopped, dropping notification");
        }
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<Notification> {
        self.broadcast.subscribe()
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Delivers everything queued so far, then stops the task
    pub(crate) async fn stop(&self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Notification hub ended abnormally: {}", e);
            }
        }
    }
}

async fn run_hub(
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    mut commands: mpsc::UnboundedReceiver<CommandUpdate>,
    mut stop: oneshot::Receiver<()>,
    observers: ObserverList,
    broadcast: broadcast::Sender<Notification>,
) {
    debug!("Notification hub started");
    loop {
        tokio::select! {
            Some(notification) = notifications.recv() => {
                deliver(&observers, &broadcast, notification);
            }
            Some(update) = commands.recv() => {
                deliver(&observers, &broadcast, Notification::CommandOutcome(update.command));
            }
            _ = &mut stop => {
                while let Ok(update) = commands.try_recv() {
                    deliver(&observers, &broadcast, Notification::CommandOutcome(update.command));
                }
                while let Ok(notification) = notifications.try_recv() {
                    deliver(&observers, &broadcast, notification);
                }
                break;
            }
            else => break,
        }
    }
    debug!("Notification hub stopped");
}

fn deliver(observers: &ObserverList, broadcast: &broadcast::Sender<Notification>, notification: Notification) {
    if let Notification::CommandOutcome(command) = &notification {
        log_command_outcome(command);
    }

    let targets: Vec<(ObserverId, Arc<dyn Observer>)> = observers
        .read()
        .iter()
        .map(|(id, o)| (*id, Arc::clone(o)))
        .collect();
    for (id, observer) in targets {
        if catch_unwind(AssertUnwindSafe(|| observer.on_notification(&notification))).is_err() {
            error!("Observer {:?} panicked while handling a notification", id);
        }
    }
    // No receivers is fine
    let _ = broadcast.send(notification);
}

fn log_command_outcome(command: &Command) {
    match &command.status {
        CommandStatus::TimedOut => warn!(
            "Command {} ({} on {}) timed out without confirmation",
            command.id, command.kind, command.device_id
        ),
        CommandStatus::Failed(FailureReason::Rejected(reason)) => warn!(
            "Command {} ({} on {}) rejected: {}",
            command.id, command.kind, command.device_id, reason
        ),
        CommandStatus::Failed(reason) => info!(
            "Command {} ({} on {}) failed: {:?}",
            command.id, command.kind, command.device_id, reason
        ),
        CommandStatus::Confirmed => info!(
            "Command {} ({} on {}) confirmed",
            command.id, command.kind, command.device_id
        ),
        CommandStatus::Pending => debug!(
            "Command {} ({} on {}) pending",
            command.id, command.kind, command.device_id
        ),
    }
}
