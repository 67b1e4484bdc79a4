//! Command dispatcher
//!
//! Each device has one slot holding at most one pending command. Submitting
//! a new command supersedes whatever is in the slot. A pending command ends
//! when a matching state transition arrives, when its timer expires, or when
//! the dispatcher shuts down.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info};
use yoto_api::{CommandApi, CommandId, CommandKind, CommandPayload, CommandRequest, DeviceId};
use yoto_state::{StateMachine, Transition};

use crate::command::{Command, CommandHandle, CommandStatus, CommandUpdate, FailureReason};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::matcher::confirms;

/// A command waiting for confirmation
struct PendingCommand {
    command: Command,
    status_tx: watch::Sender<CommandStatus>,
    timer: Option<AbortHandle>,
}

type Slot = Arc<Mutex<Option<PendingCommand>>>;

struct Inner {
    api: Arc<dyn CommandApi>,
    state: Arc<StateMachine>,
    config: DispatchConfig,
    slots: DashMap<DeviceId, Slot>,
    history: Mutex<VecDeque<Command>>,
    updates: Option<mpsc::UnboundedSender<CommandUpdate>>,
    shut_down: AtomicBool,
}

/// Issues commands and tracks them until confirmed, timed out or failed
///
/// Cheap to clone; clones share the same command table.
#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<Inner>,
}

impl CommandDispatcher {
    pub fn new(api: Arc<dyn CommandApi>, state: Arc<StateMachine>, config: DispatchConfig) -> Self {
        Self::build(api, state, config, None)
    }

    /// Creates a dispatcher that publishes every lifecycle transition
    pub fn with_updates(
        api: Arc<dyn CommandApi>,
        state: Arc<StateMachine>,
        config: DispatchConfig,
        updates: mpsc::UnboundedSender<CommandUpdate>,
    ) -> Self {
        Self::build(api, state, config, Some(updates))
    }

    fn build(
        api: Arc<dyn CommandApi>,
        state: Arc<StateMachine>,
        config: DispatchConfig,
        updates: Option<mpsc::UnboundedSender<CommandUpdate>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                state,
                config,
                slots: DashMap::new(),
                history: Mutex::new(VecDeque::new()),
                updates,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Issues a command to a device
    ///
    /// Any pending command for the device fails as superseded before the new
    /// one is sent. Returns once the command API has answered; the handle
    /// then resolves when the device confirms or the timeout passes.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn submit(
        &self,
        device_id: DeviceId,
        kind: CommandKind,
        payload: CommandPayload,
    ) -> Result<CommandHandle> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(DispatchError::ShutDown);
        }
        let payload_fits = match kind {
            CommandKind::Play => payload.play_request().is_some(),
            _ => payload == CommandPayload::None,
        };
        if !payload_fits {
            return Err(DispatchError::InvalidPayload { kind });
        }

        let request = CommandRequest::new(device_id.clone(), kind, payload);
        let handle = self.register(&request)?;

        if let Err(source) = self.inner.api.send(&request).await {
            debug!("Command {} ({} on {}) rejected: {}", request.id, kind, device_id, source);
            let reason = FailureReason::Rejected(source.message());
            self.inner
                .resolve(&device_id, request.id, CommandStatus::Failed(reason));
            return Err(DispatchError::Rejected {
                command_id: request.id,
                source,
            });
        }

        debug!("Command {} ({} on {}) accepted", request.id, kind, device_id);
        Ok(handle)
    }

    /// Puts the command in its device slot and starts its timer
    fn register(&self, request: &CommandRequest) -> Result<CommandHandle> {
        let slot = self.inner.slot(&request.device_id);
        let mut guard = slot.lock();

        // Checked under the slot lock so the shutdown sweep cannot miss it
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(DispatchError::ShutDown);
        }

        if let Some(previous) = guard.take() {
            debug!(
                "Command {} superseded by {} on {}",
                previous.command.id, request.id, request.device_id
            );
            self.inner
                .finish(previous, CommandStatus::Failed(FailureReason::Superseded));
        }

        // Read under the slot lock so an event applied before this point can
        // never confirm the new command
        let baseline_generation = self.inner.state.generation(&request.device_id);
        let command = Command {
            id: request.id,
            device_id: request.device_id.clone(),
            kind: request.kind,
            payload: request.payload.clone(),
            issued_at: Utc::now(),
            status: CommandStatus::Pending,
            resolved_at: None,
            baseline_generation,
        };

        let (status_tx, status_rx) = watch::channel(CommandStatus::Pending);
        let timer = self.spawn_timer(request.device_id.clone(), request.id);
        self.inner.publish(&command);

        *guard = Some(PendingCommand {
            command,
            status_tx,
            timer: Some(timer),
        });

        Ok(CommandHandle::new(
            request.id,
            request.device_id.clone(),
            request.kind,
            status_rx,
        ))
    }

    fn spawn_timer(&self, device_id: DeviceId, command_id: CommandId) -> AbortHandle {
        let inner = Arc::clone(&self.inner);
        let timeout = inner.config.command_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            inner.expire(&device_id, command_id);
        })
        .abort_handle()
    }

    /// Feeds an applied state transition into confirmation matching
    ///
    /// Returns the id of the command it confirmed, if any. Transitions with
    /// no matching pending command are spontaneous changes and leave the
    /// command table untouched.
    pub fn observe(&self, transition: &Transition) -> Option<CommandId> {
        let slot = self.inner.slots.get(&transition.device_id)?.value().clone();
        let mut guard = slot.lock();

        let pending = guard.as_ref()?;
        if transition.generation() <= pending.command.baseline_generation {
            return None;
        }
        if !confirms(&pending.command, transition) {
            return None;
        }

        let pending = guard.take()?;
        let id = pending.command.id;
        self.inner.finish(pending, CommandStatus::Confirmed);
        Some(id)
    }

    /// The pending command for a device, if any
    pub fn pending(&self, device_id: &DeviceId) -> Option<Command> {
        let slot = self.inner.slots.get(device_id)?.value().clone();
        let guard = slot.lock();
        guard.as_ref().map(|p| p.command.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.value().lock().is_some())
            .count()
    }

    /// Most recently finished commands, newest first
    pub fn recent(&self, limit: usize) -> Vec<Command> {
        self.inner
            .history
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Fails every pending command and refuses new ones
    ///
    /// Returns the number of commands that were still pending.
    pub fn shutdown(&self) -> usize {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let slots: Vec<Slot> = self.inner.slots.iter().map(|s| s.value().clone()).collect();
        let mut failed = 0;
        for slot in slots {
            if let Some(pending) = slot.lock().take() {
                self.inner
                    .finish(pending, CommandStatus::Failed(FailureReason::Shutdown));
                failed += 1;
            }
        }
        info!("Command dispatcher shut down ({} pending commands failed)", failed);
        failed
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}

impl Inner {
    fn slot(&self, device_id: &DeviceId) -> Slot {
        self.slots
            .entry(device_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }

    /// Resolves a command only if it is still the device's pending command
    fn resolve(&self, device_id: &DeviceId, command_id: CommandId, status: CommandStatus) -> bool {
        let Some(slot) = self.slots.get(device_id).map(|s| s.value().clone()) else {
            return false;
        };
        let mut guard = slot.lock();
        if guard.as_ref().map(|p| p.command.id) != Some(command_id) {
            return false;
        }
        match guard.take() {
            Some(pending) => {
                self.finish(pending, status);
                true
            }
            None => false,
        }
    }

    fn expire(&self, device_id: &DeviceId, command_id: CommandId) {
        if self.resolve(device_id, command_id, CommandStatus::TimedOut) {
            debug!(
                "Command {} on {} timed out after {:?}",
                command_id, device_id, self.config.command_timeout
            );
        }
    }

    /// Moves a command to a terminal status; the caller has already removed
    /// it from its slot
    fn finish(&self, mut pending: PendingCommand, status: CommandStatus) {
        debug_assert!(status.is_terminal());
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        pending.command.status = status.clone();
        pending.command.resolved_at = Some(Utc::now());
        pending.status_tx.send_replace(status);
        debug!(
            "Command {} ({} on {}) -> {:?}",
            pending.command.id, pending.command.kind, pending.command.device_id, pending.command.status
        );

        self.publish(&pending.command);
        self.archive(pending.command);
    }

    fn archive(&self, command: Command) {
        let mut history = self.history.lock();
        history.push_back(command);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }

    fn publish(&self, command: &Command) {
        if let Some(updates) = &self.updates {
            // Receiver gone means nobody is listening any more
            let _ = updates.send(CommandUpdate {
                command: command.clone(),
            });
        }
    }
}
