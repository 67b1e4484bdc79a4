//! Command lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use yoto_api::{CommandId, CommandKind, CommandPayload, DeviceId};

/// Why a command failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// A newer command for the same device replaced it
    Superseded,
    /// The command API refused it
    Rejected(String),
    /// The coordinator shut down while it was pending
    Shutdown,
}

/// Lifecycle of a command: `Pending` then exactly one terminal status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Pending,
    Confirmed,
    TimedOut,
    Failed(FailureReason),
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommandStatus::Pending)
    }
}

/// A command and where it is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub device_id: DeviceId,
    pub kind: CommandKind,
    pub payload: CommandPayload,
    pub issued_at: DateTime<Utc>,
    pub status: CommandStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Device state generation when the command was issued; only later
    /// events may confirm it
    pub baseline_generation: u64,
}

/// Published on every lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUpdate {
    pub command: Command,
}

impl CommandUpdate {
    pub fn status(&self) -> &CommandStatus {
        &self.command.status
    }
}

/// Caller's view of a submitted command
#[derive(Debug, Clone)]
pub struct CommandHandle {
    id: CommandId,
    device_id: DeviceId,
    kind: CommandKind,
    status: watch::Receiver<CommandStatus>,
}

impl CommandHandle {
    pub(crate) fn new(
        id: CommandId,
        device_id: DeviceId,
        kind: CommandKind,
        status: watch::Receiver<CommandStatus>,
    ) -> Self {
        Self {
            id,
            device_id,
            kind,
            status,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Current status without waiting
    pub fn status(&self) -> CommandStatus {
        self.status.borrow().clone()
    }

    /// Waits until the command reaches a terminal status
    pub async fn wait(mut self) -> CommandStatus {
        loop {
            let current = self.status.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.status.changed().await.is_err() {
                // Sender gone; the last value it sent is final
                return self.status.borrow().clone();
            }
        }
    }
}
