use thiserror::Error;
use yoto_api::{ApiError, CommandId, CommandKind};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command API refused the command; it is marked failed
    #[error("Command {command_id} rejected: {source}")]
    Rejected {
        command_id: CommandId,
        #[source]
        source: ApiError,
    },

    /// The payload does not fit the command kind
    #[error("Invalid payload for {kind} command")]
    InvalidPayload { kind: CommandKind },

    /// The dispatcher no longer accepts commands
    #[error("Dispatcher has been shut down")]
    ShutDown,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
