//! Error types for yoto-state

use thiserror::Error;

/// Reasons an incoming event could not be applied
///
/// These never reach callers of the coordinator; the event is dropped and
/// the reason logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("Event payload is not a JSON object")]
    NotAnObject,

    #[error("Event carries no timestamp")]
    MissingTimestamp,

    #[error("Event does not identify a device")]
    MissingDeviceId,
}

pub type StateResult<T> = Result<T, StateError>;
