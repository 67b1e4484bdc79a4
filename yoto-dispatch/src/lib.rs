//! Command dispatch and confirmation tracking for yoto-sdk
//!
//! The command API only says whether it accepted a command. Whether the
//! device acted on it is learned later from the event stream, so every
//! command stays pending until a matching state transition arrives or its
//! timeout passes.
//!
//! Rules:
//! - at most one pending command per device; a new one supersedes the old
//! - rejections fail the command immediately and are returned to the caller
//! - timeouts are terminal and never retried
//! - only transitions applied after a command was issued can confirm it

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod matcher;

pub use command::{Command, CommandHandle, CommandStatus, CommandUpdate, FailureReason};
pub use config::DispatchConfig;
pub use dispatcher::CommandDispatcher;
pub use error::{DispatchError, Result};
