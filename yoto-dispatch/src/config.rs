//! Configuration for the command dispatcher

use std::time::Duration;

use crate::error::DispatchError;

/// Configuration for the [`crate::CommandDispatcher`]
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How long a command may stay pending before it times out
    /// Default: 8 seconds
    pub command_timeout: Duration,

    /// Number of finished commands kept for inspection
    /// Default: 64
    pub history_limit: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(8),
            history_limit: 64,
        }
    }
}

impl DispatchConfig {
    /// Short timeouts for local players on a fast network
    pub fn responsive() -> Self {
        Self {
            command_timeout: Duration::from_secs(4),
            ..Default::default()
        }
    }

    /// Generous timeouts for players that wake slowly from standby
    pub fn patient() -> Self {
        Self {
            command_timeout: Duration::from_secs(20),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.command_timeout.is_zero() {
            return Err(DispatchError::Config(
                "command_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
