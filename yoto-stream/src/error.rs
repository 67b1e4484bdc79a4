//! Error types for the transport boundary

use thiserror::Error;

/// Errors raised by a transport session
#[derive(Debug, Error)]
pub enum TransportError {
    /// The session is not connected to the broker
    #[error("Transport not connected")]
    NotConnected,

    /// Subscribing to a device's topics failed
    #[error("Subscription failed for {device}: {reason}")]
    SubscriptionFailed { device: String, reason: String },

    /// Publishing a message failed
    #[error("Publish failed on {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// A topic string did not follow the device topic layout
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// The event channel was closed
    #[error("Event channel closed")]
    ChannelClosed,
}

pub type TransportResult<T> = Result<T, TransportError>;
