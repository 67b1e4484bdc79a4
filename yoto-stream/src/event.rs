//! Events delivered by a transport session

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::topic::DeviceTopic;

/// A raw message received on some topic
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub topic: String,
    pub payload: Bytes,
    /// Local receipt time, for diagnostics only
    pub received_at: DateTime<Utc>,
}

impl TransportMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }

    /// Parses the topic, `None` when it is not a device topic
    pub fn device_topic(&self) -> Option<DeviceTopic> {
        self.topic.parse().ok()
    }
}

/// Everything a transport session can report
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The session (re)connected to the broker
    Connected,
    /// The session lost its connection
    Disconnected { reason: Option<String> },
    /// A message arrived
    Message(TransportMessage),
}

/// Creates the channel a transport implementation feeds events into
pub fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<TransportEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

/// Sending half handed to a transport implementation
///
/// Sends never block so broker callbacks can forward events directly.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSender {
    pub fn send(&self, event: TransportEvent) -> TransportResult<()> {
        self.tx.send(event).map_err(|rejected| {
            debug!("Event channel closed, dropping {:?}", rejected.0);
            TransportError::ChannelClosed
        })
    }

    pub fn connected(&self) -> TransportResult<()> {
        self.send(TransportEvent::Connected)
    }

    pub fn disconnected(&self, reason: Option<String>) -> TransportResult<()> {
        self.send(TransportEvent::Disconnected { reason })
    }

    pub fn message(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> TransportResult<()> {
        self.send(TransportEvent::Message(TransportMessage::new(topic, payload)))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
