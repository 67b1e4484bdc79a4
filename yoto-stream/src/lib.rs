//! Event transport boundary for yoto-sdk
//!
//! Devices report playback through a publish/subscribe broker. This crate
//! describes that stream without implementing a broker client:
//!
//! - [`TransportSession`]: subscribe or unsubscribe a device, request status
//! - [`TransportEvent`]: connect, disconnect and message notifications
//! - [`DeviceTopic`]: the `device/{id}/{channel}` topic layout
//!
//! The stream is treated as unordered and may re-deliver messages; ordering
//! is restored downstream from each event's own timestamp.

pub mod error;
pub mod event;
pub mod session;
pub mod topic;

pub use error::{TransportError, TransportResult};
pub use event::{event_channel, EventSender, TransportEvent, TransportMessage};
pub use session::TransportSession;
pub use topic::{status_request_topic, DeviceTopic, TopicChannel};
