//! The transport session seam
//!
//! Broker connectivity, reconnection and topic wiring are owned by the
//! implementation. Incoming traffic reaches the coordinator through an
//! [`crate::EventSender`].

use async_trait::async_trait;
use yoto_api::DeviceId;

use crate::error::TransportResult;

/// A live publish/subscribe session
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Subscribes to every topic the device publishes on
    async fn subscribe_device(&self, device_id: &DeviceId) -> TransportResult<()>;

    /// Drops the device's subscriptions
    async fn unsubscribe_device(&self, device_id: &DeviceId) -> TransportResult<()>;

    /// Asks the device to publish a fresh status report
    ///
    /// Sessions that cannot request status leave the default in place.
    async fn request_status(&self, _device_id: &DeviceId) -> TransportResult<()> {
        Ok(())
    }
}
