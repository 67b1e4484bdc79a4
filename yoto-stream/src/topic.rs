//! Device topic layout
//!
//! Devices publish on `device/{id}/events`, `device/{id}/status` and
//! `device/{id}/response`. A status report is requested by publishing to
//! `device/{id}/command/events`.

use std::fmt;
use std::str::FromStr;

use yoto_api::DeviceId;

use crate::error::TransportError;

/// Which device feed a topic belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicChannel {
    /// Playback events
    Events,
    /// Periodic or requested status reports
    Status,
    /// Replies to published commands
    Response,
}

impl TopicChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicChannel::Events => "events",
            TopicChannel::Status => "status",
            TopicChannel::Response => "response",
        }
    }

    pub fn all() -> [TopicChannel; 3] {
        [TopicChannel::Events, TopicChannel::Status, TopicChannel::Response]
    }
}

/// A parsed device topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceTopic {
    pub device_id: DeviceId,
    pub channel: TopicChannel,
}

impl DeviceTopic {
    pub fn new(device_id: DeviceId, channel: TopicChannel) -> Self {
        Self { device_id, channel }
    }

    /// Every topic a device publishes on
    pub fn subscriptions_for(device_id: &DeviceId) -> Vec<DeviceTopic> {
        TopicChannel::all()
            .into_iter()
            .map(|channel| DeviceTopic::new(device_id.clone(), channel))
            .collect()
    }
}

impl fmt::Display for DeviceTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device/{}/{}", self.device_id, self.channel.as_str())
    }
}

impl FromStr for DeviceTopic {
    type Err = TransportError;

    fn from_str(topic: &str) -> Result<Self, Self::Err> {
        let mut parts = topic.split('/');
        let (Some("device"), Some(id), Some(channel), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        };

        if id.is_empty() {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        }

        let channel = match channel {
            "events" => TopicChannel::Events,
            "status" => TopicChannel::Status,
            "response" => TopicChannel::Response,
            _ => return Err(TransportError::InvalidTopic(topic.to_string())),
        };

        Ok(DeviceTopic::new(DeviceId::new(id), channel))
    }
}

/// Topic that asks a device to publish a fresh status report
pub fn status_request_topic(device_id: &DeviceId) -> String {
    format!("device/{device_id}/command/events")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("device/abc/events", TopicChannel::Events)]
    #[case("device/abc/status", TopicChannel::Status)]
    #[case("device/abc/response", TopicChannel::Response)]
    fn test_parse_device_topics(#[case] raw: &str, #[case] channel: TopicChannel) {
        let topic: DeviceTopic = raw.parse().unwrap();
        assert_eq!(topic.device_id.as_str(), "abc");
        assert_eq!(topic.channel, channel);
        assert_eq!(topic.to_string(), raw);
    }

    #[rstest]
    #[case("device/abc")]
    #[case("device//events")]
    #[case("devices/abc/events")]
    #[case("device/abc/command/events")]
    #[case("device/abc/unknown")]
    fn test_reject_malformed_topics(#[case] raw: &str) {
        assert!(raw.parse::<DeviceTopic>().is_err());
    }

    #[test]
    fn test_subscriptions_cover_every_channel() {
        let topics = DeviceTopic::subscriptions_for(&DeviceId::new("d1"));
        let rendered: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["device/d1/events", "device/d1/status", "device/d1/response"]
        );
    }

    #[test]
    fn test_status_request_topic() {
        assert_eq!(
            status_request_topic(&DeviceId::new("d1")),
            "device/d1/command/events"
        );
    }
}
