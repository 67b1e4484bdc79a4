//! Canonical per-device playback state

use serde::{Deserialize, Serialize};
use yoto_api::{CardId, DeviceId};

/// Current playback status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Not yet reported, unrecognised, or unknowable while disconnected
    #[default]
    Unknown,
    Stopped,
    Playing,
    Paused,
}

impl PlaybackStatus {
    /// Parses a device status string
    ///
    /// Returns `None` for values outside the known set so callers can
    /// report them before falling back to [`PlaybackStatus::Unknown`].
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "playing" => Some(PlaybackStatus::Playing),
            "paused" => Some(PlaybackStatus::Paused),
            "stopped" => Some(PlaybackStatus::Stopped),
            "unknown" => Some(PlaybackStatus::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Unknown => "unknown",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
        }
    }
}

/// Last known playback state of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub device_id: DeviceId,
    pub status: PlaybackStatus,
    pub card_id: Option<CardId>,
    pub chapter_key: Option<String>,
    pub track_key: Option<String>,
    /// Position within the track, in seconds
    pub position: Option<u32>,
    /// Track length, in seconds
    pub track_length: Option<u32>,
    pub volume: Option<u8>,
    pub volume_max: Option<u8>,
    pub streaming: Option<bool>,
    /// Timestamp of the newest applied event, from the device's own clock
    pub timestamp: Option<u64>,
    /// Set while the event transport is down; cleared by the next applied event
    pub stale: bool,
    /// Number of events applied so far
    pub generation: u64,
}

impl PlaybackState {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            status: PlaybackStatus::Unknown,
            card_id: None,
            chapter_key: None,
            track_key: None,
            position: None,
            track_length: None,
            volume: None,
            volume_max: None,
            streaming: None,
            timestamp: None,
            stale: false,
            generation: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("playing", Some(PlaybackStatus::Playing))]
    #[case("PAUSED", Some(PlaybackStatus::Paused))]
    #[case(" stopped ", Some(PlaybackStatus::Stopped))]
    #[case("unknown", Some(PlaybackStatus::Unknown))]
    #[case("buffering", None)]
    #[case("", None)]
    fn test_parse_status(#[case] raw: &str, #[case] expected: Option<PlaybackStatus>) {
        assert_eq!(PlaybackStatus::parse(raw), expected);
    }

    #[test]
    fn test_new_state_is_unknown() {
        let state = PlaybackState::new(DeviceId::new("d1"));
        assert_eq!(state.status, PlaybackStatus::Unknown);
        assert_eq!(state.timestamp, None);
        assert_eq!(state.generation, 0);
        assert!(!state.is_playing());
    }
}
