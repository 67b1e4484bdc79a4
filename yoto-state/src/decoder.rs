//! Device event decoding
//!
//! Devices publish partial JSON documents: a status report may carry every
//! field while an event carries only what moved. Decoding produces an
//! [`EventDelta`] whose fields are `None` when the payload did not mention
//! them, so merging never overwrites a value the event said nothing about.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use yoto_api::{CardId, DeviceId};

use crate::error::{StateError, StateResult};
use crate::model::{PlaybackState, PlaybackStatus};

/// Keys that may carry the event's own timestamp, in order of preference
const TIMESTAMP_KEYS: [&str; 3] = ["eventUtc", "timestamp", "ts"];

/// Keys that may carry the volume
const VOLUME_KEYS: [&str; 2] = ["volume", "userVolumePercentage"];

/// Card id the devices report when nothing is inserted
const NO_CARD: &str = "none";

/// Partial state update decoded from one event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDelta {
    /// Device named inside the payload, if any
    pub device_id: Option<DeviceId>,
    pub timestamp: u64,
    pub status: Option<PlaybackStatus>,
    /// `Some(None)` clears the active card
    pub card_id: Option<Option<CardId>>,
    pub chapter_key: Option<String>,
    pub track_key: Option<String>,
    pub position: Option<u32>,
    pub track_length: Option<u32>,
    pub volume: Option<u8>,
    pub volume_max: Option<u8>,
    pub streaming: Option<bool>,
    /// Reachability hint, not part of playback state
    pub online: Option<bool>,
}

impl EventDelta {
    pub fn at(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: PlaybackStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_card(mut self, card_id: Option<CardId>) -> Self {
        self.card_id = Some(card_id);
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    /// Overwrites every field present in the delta, leaving the rest
    pub fn merge_into(&self, state: &mut PlaybackState) {
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(card_id) = &self.card_id {
            state.card_id = card_id.clone();
        }
        if let Some(chapter) = &self.chapter_key {
            state.chapter_key = Some(chapter.clone());
        }
        if let Some(track) = &self.track_key {
            state.track_key = Some(track.clone());
        }
        if let Some(position) = self.position {
            state.position = Some(position);
        }
        if let Some(length) = self.track_length {
            state.track_length = Some(length);
        }
        if let Some(volume) = self.volume {
            state.volume = Some(volume);
        }
        if let Some(max) = self.volume_max {
            state.volume_max = Some(max);
        }
        if let Some(streaming) = self.streaming {
            state.streaming = Some(streaming);
        }
    }
}

/// Decodes a raw event payload
///
/// Fails when the payload is not a JSON object or carries no usable
/// timestamp. Unknown keys are ignored and malformed individual fields are
/// skipped.
pub fn decode_event(payload: &[u8]) -> StateResult<EventDelta> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| StateError::InvalidPayload(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(StateError::NotAnObject);
    };

    let timestamp = TIMESTAMP_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(as_u64))
        .ok_or(StateError::MissingTimestamp)?;

    let mut delta = EventDelta::at(timestamp);

    delta.device_id = map
        .get("deviceId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(DeviceId::new);

    if let Some(raw) = map.get("playbackStatus").and_then(Value::as_str) {
        delta.status = Some(PlaybackStatus::parse(raw).unwrap_or_else(|| {
            tracing::warn!("Unrecognised playback status '{}', treating as unknown", raw);
            PlaybackStatus::Unknown
        }));
    }

    match map.get("cardId") {
        Some(Value::Null) => delta.card_id = Some(None),
        Some(Value::String(id)) if id.is_empty() || id == NO_CARD => delta.card_id = Some(None),
        Some(Value::String(id)) => delta.card_id = Some(Some(CardId::new(id.clone()))),
        Some(other) => tracing::debug!("Ignoring non-string cardId: {}", other),
        None => {}
    }

    delta.chapter_key = key_field(&map, "chapterKey");
    delta.track_key = key_field(&map, "trackKey");
    delta.position = u32_field(&map, "position");
    delta.track_length = u32_field(&map, "trackLength");
    delta.volume = VOLUME_KEYS.iter().find_map(|key| u8_field(&map, key));
    delta.volume_max = u8_field(&map, "volumeMax");
    delta.streaming = map.get("streaming").and_then(as_bool);
    delta.online = map.get("online").and_then(as_bool);

    Ok(delta)
}

/// Accepts non-negative integers, whole floats and numeric strings
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
        }
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn u32_field(map: &Map<String, Value>, key: &str) -> Option<u32> {
    let value = map.get(key)?;
    let parsed = as_u64(value).and_then(|n| u32::try_from(n).ok());
    if parsed.is_none() {
        tracing::debug!("Ignoring malformed {}: {}", key, value);
    }
    parsed
}

fn u8_field(map: &Map<String, Value>, key: &str) -> Option<u8> {
    let value = map.get(key)?;
    let parsed = as_u64(value).and_then(|n| u8::try_from(n).ok());
    if parsed.is_none() {
        tracing::debug!("Ignoring malformed {}: {}", key, value);
    }
    parsed
}

/// Chapter and track keys arrive as strings or bare numbers
fn key_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_decode_full_status_report() {
        let payload = br#"{
            "deviceId": "d1",
            "eventUtc": 1700000000,
            "playbackStatus": "playing",
            "cardId": "c1",
            "chapterKey": "02",
            "trackKey": 3,
            "position": 12.7,
            "trackLength": "300",
            "userVolumePercentage": 40,
            "volumeMax": 16,
            "streaming": false,
            "online": true,
            "batteryLevelPercentage": 88
        }"#;

        let delta = decode_event(payload).unwrap();
        assert_eq!(delta.device_id, Some(DeviceId::new("d1")));
        assert_eq!(delta.timestamp, 1_700_000_000);
        assert_eq!(delta.status, Some(PlaybackStatus::Playing));
        assert_eq!(delta.card_id, Some(Some(CardId::new("c1"))));
        assert_eq!(delta.chapter_key.as_deref(), Some("02"));
        assert_eq!(delta.track_key.as_deref(), Some("3"));
        assert_eq!(delta.position, Some(12));
        assert_eq!(delta.track_length, Some(300));
        assert_eq!(delta.volume, Some(40));
        assert_eq!(delta.volume_max, Some(16));
        assert_eq!(delta.streaming, Some(false));
        assert_eq!(delta.online, Some(true));
    }

    #[test]
    fn test_absent_fields_stay_none() {
        let delta = decode_event(br#"{"timestamp": 5, "position": 9}"#).unwrap();
        assert_eq!(delta.position, Some(9));
        assert_eq!(delta.status, None);
        assert_eq!(delta.card_id, None);
        assert_eq!(delta.device_id, None);
    }

    #[rstest]
    #[case(r#"{"ts": 1, "cardId": "none"}"#)]
    #[case(r#"{"ts": 1, "cardId": null}"#)]
    #[case(r#"{"ts": 1, "cardId": ""}"#)]
    fn test_no_card_clears(#[case] payload: &str) {
        let delta = decode_event(payload.as_bytes()).unwrap();
        assert_eq!(delta.card_id, Some(None));
    }

    #[test]
    fn test_unknown_status_still_applies_numeric_fields() {
        let delta = decode_event(br#"{"eventUtc": 3, "playbackStatus": "buffering", "position": 7}"#).unwrap();
        assert_eq!(delta.status, Some(PlaybackStatus::Unknown));
        assert_eq!(delta.position, Some(7));
    }

    #[rstest]
    #[case(br#"{"playbackStatus": "playing"}"#.as_slice())]
    #[case(br#"{"eventUtc": "soon"}"#.as_slice())]
    #[case(br#"{"eventUtc": -4}"#.as_slice())]
    fn test_missing_timestamp(#[case] payload: &[u8]) {
        assert!(matches!(decode_event(payload), Err(StateError::MissingTimestamp)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(decode_event(b"{oops"), Err(StateError::InvalidPayload(_))));
        assert!(matches!(decode_event(b"[1, 2]"), Err(StateError::NotAnObject)));
    }

    #[test]
    fn test_timestamp_accepts_numeric_string() {
        let delta = decode_event(br#"{"eventUtc": "42"}"#).unwrap();
        assert_eq!(delta.timestamp, 42);
    }

    #[test]
    fn test_out_of_range_volume_is_skipped() {
        let delta = decode_event(br#"{"ts": 1, "volume": 900, "volumeMax": 16}"#).unwrap();
        assert_eq!(delta.volume, None);
        assert_eq!(delta.volume_max, Some(16));
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut state = PlaybackState::new(DeviceId::new("d1"));
        EventDelta::at(1)
            .with_status(PlaybackStatus::Playing)
            .with_card(Some(CardId::new("x")))
            .merge_into(&mut state);
        EventDelta::at(2).with_position(5).merge_into(&mut state);

        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.card_id, Some(CardId::new("x")));
        assert_eq!(state.position, Some(5));
    }
}
