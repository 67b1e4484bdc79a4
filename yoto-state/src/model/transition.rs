//! Before/after view of a state update

use serde::{Deserialize, Serialize};
use yoto_api::DeviceId;

use super::PlaybackState;
use crate::decoder::EventDelta;

/// Observable fields of [`PlaybackState`]
///
/// Timestamps and generations are bookkeeping and never count as a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateField {
    Status,
    Card,
    Chapter,
    Track,
    Position,
    TrackLength,
    Volume,
    VolumeMax,
    Streaming,
    Stale,
}

impl StateField {
    /// Lists the observable fields that differ between two snapshots
    pub fn diff(previous: &PlaybackState, current: &PlaybackState) -> Vec<StateField> {
        let mut fields = Vec::new();
        if previous.status != current.status {
            fields.push(StateField::Status);
        }
        if previous.card_id != current.card_id {
            fields.push(StateField::Card);
        }
        if previous.chapter_key != current.chapter_key {
            fields.push(StateField::Chapter);
        }
        if previous.track_key != current.track_key {
            fields.push(StateField::Track);
        }
        if previous.position != current.position {
            fields.push(StateField::Position);
        }
        if previous.track_length != current.track_length {
            fields.push(StateField::TrackLength);
        }
        if previous.volume != current.volume {
            fields.push(StateField::Volume);
        }
        if previous.volume_max != current.volume_max {
            fields.push(StateField::VolumeMax);
        }
        if previous.streaming != current.streaming {
            fields.push(StateField::Streaming);
        }
        if previous.stale != current.stale {
            fields.push(StateField::Stale);
        }
        fields
    }
}

/// Result of a state update that was accepted
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub device_id: DeviceId,
    pub previous: PlaybackState,
    pub current: PlaybackState,
    /// The event that produced this transition, `None` for local transitions
    /// such as marking state stale on disconnect
    pub delta: Option<EventDelta>,
    pub changes: Vec<StateField>,
}

impl Transition {
    pub(crate) fn new(previous: PlaybackState, current: PlaybackState, delta: Option<EventDelta>) -> Self {
        let changes = StateField::diff(&previous, &current);
        Self {
            device_id: current.device_id.clone(),
            previous,
            current,
            delta,
            changes,
        }
    }

    /// True when at least one observable field differs
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn touched(&self, field: StateField) -> bool {
        self.changes.contains(&field)
    }

    /// Generation of the state after this transition
    pub fn generation(&self) -> u64 {
        self.current.generation
    }
}
