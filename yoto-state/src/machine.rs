//! Per-device playback state machine
//!
//! Events are merged into the state table by their own timestamp, not by
//! arrival order:
//!
//! - an event older than the stored state is discarded
//! - an event at or after the stored timestamp is merged field by field
//!
//! Every applied event bumps the device's generation. Command confirmation
//! relies on it to ignore events that were applied before a command was
//! issued.

use dashmap::DashMap;
use tracing::{debug, warn};
use yoto_api::DeviceId;

use crate::decoder::{decode_event, EventDelta};
use crate::error::StateError;
use crate::model::{PlaybackState, PlaybackStatus, Transition};

/// What happened to an incoming event
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The event was merged into the device's state
    Applied(Transition),
    /// The event was older than the stored state and discarded
    Stale {
        device_id: DeviceId,
        event_timestamp: u64,
        current: PlaybackState,
    },
    /// The event could not be decoded or attributed to a device
    Dropped(StateError),
}

impl ApplyOutcome {
    /// True when observable state changed
    pub fn changed(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(t) if t.changed())
    }

    /// Device state after the event, when it was attributable
    pub fn state(&self) -> Option<&PlaybackState> {
        match self {
            ApplyOutcome::Applied(transition) => Some(&transition.current),
            ApplyOutcome::Stale { current, .. } => Some(current),
            ApplyOutcome::Dropped(_) => None,
        }
    }

    pub fn transition(&self) -> Option<&Transition> {
        match self {
            ApplyOutcome::Applied(transition) => Some(transition),
            _ => None,
        }
    }
}

/// Owner of every device's [`PlaybackState`]
///
/// Updates to one device are serialized by the table's entry lock; updates
/// to different devices proceed in parallel. Nothing here blocks on I/O.
#[derive(Debug, Default)]
pub struct StateMachine {
    states: DashMap<DeviceId, PlaybackState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a raw event and applies it
    ///
    /// `device_id` is the device the transport attributed the event to. When
    /// absent, the payload's own `deviceId` is used. Undecodable or
    /// unattributable events are dropped with a warning.
    pub fn apply(&self, device_id: Option<&DeviceId>, payload: &[u8]) -> ApplyOutcome {
        let delta = match decode_event(payload) {
            Ok(delta) => delta,
            Err(e) => {
                warn!("Dropping event for {:?}: {}", device_id.map(DeviceId::as_str), e);
                return ApplyOutcome::Dropped(e);
            }
        };

        let Some(device_id) = device_id.cloned().or_else(|| delta.device_id.clone()) else {
            warn!("Dropping event without device identity (timestamp {})", delta.timestamp);
            return ApplyOutcome::Dropped(StateError::MissingDeviceId);
        };

        self.apply_delta(&device_id, delta)
    }

    /// Applies an already decoded delta
    pub fn apply_delta(&self, device_id: &DeviceId, delta: EventDelta) -> ApplyOutcome {
        let mut entry = self
            .states
            .entry(device_id.clone())
            .or_insert_with(|| PlaybackState::new(device_id.clone()));
        let state = entry.value_mut();

        if let Some(stored) = state.timestamp {
            if delta.timestamp < stored {
                debug!(
                    "Discarding stale event for {} (event {} < stored {})",
                    device_id, delta.timestamp, stored
                );
                return ApplyOutcome::Stale {
                    device_id: device_id.clone(),
                    event_timestamp: delta.timestamp,
                    current: state.clone(),
                };
            }
        }

        let previous = state.clone();
        delta.merge_into(state);
        state.timestamp = Some(delta.timestamp);
        state.stale = false;
        state.generation += 1;

        let transition = Transition::new(previous, state.clone(), Some(delta));
        if transition.changed() {
            debug!(
                "State for {} changed {:?} (generation {})",
                device_id,
                transition.changes,
                transition.generation()
            );
        }
        ApplyOutcome::Applied(transition)
    }

    /// Marks every device's state stale after the transport drops
    ///
    /// Status becomes unknown while the last known values are kept for
    /// display. Returns the devices whose observable state changed.
    pub fn mark_all_stale(&self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for mut entry in self.states.iter_mut() {
            let state = entry.value_mut();
            let previous = state.clone();
            state.status = PlaybackStatus::Unknown;
            state.stale = true;

            let transition = Transition::new(previous, state.clone(), None);
            if transition.changed() {
                transitions.push(transition);
            }
        }
        debug!("Marked {} device states stale", transitions.len());
        transitions
    }

    pub fn snapshot(&self, device_id: &DeviceId) -> Option<PlaybackState> {
        self.states.get(device_id).map(|s| s.value().clone())
    }

    pub fn snapshot_all(&self) -> Vec<PlaybackState> {
        let mut states: Vec<PlaybackState> = self.states.iter().map(|s| s.value().clone()).collect();
        states.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        states
    }

    /// Number of events applied for the device, 0 if none yet
    pub fn generation(&self, device_id: &DeviceId) -> u64 {
        self.states.get(device_id).map(|s| s.generation).unwrap_or(0)
    }

    pub fn device_count(&self) -> usize {
        self.states.len()
    }
}
