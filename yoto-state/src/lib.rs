//! Playback state tracking for Yoto players
//!
//! Devices report playback over an event stream that can deliver messages
//! late, twice, or out of order. This crate turns that stream into one
//! canonical [`PlaybackState`] per device.
//!
//! # Features
//!
//! - **Timestamp ordering**: events older than the stored state are discarded
//! - **Partial merges**: absent fields keep their previous value
//! - **Change detection**: [`ApplyOutcome::changed`] only when an observable field moved
//! - **Generations**: every applied event bumps a per-device counter used to
//!   correlate commands with later events
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use yoto_state::{StateMachine, PlaybackStatus};
//!
//! let machine = StateMachine::new();
//! let outcome = machine.apply(Some(&device_id), br#"{"eventUtc": 1, "playbackStatus": "playing"}"#);
//!
//! if outcome.changed() {
//!     println!("now {:?}", outcome.state().map(|s| s.status));
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

pub mod decoder;
pub mod error;
pub mod logging;
pub mod machine;
pub mod model;

// ============================================================================
// Re-exports
// ============================================================================

pub use decoder::{decode_event, EventDelta};
pub use error::{StateError, StateResult};
pub use machine::{ApplyOutcome, StateMachine};
pub use model::{Connectivity, Device, PlaybackState, PlaybackStatus, StateField, Transition};

pub use yoto_api::{CardId, DeviceId};
