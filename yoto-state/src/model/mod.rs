//! Model types for yoto-state

mod device;
mod playback;
mod transition;

pub use device::{Connectivity, Device};
pub use playback::{PlaybackState, PlaybackStatus};
pub use transition::{StateField, Transition};
