//! Deciding whether a state transition confirms a command

use yoto_api::{normalize_key, CommandKind};
use yoto_state::{PlaybackStatus, StateField, Transition};

use crate::command::Command;

/// True when `transition` is the device acting on `command`
///
/// The caller is responsible for checking the transition is newer than the
/// command's baseline generation.
pub fn confirms(command: &Command, transition: &Transition) -> bool {
    let Some(delta) = &transition.delta else {
        return false;
    };
    if delta.status == Some(PlaybackStatus::Unknown) {
        return false;
    }
    let state = &transition.current;

    match command.kind {
        CommandKind::Play => {
            let Some(request) = command.payload.play_request() else {
                debug_assert!(false, "play command {} without a play request", command.id);
                return false;
            };
            let started = delta.status == Some(PlaybackStatus::Playing)
                || (delta.card_id.is_some() && state.status == PlaybackStatus::Playing);
            if !started || state.card_id.as_ref() != Some(&request.card_id) {
                return false;
            }
            let chapter_ok = delta
                .chapter_key
                .as_deref()
                .map_or(true, |key| normalize_key(key) == normalize_key(&request.chapter_key));
            let track_ok = delta
                .track_key
                .as_deref()
                .map_or(true, |key| normalize_key(key) == normalize_key(&request.track_key));
            chapter_ok && track_ok
        }
        CommandKind::Pause => delta.status == Some(PlaybackStatus::Paused),
        CommandKind::Resume => delta.status == Some(PlaybackStatus::Playing),
        CommandKind::Stop => delta.status == Some(PlaybackStatus::Stopped),
        CommandKind::Next | CommandKind::Previous => {
            transition.touched(StateField::Chapter) || transition.touched(StateField::Track)
        }
    }
}
