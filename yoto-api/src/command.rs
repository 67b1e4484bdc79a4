//! Playback commands and their wire encoding
//!
//! Every command addresses a single device and is published to
//! `device/{id}/command/{action}`. Only `play` carries a payload.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::ids::{CardId, CommandId, DeviceId};

/// The playback intents a device understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Play,
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
}

impl CommandKind {
    /// Action segment of the command topic
    pub fn action(&self) -> &'static str {
        match self {
            CommandKind::Play => "card-play",
            CommandKind::Pause => "card-pause",
            CommandKind::Resume => "card-resume",
            CommandKind::Stop => "card-stop",
            CommandKind::Next => "card-next",
            CommandKind::Previous => "card-previous",
        }
    }

    pub fn all() -> [CommandKind; 6] {
        [
            CommandKind::Play,
            CommandKind::Pause,
            CommandKind::Resume,
            CommandKind::Stop,
            CommandKind::Next,
            CommandKind::Previous,
        ]
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Play => "play",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
            CommandKind::Stop => "stop",
            CommandKind::Next => "next",
            CommandKind::Previous => "previous",
        };
        f.write_str(name)
    }
}

/// What to start playing on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub card_id: CardId,
    /// Two-digit chapter key, e.g. "01"
    pub chapter_key: String,
    /// Two-digit track key, e.g. "01"
    pub track_key: String,
    pub seconds_in: u32,
    /// Stop after this many seconds, 0 plays to the end
    pub cutoff: u32,
}

impl PlayRequest {
    /// Plays a card from its first chapter and track
    pub fn card(card_id: impl Into<CardId>) -> Self {
        Self {
            card_id: card_id.into(),
            chapter_key: "01".to_string(),
            track_key: "01".to_string(),
            seconds_in: 0,
            cutoff: 0,
        }
    }

    pub fn with_chapter(mut self, chapter: impl AsRef<str>) -> Self {
        self.chapter_key = normalize_key(chapter.as_ref());
        self
    }

    pub fn with_track(mut self, track: impl AsRef<str>) -> Self {
        self.track_key = normalize_key(track.as_ref());
        self
    }

    pub fn starting_at(mut self, seconds_in: u32) -> Self {
        self.seconds_in = seconds_in;
        self
    }

    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.cutoff = cutoff;
        self
    }
}

/// Normalizes a chapter or track key to its zero-padded two digit form
///
/// Non-digit characters are ignored. A key without digits falls back to "01".
pub fn normalize_key(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => format!("{n:02}"),
        _ => "01".to_string(),
    }
}

/// Command-specific payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommandPayload {
    #[default]
    None,
    Play(PlayRequest),
}

impl CommandPayload {
    pub fn play_request(&self) -> Option<&PlayRequest> {
        match self {
            CommandPayload::Play(request) => Some(request),
            CommandPayload::None => None,
        }
    }
}

impl From<PlayRequest> for CommandPayload {
    fn from(request: PlayRequest) -> Self {
        CommandPayload::Play(request)
    }
}

/// A fully addressed command ready to hand to a [`crate::CommandApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub id: CommandId,
    pub device_id: DeviceId,
    pub kind: CommandKind,
    pub payload: CommandPayload,
}

impl CommandRequest {
    pub fn new(device_id: DeviceId, kind: CommandKind, payload: CommandPayload) -> Self {
        Self {
            id: CommandId::generate(),
            device_id,
            kind,
            payload,
        }
    }

    /// Topic the command is published to
    pub fn topic(&self) -> String {
        format!("device/{}/command/{}", self.device_id, self.kind.action())
    }

    /// JSON body for the command, `None` for commands without a payload
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        self.payload.play_request().map(|play| {
            json!({
                "uri": play.card_id.uri(),
                "chapterKey": play.chapter_key,
                "trackKey": play.track_key,
                "secondsIn": play.seconds_in,
                "cutOff": play.cutoff,
            })
        })
    }
}
