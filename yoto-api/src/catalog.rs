//! Device and library listings returned by the cloud API
//!
//! The raw responses are `{"devices": [...]}` from the device listing and
//! `{"cards": [...]}` from the family library. A card's chapters come from
//! its content detail, `{"card": {"content": {"chapters": [...]}}}`. Entries
//! with missing ids or keys are skipped, other missing fields fall back to
//! defaults.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::ids::{CardId, DeviceId};

/// A player registered to the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub name: String,
    /// Hardware model tag, e.g. "v3" or "mini"
    pub model: String,
    pub online: bool,
}

/// A card in the family library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub id: CardId,
    pub title: String,
    /// Remote artwork reference (cover image URL)
    pub artwork: Option<String>,
}

/// One chapter of a card, from the card's content detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    /// Chapter key as used in play requests, e.g. "01"
    pub key: String,
    pub title: String,
    /// Length in seconds, when the API reports it
    pub duration: Option<u32>,
    /// Remote 16x16 icon reference
    pub icon: Option<String>,
}

/// Everything a single catalog refresh returns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub devices: Vec<DeviceRecord>,
    pub cards: Vec<CardSummary>,
}

#[derive(Deserialize)]
struct RawDevices {
    #[serde(default)]
    devices: Vec<RawDevice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDevice {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    online: bool,
}

#[derive(Deserialize)]
struct RawLibrary {
    #[serde(default)]
    cards: Vec<RawLibraryEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLibraryEntry {
    #[serde(default)]
    card_id: Option<String>,
    #[serde(default)]
    card: Option<RawCard>,
}

#[derive(Deserialize)]
struct RawCard {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    cover: Option<RawCover>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCover {
    #[serde(default)]
    image_l: Option<String>,
}

#[derive(Deserialize)]
struct RawCardDetail {
    #[serde(default)]
    card: Option<RawDetailCard>,
}

#[derive(Deserialize)]
struct RawDetailCard {
    #[serde(default)]
    content: Option<RawContent>,
}

#[derive(Deserialize)]
struct RawContent {
    #[serde(default)]
    chapters: Vec<RawChapter>,
}

#[derive(Deserialize)]
struct RawChapter {
    #[serde(default)]
    key: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    display: Option<RawDisplay>,
}

#[derive(Deserialize)]
struct RawDisplay {
    #[serde(default, rename = "icon16x16")]
    icon: Option<String>,
}

impl CatalogListing {
    /// Decodes the device listing and library responses
    pub fn from_json(devices_json: &str, library_json: &str) -> Result<Self> {
        Ok(Self {
            devices: parse_devices(devices_json)?,
            cards: parse_library(library_json)?,
        })
    }

    pub fn device(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| &d.id == id)
    }

    pub fn card(&self, id: &CardId) -> Option<&CardSummary> {
        self.cards.iter().find(|c| &c.id == id)
    }

    /// First device reporting online, falling back to the first listed
    pub fn preferred_device(&self) -> Option<&DeviceRecord> {
        self.devices
            .iter()
            .find(|d| d.online)
            .or_else(|| self.devices.first())
    }
}

/// Decodes a `{"devices": [...]}` response
pub fn parse_devices(json: &str) -> Result<Vec<DeviceRecord>> {
    let raw: RawDevices =
        serde_json::from_str(json).map_err(|e| ApiError::Decode(format!("devices: {e}")))?;

    Ok(raw
        .devices
        .into_iter()
        .filter_map(|d| {
            let id = d.device_id.filter(|id| !id.trim().is_empty())?;
            Some(DeviceRecord {
                id: DeviceId::new(id),
                name: d.name.unwrap_or_else(|| "Unknown".to_string()),
                model: d.device_type.unwrap_or_else(|| "unknown".to_string()),
                online: d.online,
            })
        })
        .collect())
}

/// Decodes a `{"cards": [...]}` library response
pub fn parse_library(json: &str) -> Result<Vec<CardSummary>> {
    let raw: RawLibrary =
        serde_json::from_str(json).map_err(|e| ApiError::Decode(format!("library: {e}")))?;

    Ok(raw
        .cards
        .into_iter()
        .filter_map(|entry| {
            let id = entry.card_id.filter(|id| !id.is_empty())?;
            let card = entry.card;
            let title = card
                .as_ref()
                .and_then(|c| c.title.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            let artwork = card
                .and_then(|c| c.metadata)
                .and_then(|m| m.cover)
                .and_then(|c| c.image_l)
                .filter(|url| !url.is_empty());
            Some(CardSummary {
                id: CardId::new(id),
                title,
                artwork,
            })
        })
        .collect())
}

/// Decodes a card content detail response into its chapters
///
/// Keys may be strings or numbers; chapters without a key are skipped.
pub fn parse_card_detail(json: &str) -> Result<Vec<ChapterSummary>> {
    let raw: RawCardDetail =
        serde_json::from_str(json).map_err(|e| ApiError::Decode(format!("card detail: {e}")))?;

    let chapters = raw
        .card
        .and_then(|c| c.content)
        .map(|c| c.chapters)
        .unwrap_or_default();

    Ok(chapters
        .into_iter()
        .filter_map(|chapter| {
            let key = match chapter.key? {
                serde_json::Value::String(key) if !key.trim().is_empty() => key,
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let duration = chapter
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0 && *d <= f64::from(u32::MAX))
                .map(|d| d.round() as u32);
            Some(ChapterSummary {
                title: chapter.title.unwrap_or_else(|| format!("Chapter {key}")),
                key,
                duration,
                icon: chapter.display.and_then(|d| d.icon).filter(|url| !url.is_empty()),
            })
        })
        .collect())
}
