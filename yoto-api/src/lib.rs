//! Command and catalog API boundary for Yoto players
//!
//! This crate holds the identity types shared across the workspace, the
//! command vocabulary with its wire encoding, and the [`CommandApi`] trait
//! that the coordination engine drives.
//!
//! ```rust,ignore
//! use yoto_api::{CommandKind, CommandRequest, DeviceId, PlayRequest};
//!
//! let play = PlayRequest::card("4sJ2x").with_chapter("3");
//! let request = CommandRequest::new(DeviceId::new("y2abc"), CommandKind::Play, play.into());
//!
//! assert_eq!(request.topic(), "device/y2abc/command/card-play");
//! api.send(&request).await?;
//! ```

pub mod catalog;
pub mod client;
pub mod command;
pub mod error;
pub mod ids;

pub use catalog::{parse_card_detail, CardSummary, CatalogListing, ChapterSummary, DeviceRecord};
pub use client::CommandApi;
pub use command::{normalize_key, CommandKind, CommandPayload, CommandRequest, PlayRequest};
pub use error::{ApiError, Result};
pub use ids::{CardId, CommandId, DeviceId};
