//! # Yoto SDK - coordination engine for Yoto players
//!
//! Issues playback commands through a cloud command API and reconciles each
//! player's state from an asynchronous, unordered event stream, while
//! serving a cached card library to the UI.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use yoto_sdk::{Coordinator, Notification, PlayRequest};
//!
//! let (events_tx, events_rx) = yoto_sdk::event_channel();
//! let coordinator = Coordinator::builder(api, transport, fetcher)
//!     .persist_catalog(cache_dir.join("catalog.json"))
//!     .build()
//!     .await?;
//! coordinator.attach_transport(events_rx);
//!
//! coordinator.subscribe(|n: &Notification| {
//!     if let Notification::DeviceStateChanged { device_id, state, .. } = n {
//!         println!("{device_id}: {:?}", state.status);
//!     }
//! });
//!
//! // The broker client forwards its callbacks
//! events_tx.connected()?;
//!
//! let player = coordinator.preferred_device().expect("a player online");
//! let handle = coordinator.play(&player.id, PlayRequest::card("4sJ2x")).await?;
//! let outcome = handle.wait().await; // Confirmed, TimedOut or Failed
//! ```
//!
//! ## Architecture
//!
//! ```text
//! yoto-sdk        Coordinator, device registry, notifications
//!     |-- yoto-dispatch   one pending command per device, timeouts, confirmation
//!     |-- yoto-state      timestamp-ordered per-device playback state
//!     |-- yoto-catalog    library snapshot, TTL, artwork fetch de-duplication
//!     |-- yoto-stream     transport session seam and topic layout
//!     `-- yoto-api        ids, commands, CommandApi seam, listing decoding
//! ```

// Main exports
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use config::CoordinatorConfig;
pub use error::{Result, SdkError};
pub use notification::{Notification, Observer, ObserverId};
pub use registry::ConnectivityChange;

// Re-export commonly used types from the member crates
pub use yoto_api::{
    ApiError, CardId, CardSummary, CatalogListing, ChapterSummary, CommandApi, CommandId,
    CommandKind, CommandRequest, DeviceId, DeviceRecord, PlayRequest,
};
pub use yoto_catalog::{artwork_file_name, ArtworkFetcher, CacheEntry, CatalogConfig, CatalogError, CatalogView};
pub use yoto_dispatch::{
    Command, CommandHandle, CommandStatus, DispatchConfig, DispatchError, FailureReason,
};
pub use yoto_state::{
    logging, ApplyOutcome, Connectivity, Device, PlaybackState, PlaybackStatus, StateField,
    Transition,
};
pub use yoto_stream::{
    event_channel, EventSender, TransportError, TransportEvent, TransportMessage, TransportSession,
};

// Internal modules
mod config;
mod coordinator;
mod error;
mod notification;
mod registry;
