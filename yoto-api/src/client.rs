//! The command API seam
//!
//! HTTP plumbing, authentication and token renewal live behind this trait.
//! The coordination engine only needs to know whether a command was accepted
//! and what the account's catalog and card contents look like.

use async_trait::async_trait;

use crate::catalog::{CatalogListing, ChapterSummary};
use crate::command::CommandRequest;
use crate::error::Result;
use crate::ids::CardId;

/// Client for the cloud command API
#[async_trait]
pub trait CommandApi: Send + Sync {
    /// Sends a command to its device
    ///
    /// `Ok(())` means the API accepted the request. It says nothing about
    /// whether the device acted on it; that is learned from the event stream.
    async fn send(&self, request: &CommandRequest) -> Result<()>;

    /// Fetches the device list and card library in one go
    async fn list_catalog(&self) -> Result<CatalogListing>;

    /// Fetches a card's content detail and returns its chapters
    async fn card_chapters(&self, card_id: &CardId) -> Result<Vec<ChapterSummary>>;
}
