//! Immutable catalog snapshots

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yoto_api::{CardId, CardSummary, CatalogListing, DeviceRecord};

/// One complete catalog listing
///
/// Never mutated after construction; a refresh builds a new entry and swaps
/// it in whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Increases by one with every successful refresh
    pub version: u64,
    /// When the listing was fetched, `None` for the empty initial entry
    pub fetched_at: Option<DateTime<Utc>>,
    pub devices: Vec<DeviceRecord>,
    /// Library in listing order
    pub cards: Vec<CardSummary>,
    /// Card id to remote artwork reference
    pub artwork: HashMap<CardId, String>,
}

impl CacheEntry {
    pub fn empty() -> Self {
        Self {
            version: 0,
            fetched_at: None,
            devices: Vec::new(),
            cards: Vec::new(),
            artwork: HashMap::new(),
        }
    }

    pub fn from_listing(listing: CatalogListing, version: u64, fetched_at: DateTime<Utc>) -> Self {
        let artwork = listing
            .cards
            .iter()
            .filter_map(|card| Some((card.id.clone(), card.artwork.clone()?)))
            .collect();
        Self {
            version,
            fetched_at: Some(fetched_at),
            devices: listing.devices,
            cards: listing.cards,
            artwork,
        }
    }

    pub fn card(&self, card_id: &CardId) -> Option<&CardSummary> {
        self.cards.iter().find(|c| &c.id == card_id)
    }

    pub fn artwork_reference(&self, card_id: &CardId) -> Option<&str> {
        self.artwork.get(card_id).map(String::as_str)
    }

    /// Whether the entry is within `ttl` of `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Some(fetched_at) = self.fetched_at else {
            return false;
        };
        match (now - fetched_at).to_std() {
            Ok(age) => age <= ttl,
            // Fetched "in the future" after a clock step
            Err(_) => true,
        }
    }
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self::empty()
    }
}

/// A read of the cache
#[derive(Debug, Clone)]
pub struct CatalogView {
    pub entry: Arc<CacheEntry>,
    /// Past its TTL, never refreshed, or only loaded from disk
    pub stale: bool,
}

impl CatalogView {
    pub fn cards(&self) -> &[CardSummary] {
        &self.entry.cards
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.entry.devices
    }
}
