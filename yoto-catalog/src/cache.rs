//! The catalog cache
//!
//! Readers get the current [`CacheEntry`] without taking a lock. A refresh
//! builds a complete new entry off to the side and swaps it in only once the
//! listing succeeded, so a reader never sees a half-written catalog and a
//! failed refresh leaves the previous one in place.
//!
//! Artwork and chapter lists are loaded lazily per card. Concurrent requests
//! for the same card share one in-flight load.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use yoto_api::{ApiError, CardId, CatalogListing, ChapterSummary, CommandApi};

use crate::artwork::ArtworkFetcher;
use crate::config::CatalogConfig;
use crate::entry::{CacheEntry, CatalogView};
use crate::error::{CatalogError, Result};

type ArtworkFuture = Shared<BoxFuture<'static, Result<PathBuf>>>;
type Chapters = Arc<[ChapterSummary]>;
type ChaptersFuture = Shared<BoxFuture<'static, Result<Chapters>>>;

/// Artwork stored locally for a given reference
#[derive(Debug, Clone)]
struct Materialized {
    reference: String,
    path: PathBuf,
    /// Distinguishes successive fetches of the same card
    seq: u64,
}

struct CatalogInner {
    config: CatalogConfig,
    current: ArcSwap<CacheEntry>,
    /// Set once a refresh succeeded in this process
    refreshed: AtomicBool,
    /// Serializes refreshes so versions stay ordered
    refresh_lock: tokio::sync::Mutex<()>,
    fetcher: Arc<dyn ArtworkFetcher>,
    materialized: Mutex<HashMap<CardId, Materialized>>,
    in_flight: Mutex<HashMap<CardId, ArtworkFuture>>,
    fetch_seq: AtomicU64,
    chapters: Mutex<HashMap<CardId, Chapters>>,
    chapters_in_flight: Mutex<HashMap<CardId, ChaptersFuture>>,
}

/// Library and artwork cache
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CatalogInner>,
}

impl CatalogCache {
    /// Creates an empty cache
    pub fn new(config: CatalogConfig, fetcher: Arc<dyn ArtworkFetcher>) -> Self {
        Self::with_entry(config, fetcher, CacheEntry::empty())
    }

    /// Creates a cache seeded from `persist_path` when one is configured
    ///
    /// A missing or unreadable file yields an empty cache. A loaded entry is
    /// reported stale until the first successful refresh.
    pub async fn open(config: CatalogConfig, fetcher: Arc<dyn ArtworkFetcher>) -> Self {
        let entry = match &config.persist_path {
            Some(path) => match load_entry(path).await {
                Ok(Some(entry)) => {
                    info!(
                        "Loaded catalog v{} ({} cards) from {}",
                        entry.version,
                        entry.cards.len(),
                        path.display()
                    );
                    entry
                }
                Ok(None) => CacheEntry::empty(),
                Err(e) => {
                    warn!("Ignoring persisted catalog: {}", e);
                    CacheEntry::empty()
                }
            },
            None => CacheEntry::empty(),
        };
        Self::with_entry(config, fetcher, entry)
    }

    fn with_entry(config: CatalogConfig, fetcher: Arc<dyn ArtworkFetcher>, entry: CacheEntry) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                config,
                current: ArcSwap::from_pointee(entry),
                refreshed: AtomicBool::new(false),
                refresh_lock: tokio::sync::Mutex::new(()),
                fetcher,
                materialized: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                fetch_seq: AtomicU64::new(0),
                chapters: Mutex::new(HashMap::new()),
                chapters_in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    /// Current snapshot and whether it is stale; never waits on the network
    pub fn get(&self) -> CatalogView {
        let entry = self.inner.current.load_full();
        let fresh = self.inner.refreshed.load(Ordering::Acquire)
            && entry.is_fresh_at(Utc::now(), self.inner.config.ttl);
        CatalogView { entry, stale: !fresh }
    }

    /// Refreshes from the command API's listing
    pub async fn refresh(&self, api: &dyn CommandApi) -> Result<Arc<CacheEntry>> {
        self.refresh_with(api.list_catalog()).await
    }

    /// Refreshes from any listing source
    ///
    /// On success the new entry replaces the current one in a single swap.
    /// On failure the current entry stays and the error is returned.
    pub async fn refresh_with<F>(&self, listing: F) -> Result<Arc<CacheEntry>>
    where
        F: Future<Output = std::result::Result<CatalogListing, ApiError>>,
    {
        let _guard = self.inner.refresh_lock.lock().await;

        let listing = match listing.await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Catalog refresh failed, keeping v{}: {}", self.inner.current.load().version, e);
                return Err(CatalogError::Refresh(e));
            }
        };

        let version = self.inner.current.load().version + 1;
        let entry = Arc::new(CacheEntry::from_listing(listing, version, Utc::now()));
        self.inner.current.store(Arc::clone(&entry));
        self.inner.refreshed.store(true, Ordering::Release);
        // Card contents may have changed with the library
        self.inner.chapters.lock().clear();
        info!(
            "Catalog refreshed to v{} ({} cards, {} devices)",
            version,
            entry.cards.len(),
            entry.devices.len()
        );

        if let Some(path) = &self.inner.config.persist_path {
            if let Err(e) = persist_entry(path, &entry).await {
                error!("Failed to persist catalog: {}", e);
            }
        }

        Ok(entry)
    }

    /// Local path of a card's artwork, fetching it if needed
    ///
    /// Concurrent calls for the same card share one fetch and all receive
    /// its result.
    pub async fn ensure_artwork(&self, card_id: &CardId) -> Result<PathBuf> {
        let entry = self.inner.current.load_full();
        if entry.card(card_id).is_none() {
            return Err(CatalogError::UnknownCard(card_id.clone()));
        }
        let Some(reference) = entry.artwork_reference(card_id).map(str::to_string) else {
            return Err(CatalogError::NoArtwork(card_id.clone()));
        };

        let known = self.materialized(card_id, &reference);
        if let Some(stored) = &known {
            if tokio::fs::try_exists(&stored.path).await.unwrap_or(false) {
                return Ok(stored.path.clone());
            }
        }

        let fetch = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(card_id) {
                Some(fetch) => fetch.clone(),
                None => {
                    // A fetch may have completed since the check above
                    if let Some(stored) = self.materialized(card_id, &reference) {
                        if known.as_ref().map(|k| k.seq) != Some(stored.seq) {
                            return Ok(stored.path);
                        }
                    }
                    debug!("Fetching artwork for {}", card_id);
                    let fetch = self.fetch_future(card_id.clone(), reference);
                    in_flight.insert(card_id.clone(), fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    fn materialized(&self, card_id: &CardId, reference: &str) -> Option<Materialized> {
        self.inner
            .materialized
            .lock()
            .get(card_id)
            .filter(|stored| stored.reference == reference)
            .cloned()
    }

    fn fetch_future(&self, card_id: CardId, reference: String) -> ArtworkFuture {
        let inner = Arc::clone(&self.inner);
        async move {
            let result = inner
                .fetcher
                .fetch(&card_id, &reference)
                .await
                .map_err(|message| CatalogError::ArtworkFetch {
                    card_id: card_id.clone(),
                    message,
                });

            match &result {
                Ok(path) => {
                    let seq = inner.fetch_seq.fetch_add(1, Ordering::Relaxed) + 1;
                    inner.materialized.lock().insert(
                        card_id.clone(),
                        Materialized {
                            reference,
                            path: path.clone(),
                            seq,
                        },
                    );
                }
                Err(e) => warn!("{}", e),
            }
            inner.in_flight.lock().remove(&card_id);
            result
        }
        .boxed()
        .shared()
    }

    /// Chapters of a card, loading its content detail on first use
    ///
    /// Results are kept until the next successful refresh. Concurrent calls
    /// for the same card share one load; a failed load is not cached.
    pub async fn card_chapters(&self, api: Arc<dyn CommandApi>, card_id: &CardId) -> Result<Chapters> {
        if self.inner.current.load().card(card_id).is_none() {
            return Err(CatalogError::UnknownCard(card_id.clone()));
        }

        let load = {
            let mut in_flight = self.inner.chapters_in_flight.lock();
            if let Some(chapters) = self.inner.chapters.lock().get(card_id) {
                return Ok(Arc::clone(chapters));
            }
            in_flight
                .entry(card_id.clone())
                .or_insert_with(|| {
                    debug!("Loading chapters for {}", card_id);
                    self.chapters_future(api, card_id.clone())
                })
                .clone()
        };

        load.await
    }

    fn chapters_future(&self, api: Arc<dyn CommandApi>, card_id: CardId) -> ChaptersFuture {
        let inner = Arc::clone(&self.inner);
        async move {
            let result = match api.card_chapters(&card_id).await {
                Ok(chapters) => {
                    let chapters: Chapters = chapters.into();
                    debug!("Loaded {} chapters for {}", chapters.len(), card_id);
                    inner.chapters.lock().insert(card_id.clone(), Arc::clone(&chapters));
                    Ok(chapters)
                }
                Err(source) => {
                    let e = CatalogError::ChapterFetch {
                        card_id: card_id.clone(),
                        source,
                    };
                    warn!("{}", e);
                    Err(e)
                }
            };
            inner.chapters_in_flight.lock().remove(&card_id);
            result
        }
        .boxed()
        .shared()
    }

    /// Number of artwork fetches currently running
    pub fn fetches_in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }
}

async fn load_entry(path: &Path) -> Result<Option<CacheEntry>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CatalogError::Persistence(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CatalogError::Persistence(format!("{}: {}", path.display(), e)))
}

/// Writes to a sibling temp file then renames over the target
async fn persist_entry(path: &Path, entry: &CacheEntry) -> Result<()> {
    let json = serde_json::to_vec_pretty(entry)
        .map_err(|e| CatalogError::Persistence(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CatalogError::Persistence(format!("{}: {}", parent.display(), e)))?;
    }
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| CatalogError::Persistence(format!("{}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| CatalogError::Persistence(format!("{}: {}", path.display(), e)))?;

    debug!("Persisted catalog v{} to {}", entry.version, path.display());
    Ok(())
}
