use std::future::{ready, Ready};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use yoto_api::{
    ApiError, CardId, CardSummary, CatalogListing, ChapterSummary, CommandApi, CommandRequest,
    DeviceId, DeviceRecord,
};
use yoto_catalog::{artwork_file_name, ArtworkFetcher, CatalogCache, CatalogConfig, CatalogError};

/// Writes a small file per fetch after a short delay
struct FileFetcher {
    dir: PathBuf,
    calls: AtomicUsize,
    fail: bool,
}

impl FileFetcher {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing(dir: PathBuf) -> Self {
        Self {
            fail: true,
            ..Self::new(dir)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtworkFetcher for FileFetcher {
    async fn fetch(&self, card_id: &CardId, reference: &str) -> Result<PathBuf, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        if self.fail {
            return Err("HTTP 404".to_string());
        }
        let path = self.dir.join(artwork_file_name(card_id, reference));
        tokio::fs::write(&path, reference.as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        Ok(path)
    }
}

/// Serves card content detail after a short delay
#[derive(Default)]
struct ChapterApi {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl ChapterApi {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandApi for ChapterApi {
    async fn send(&self, _request: &CommandRequest) -> yoto_api::Result<()> {
        Ok(())
    }

    async fn list_catalog(&self) -> yoto_api::Result<CatalogListing> {
        Ok(listing("https://img/c1.png"))
    }

    async fn card_chapters(&self, card_id: &CardId) -> yoto_api::Result<Vec<ChapterSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Network("content unavailable".into()));
        }
        Ok(vec![
            ChapterSummary {
                key: "01".into(),
                title: format!("{card_id} one"),
                duration: Some(90),
                icon: None,
            },
            ChapterSummary {
                key: "02".into(),
                title: format!("{card_id} two"),
                duration: None,
                icon: None,
            },
        ])
    }
}

fn listing(art: &str) -> CatalogListing {
    CatalogListing {
        devices: vec![DeviceRecord {
            id: DeviceId::new("d1"),
            name: "Kitchen".into(),
            model: "v3".into(),
            online: true,
        }],
        cards: vec![
            CardSummary {
                id: CardId::new("c1"),
                title: "Bedtime".into(),
                artwork: Some(art.to_string()),
            },
            CardSummary {
                id: CardId::new("c2"),
                title: "Plain".into(),
                artwork: None,
            },
        ],
    }
}

fn loaded(art: &str) -> Ready<Result<CatalogListing, ApiError>> {
    ready(Ok(listing(art)))
}

fn failed(message: &str) -> Ready<Result<CatalogListing, ApiError>> {
    ready(Err(ApiError::Network(message.to_string())))
}

#[tokio::test]
async fn test_empty_cache_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CatalogCache::new(CatalogConfig::default(), Arc::new(FileFetcher::new(dir.path().into())));
    let view = cache.get();
    assert!(view.stale);
    assert_eq!(view.entry.version, 0);
    assert!(view.cards().is_empty());
}

#[tokio::test]
async fn test_refresh_swaps_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CatalogCache::new(CatalogConfig::default(), Arc::new(FileFetcher::new(dir.path().into())));

    let before = cache.get().entry;
    let entry = cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();

    assert_eq!(entry.version, 1);
    let view = cache.get();
    assert!(!view.stale);
    assert_eq!(view.cards().len(), 2);
    assert_eq!(view.devices()[0].name, "Kitchen");
    // Earlier readers keep their snapshot
    assert!(before.cards.is_empty());
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_entry() {
    let dir = tempfile::tempdir().unwrap();
    let config = CatalogConfig::default().with_ttl(Duration::from_millis(40));
    let cache = CatalogCache::new(config, Arc::new(FileFetcher::new(dir.path().into())));
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    let err = cache
        .refresh_with(failed("timed out"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Refresh(ApiError::Network(_))));

    let view = cache.get();
    assert_eq!(view.entry.version, 1);
    assert_eq!(view.cards().len(), 2);
    assert!(view.stale, "entry is past its TTL");
}

#[tokio::test]
async fn test_concurrent_artwork_requests_share_one_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FileFetcher::new(dir.path().into()));
    let cache = CatalogCache::new(CatalogConfig::default(), fetcher.clone());
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();

    let card = CardId::new("c1");
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let card = card.clone();
            tokio::spawn(async move { cache.ensure_artwork(&card).await })
        })
        .collect();

    let mut paths = Vec::new();
    for task in tasks {
        paths.push(task.await.unwrap().unwrap());
    }

    assert_eq!(fetcher.calls(), 1);
    assert!(paths.iter().all(|p| p == &dir.path().join("c1.png")));
    assert_eq!(cache.fetches_in_flight(), 0);

    // Already materialized, no new fetch
    cache.ensure_artwork(&card).await.unwrap();
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_failures_share_the_error() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FileFetcher::failing(dir.path().into()));
    let cache = CatalogCache::new(CatalogConfig::default(), fetcher.clone());
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();

    let card = CardId::new("c1");
    let (a, b) = tokio::join!(cache.ensure_artwork(&card), cache.ensure_artwork(&card));
    assert_eq!(fetcher.calls(), 1);
    assert!(matches!(a, Err(CatalogError::ArtworkFetch { .. })));
    assert_eq!(a, b);

    // A later call retries
    let _ = cache.ensure_artwork(&card).await;
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_changed_reference_refetches() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FileFetcher::new(dir.path().into()));
    let cache = CatalogCache::new(CatalogConfig::default(), fetcher.clone());
    let card = CardId::new("c1");

    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();
    cache.ensure_artwork(&card).await.unwrap();

    cache.refresh_with(loaded("https://img/c1-v2.webp")).await.unwrap();
    let path = cache.ensure_artwork(&card).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(path, dir.path().join("c1.webp"));
}

#[tokio::test]
async fn test_deleted_file_refetches() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FileFetcher::new(dir.path().into()));
    let cache = CatalogCache::new(CatalogConfig::default(), fetcher.clone());
    let card = CardId::new("c1");
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();

    let path = cache.ensure_artwork(&card).await.unwrap();
    std::fs::remove_file(&path).unwrap();
    cache.ensure_artwork(&card).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_unknown_card_and_missing_artwork() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CatalogCache::new(CatalogConfig::default(), Arc::new(FileFetcher::new(dir.path().into())));
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();

    assert!(matches!(
        cache.ensure_artwork(&CardId::new("nope")).await,
        Err(CatalogError::UnknownCard(_))
    ));
    assert!(matches!(
        cache.ensure_artwork(&CardId::new("c2")).await,
        Err(CatalogError::NoArtwork(_))
    ));
}

#[tokio::test]
async fn test_persisted_entry_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("catalog.json");
    let config = CatalogConfig::default().with_persist_path(&path);

    let first = CatalogCache::open(config.clone(), Arc::new(FileFetcher::new(dir.path().into()))).await;
    first.refresh_with(loaded("https://img/c1.png")).await.unwrap();
    assert!(path.exists());

    let second = CatalogCache::open(config, Arc::new(FileFetcher::new(dir.path().into()))).await;
    let view = second.get();
    assert_eq!(view.entry.version, 1);
    assert_eq!(view.cards().len(), 2);
    assert!(view.stale, "loaded entries stay stale until refreshed");

    let entry = second.refresh_with(loaded("https://img/c1.png")).await.unwrap();
    assert_eq!(entry.version, 2);
    assert!(!second.get().stale);
}

#[tokio::test]
async fn test_corrupt_persisted_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let cache = CatalogCache::open(
        CatalogConfig::default().with_persist_path(&path),
        Arc::new(FileFetcher::new(dir.path().into())),
    )
    .await;
    assert_eq!(cache.get().entry.version, 0);
}

#[tokio::test]
async fn test_artwork_requests_around_fetch_completion_fetch_once() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FileFetcher::new(dir.path().into()));
    let cache = CatalogCache::new(CatalogConfig::default(), fetcher.clone());
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();

    // Arrivals spread before, during and after the 30ms fetch
    let card = CardId::new("c1");
    let tasks: Vec<_> = (0..24u64)
        .map(|i| {
            let cache = cache.clone();
            let card = card.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(i * 3)).await;
                cache.ensure_artwork(&card).await
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), dir.path().join("c1.png"));
    }

    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_chapter_requests_share_one_load() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CatalogCache::new(CatalogConfig::default(), Arc::new(FileFetcher::new(dir.path().into())));
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();
    let api = Arc::new(ChapterApi::default());

    let card = CardId::new("c1");
    let (a, b) = tokio::join!(
        cache.card_chapters(api.clone(), &card),
        cache.card_chapters(api.clone(), &card)
    );
    let chapters = a.unwrap();
    assert_eq!(api.calls(), 1);
    assert_eq!(chapters, b.unwrap());
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].title, "c1 one");

    // Cached until the next refresh
    cache.card_chapters(api.clone(), &card).await.unwrap();
    assert_eq!(api.calls(), 1);

    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();
    cache.card_chapters(api.clone(), &card).await.unwrap();
    assert_eq!(api.calls(), 2);
}

#[tokio::test]
async fn test_failed_chapter_load_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CatalogCache::new(CatalogConfig::default(), Arc::new(FileFetcher::new(dir.path().into())));
    cache.refresh_with(loaded("https://img/c1.png")).await.unwrap();
    let api = Arc::new(ChapterApi::default());
    api.fail.store(true, Ordering::SeqCst);

    let card = CardId::new("c2");
    let err = cache.card_chapters(api.clone(), &card).await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::ChapterFetch { source: ApiError::Network(_), .. }
    ));

    api.fail.store(false, Ordering::SeqCst);
    let chapters = cache.card_chapters(api.clone(), &card).await.unwrap();
    assert_eq!(chapters[1].key, "02");
    assert_eq!(api.calls(), 2);
}

#[tokio::test]
async fn test_chapters_for_unknown_card() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CatalogCache::new(CatalogConfig::default(), Arc::new(FileFetcher::new(dir.path().into())));
    let api = Arc::new(ChapterApi::default());

    let err = cache.card_chapters(api.clone(), &CardId::new("c1")).await.unwrap_err();
    assert_eq!(err, CatalogError::UnknownCard(CardId::new("c1")));
    assert_eq!(api.calls(), 0);
}
