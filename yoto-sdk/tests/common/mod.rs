//! In-memory collaborators for coordinator tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use yoto_sdk::{
    artwork_file_name, ApiError, ArtworkFetcher, CardId, CardSummary, CatalogListing,
    ChapterSummary, CommandApi, CommandRequest, Coordinator, DeviceId, DeviceRecord, Notification,
    TransportSession,
};
use yoto_stream::{TransportError, TransportResult};

pub struct MockApi {
    pub sent: Mutex<Vec<CommandRequest>>,
    pub listing: Mutex<Result<CatalogListing, ApiError>>,
    pub reject_with: Mutex<Option<String>>,
    pub listings_served: AtomicUsize,
    /// Added latency for catalog listings
    pub listing_delay: Mutex<Option<Duration>>,
    pub chapter_loads: AtomicUsize,
}

impl MockApi {
    pub fn new(listing: CatalogListing) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            listing: Mutex::new(Ok(listing)),
            reject_with: Mutex::new(None),
            listings_served: AtomicUsize::new(0),
            listing_delay: Mutex::new(None),
            chapter_loads: AtomicUsize::new(0),
        }
    }

    pub fn set_listing(&self, listing: Result<CatalogListing, ApiError>) {
        *self.listing.lock() = listing;
    }

    pub fn reject(&self, message: &str) {
        *self.reject_with.lock() = Some(message.to_string());
    }

    pub fn sent_topics(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.topic()).collect()
    }
}

#[async_trait]
impl CommandApi for MockApi {
    async fn send(&self, request: &CommandRequest) -> Result<(), ApiError> {
        self.sent.lock().push(request.clone());
        match self.reject_with.lock().clone() {
            Some(message) => Err(ApiError::Rejected(message)),
            None => Ok(()),
        }
    }

    async fn list_catalog(&self) -> Result<CatalogListing, ApiError> {
        let delay = *self.listing_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.listings_served.fetch_add(1, Ordering::SeqCst);
        self.listing.lock().clone()
    }

    async fn card_chapters(&self, card_id: &CardId) -> Result<Vec<ChapterSummary>, ApiError> {
        self.chapter_loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok((1..=3)
            .map(|n| ChapterSummary {
                key: format!("{n:02}"),
                title: format!("{card_id} chapter {n}"),
                duration: Some(60 * n),
                icon: None,
            })
            .collect())
    }
}

/// Records every session call as "action:device"
#[derive(Default)]
pub struct MockTransport {
    pub calls: Mutex<Vec<String>>,
    pub fail_subscribe: Mutex<Option<DeviceId>>,
}

impl MockTransport {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TransportSession for MockTransport {
    async fn subscribe_device(&self, device_id: &DeviceId) -> TransportResult<()> {
        if self.fail_subscribe.lock().as_ref() == Some(device_id) {
            return Err(TransportError::SubscriptionFailed {
                device: device_id.to_string(),
                reason: "denied".into(),
            });
        }
        self.calls.lock().push(format!("subscribe:{device_id}"));
        Ok(())
    }

    async fn unsubscribe_device(&self, device_id: &DeviceId) -> TransportResult<()> {
        self.calls.lock().push(format!("unsubscribe:{device_id}"));
        Ok(())
    }

    async fn request_status(&self, device_id: &DeviceId) -> TransportResult<()> {
        self.calls.lock().push(format!("status:{device_id}"));
        Ok(())
    }
}

pub struct MockFetcher {
    pub dir: PathBuf,
    pub calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtworkFetcher for MockFetcher {
    async fn fetch(&self, card_id: &CardId, reference: &str) -> Result<PathBuf, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let path = self.dir.join(artwork_file_name(card_id, reference));
        tokio::fs::write(&path, b"art").await.map_err(|e| e.to_string())?;
        Ok(path)
    }
}

pub fn device_record(id: &str, online: bool) -> DeviceRecord {
    DeviceRecord {
        id: DeviceId::new(id),
        name: format!("Player {id}"),
        model: "v3".into(),
        online,
    }
}

pub fn card(id: &str) -> CardSummary {
    CardSummary {
        id: CardId::new(id),
        title: format!("Card {id}"),
        artwork: Some(format!("https://img.example/{id}.png")),
    }
}

pub fn default_listing() -> CatalogListing {
    CatalogListing {
        devices: vec![device_record("d1", true), device_record("d2", false)],
        cards: vec![card("X"), card("Y")],
    }
}

pub struct Fixture {
    pub api: Arc<MockApi>,
    pub transport: Arc<MockTransport>,
    pub fetcher: Arc<MockFetcher>,
    pub coordinator: Coordinator,
    pub notifications: broadcast::Receiver<Notification>,
    pub dir: tempfile::TempDir,
}

pub async fn fixture_with(timeout: Duration) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(MockApi::new(default_listing()));
    let transport = Arc::new(MockTransport::default());
    let fetcher = Arc::new(MockFetcher::new(dir.path().to_path_buf()));

    let coordinator = Coordinator::builder(api.clone(), transport.clone(), fetcher.clone())
        .command_timeout(timeout)
        .build()
        .await
        .unwrap();
    let notifications = coordinator.notifications();

    Fixture {
        api,
        transport,
        fetcher,
        coordinator,
        notifications,
        dir,
    }
}

/// Coordinator with the catalog loaded
pub async fn fixture() -> Fixture {
    let f = fixture_with(Duration::from_secs(5)).await;
    f.coordinator.refresh_catalog().await.unwrap();
    f
}

/// Waits for the first notification matching `pred`
pub async fn next_matching<F>(rx: &mut broadcast::Receiver<Notification>, mut pred: F) -> Notification
where
    F: FnMut(&Notification) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(n) if pred(&n) => return n,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("notification channel closed: {e}"),
            }
        }
    })
    .await
    .expect("notification not received in time")
}
