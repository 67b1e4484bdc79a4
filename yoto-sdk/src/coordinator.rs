//! Coordinator - main entry point for the SDK
//!
//! Owns the device registry and wires the state machine, command dispatcher
//! and catalog cache to the command API and the event transport.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use yoto_api::{CardId, ChapterSummary, CommandApi, CommandKind, CommandPayload, DeviceId, PlayRequest};
use yoto_catalog::{ArtworkFetcher, CacheEntry, CatalogCache, CatalogView};
use yoto_dispatch::{Command, CommandDispatcher, CommandHandle};
use yoto_state::{ApplyOutcome, Connectivity, Device, PlaybackState, StateMachine, Transition};
use yoto_stream::{DeviceTopic, TopicChannel, TransportEvent, TransportSession};

use crate::config::CoordinatorConfig;
use crate::error::{Result, SdkError};
use crate::notification::{Notification, NotificationHub, Observer, ObserverId};
use crate::registry::{ConnectivityChange, DeviceRegistry};

struct CoordinatorInner {
    api: Arc<dyn CommandApi>,
    transport: Arc<dyn TransportSession>,
    state: Arc<StateMachine>,
    dispatcher: CommandDispatcher,
    catalog: CatalogCache,
    registry: DeviceRegistry,
    hub: NotificationHub,
    /// Devices subscribed on the current transport session
    subscribed: Mutex<HashSet<DeviceId>>,
    pumps: Mutex<Vec<AbortHandle>>,
    /// Catalog refresh and subscriptions started by the pump on connect
    connect_task: Mutex<Option<AbortHandle>>,
    connected: AtomicBool,
    shut_down: AtomicBool,
}

/// Coordinates playback across a set of players
///
/// Cheap to clone; clones share the same engine.
///
/// # Example
///
/// ```rust,ignore
/// use yoto_sdk::{Coordinator, PlayRequest};
///
/// let coordinator = Coordinator::builder(api, transport, fetcher).build().await?;
/// let pump = coordinator.attach_transport(transport_events);
///
/// let player = coordinator.preferred_device().ok_or("no players online")?;
/// let handle = coordinator.play(&player.id, PlayRequest::card("4sJ2x")).await?;
/// println!("play -> {:?}", handle.wait().await);
///
/// coordinator.shutdown().await;
/// ```
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl Coordinator {
    pub fn builder(
        api: Arc<dyn CommandApi>,
        transport: Arc<dyn TransportSession>,
        fetcher: Arc<dyn ArtworkFetcher>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder::new(api, transport, fetcher)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Starts playing a card on a device
    pub async fn play(&self, device_id: &DeviceId, request: PlayRequest) -> Result<CommandHandle> {
        self.submit(device_id, CommandKind::Play, request.into()).await
    }

    /// Plays a card from its first chapter and track
    pub async fn play_card(&self, device_id: &DeviceId, card_id: impl Into<CardId>) -> Result<CommandHandle> {
        self.play(device_id, PlayRequest::card(card_id)).await
    }

    pub async fn pause(&self, device_id: &DeviceId) -> Result<CommandHandle> {
        self.submit(device_id, CommandKind::Pause, CommandPayload::None).await
    }

    pub async fn resume(&self, device_id: &DeviceId) -> Result<CommandHandle> {
        self.submit(device_id, CommandKind::Resume, CommandPayload::None).await
    }

    pub async fn stop(&self, device_id: &DeviceId) -> Result<CommandHandle> {
        self.submit(device_id, CommandKind::Stop, CommandPayload::None).await
    }

    pub async fn next(&self, device_id: &DeviceId) -> Result<CommandHandle> {
        self.submit(device_id, CommandKind::Next, CommandPayload::None).await
    }

    pub async fn previous(&self, device_id: &DeviceId) -> Result<CommandHandle> {
        self.submit(device_id, CommandKind::Previous, CommandPayload::None).await
    }

    async fn submit(
        &self,
        device_id: &DeviceId,
        kind: CommandKind,
        payload: CommandPayload,
    ) -> Result<CommandHandle> {
        if self.is_shut_down() {
            return Err(SdkError::ShutDown);
        }
        if !self.inner.registry.contains(device_id) {
            return Err(SdkError::DeviceNotFound(device_id.clone()));
        }
        debug!("Submitting {} to {}", kind, device_id);
        Ok(self.inner.dispatcher.submit(device_id.clone(), kind, payload).await?)
    }

    /// The command currently awaiting confirmation on a device
    pub fn pending_command(&self, device_id: &DeviceId) -> Option<Command> {
        self.inner.dispatcher.pending(device_id)
    }

    /// Most recently finished commands, newest first
    pub fn recent_commands(&self, limit: usize) -> Vec<Command> {
        self.inner.dispatcher.recent(limit)
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Registers an observer; notifications are delivered on a background task
    pub fn subscribe(&self, observer: impl Observer + 'static) -> ObserverId {
        self.inner.hub.subscribe(Arc::new(observer))
    }

    /// Removes an observer, returning whether it was registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.inner.hub.unsubscribe(id)
    }

    /// Async stream of every notification
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.hub.receiver()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.hub.observer_count()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Spawns a task feeding transport events into the coordinator
    ///
    /// Connect work (catalog refresh, subscriptions) runs on its own task so
    /// messages keep being applied meanwhile. The pump ends when the sender
    /// side closes or on shutdown.
    pub fn attach_transport(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) -> JoinHandle<()> {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            info!("Transport pump started");
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Connected => coordinator.spawn_connect(),
                    other => coordinator.handle_transport_event(other).await,
                }
            }
            info!("Transport pump stopped");
        });
        self.inner.pumps.lock().push(handle.abort_handle());
        handle
    }

    /// Handles one transport event, finishing any connect work before
    /// returning
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        if self.is_shut_down() {
            return;
        }
        match event {
            TransportEvent::Connected => {
                self.mark_connected();
                self.connect_work().await;
            }
            TransportEvent::Disconnected { reason } => self.on_disconnected(reason.as_deref()),
            TransportEvent::Message(message) => {
                self.ingest(&message.topic, &message.payload);
            }
        }
    }

    /// Applies one raw message from a device topic
    ///
    /// Returns `None` for messages that do not carry device state.
    pub fn ingest(&self, topic: &str, payload: &[u8]) -> Option<ApplyOutcome> {
        if self.is_shut_down() {
            return None;
        }

        let topic: DeviceTopic = match topic.parse() {
            Ok(topic) => topic,
            Err(e) => {
                warn!("Ignoring message: {}", e);
                return None;
            }
        };

        if topic.channel == TopicChannel::Response {
            debug!(
                "Command response from {}: {}",
                topic.device_id,
                String::from_utf8_lossy(payload)
            );
            return None;
        }

        let outcome = self.inner.state.apply(Some(&topic.device_id), payload);
        if let ApplyOutcome::Applied(transition) = &outcome {
            self.on_transition(transition);
        }
        Some(outcome)
    }

    fn on_transition(&self, transition: &Transition) {
        self.inner.dispatcher.observe(transition);

        if transition.changed() {
            self.notify_state(transition);
        }

        // A device that reports is reachable unless it says otherwise
        let connectivity = transition
            .delta
            .as_ref()
            .and_then(|delta| delta.online)
            .map(Connectivity::from_online)
            .unwrap_or(Connectivity::Online);
        if let Some(change) = self.inner.registry.set_connectivity(&transition.device_id, connectivity) {
            self.notify_connectivity(change);
        }
    }

    fn mark_connected(&self) {
        info!("Transport connected");
        self.cancel_connect_work();
        self.inner.connected.store(true, Ordering::Release);
        self.inner.subscribed.lock().clear();
        self.inner
            .hub
            .notify(Notification::TransportConnectivity { connected: true });
    }

    fn spawn_connect(&self) {
        if self.is_shut_down() {
            return;
        }
        self.mark_connected();
        let coordinator = self.clone();
        let task = tokio::spawn(async move { coordinator.connect_work().await });
        *self.inner.connect_task.lock() = Some(task.abort_handle());
    }

    async fn connect_work(&self) {
        // Failure is reported to observers; subscribe whatever is already known
        let _ = self.refresh_catalog().await;
        self.subscribe_new_devices().await;
    }

    fn cancel_connect_work(&self) {
        if let Some(task) = self.inner.connect_task.lock().take() {
            task.abort();
        }
    }

    fn on_disconnected(&self, reason: Option<&str>) {
        warn!("Transport disconnected: {}", reason.unwrap_or("no reason given"));
        self.cancel_connect_work();
        self.inner.connected.store(false, Ordering::Release);
        self.inner.subscribed.lock().clear();

        for change in self.inner.registry.set_all(Connectivity::Unknown) {
            self.notify_connectivity(change);
        }
        for transition in self.inner.state.mark_all_stale() {
            self.notify_state(&transition);
        }
        self.inner
            .hub
            .notify(Notification::TransportConnectivity { connected: false });
    }

    /// Subscribes every registered device not yet subscribed this session
    async fn subscribe_new_devices(&self) {
        let pending: Vec<DeviceId> = {
            let subscribed = self.inner.subscribed.lock();
            self.inner
                .registry
                .ids()
                .into_iter()
                .filter(|id| !subscribed.contains(id))
                .collect()
        };

        for device_id in pending {
            if let Err(e) = self.inner.transport.subscribe_device(&device_id).await {
                warn!("Failed to subscribe {}: {}", device_id, e);
                continue;
            }
            self.inner.subscribed.lock().insert(device_id.clone());
            if let Err(e) = self.inner.transport.request_status(&device_id).await {
                warn!("Failed to request status from {}: {}", device_id, e);
            }
            debug!("Subscribed {}", device_id);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Refreshes the library and device list
    ///
    /// On failure the previous catalog keeps being served.
    pub async fn refresh_catalog(&self) -> Result<Arc<CacheEntry>> {
        match self.inner.catalog.refresh(self.inner.api.as_ref()).await {
            Ok(entry) => {
                for change in self.inner.registry.apply_listing(&entry.devices) {
                    self.notify_connectivity(change);
                }
                self.inner.hub.notify(Notification::CatalogRefreshed {
                    version: entry.version,
                    cards: entry.cards.len(),
                });
                if self.is_connected() {
                    self.subscribe_new_devices().await;
                }
                Ok(entry)
            }
            Err(e) => {
                self.inner.hub.notify(Notification::CatalogRefreshFailed {
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Current library snapshot, possibly stale
    pub fn library(&self) -> CatalogView {
        self.inner.catalog.get()
    }

    /// Local path of a card's artwork, fetching it if needed
    pub async fn ensure_artwork(&self, card_id: &CardId) -> Result<PathBuf> {
        Ok(self.inner.catalog.ensure_artwork(card_id).await?)
    }

    /// Chapters of a card, loaded from its content detail on first use
    pub async fn card_chapters(&self, card_id: &CardId) -> Result<Arc<[ChapterSummary]>> {
        Ok(self
            .inner
            .catalog
            .card_chapters(Arc::clone(&self.inner.api), card_id)
            .await?)
    }

    // ========================================================================
    // Devices and state
    // ========================================================================

    pub fn device(&self, device_id: &DeviceId) -> Option<Device> {
        self.inner.registry.get(device_id)
    }

    /// Every known device in listing order
    pub fn devices(&self) -> Vec<Device> {
        self.inner.registry.all()
    }

    /// First online device in listing order
    pub fn preferred_device(&self) -> Option<Device> {
        self.inner.registry.preferred()
    }

    pub fn state(&self, device_id: &DeviceId) -> Option<PlaybackState> {
        self.inner.state.snapshot(device_id)
    }

    pub fn states(&self) -> Vec<PlaybackState> {
        self.inner.state.snapshot_all()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stops the engine
    ///
    /// Pending commands fail with a shutdown reason, device topics are
    /// unsubscribed, and queued notifications are delivered before this
    /// returns.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down coordinator");

        let pumps = std::mem::take(&mut *self.inner.pumps.lock());
        for pump in pumps {
            pump.abort();
        }
        self.cancel_connect_work();

        self.inner.dispatcher.shutdown();

        let subscribed: Vec<DeviceId> = self.inner.subscribed.lock().drain().collect();
        for device_id in subscribed {
            if let Err(e) = self.inner.transport.unsubscribe_device(&device_id).await {
                warn!("Failed to unsubscribe {}: {}", device_id, e);
            }
        }

        self.inner.hub.stop().await;
        info!("Coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    fn notify_state(&self, transition: &Transition) {
        self.inner.hub.notify(Notification::DeviceStateChanged {
            device_id: transition.device_id.clone(),
            state: transition.current.clone(),
            changes: transition.changes.clone(),
        });
    }

    fn notify_connectivity(&self, change: ConnectivityChange) {
        debug!(
            "{} connectivity {:?} -> {:?}",
            change.device_id, change.previous, change.current
        );
        self.inner.hub.notify(Notification::ConnectivityChanged(change));
    }
}

// ============================================================================
// CoordinatorBuilder
// ============================================================================

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder {
    api: Arc<dyn CommandApi>,
    transport: Arc<dyn TransportSession>,
    fetcher: Arc<dyn ArtworkFetcher>,
    config: CoordinatorConfig,
}

impl CoordinatorBuilder {
    pub fn new(
        api: Arc<dyn CommandApi>,
        transport: Arc<dyn TransportSession>,
        fetcher: Arc<dyn ArtworkFetcher>,
    ) -> Self {
        Self {
            api,
            transport,
            fetcher,
            config: CoordinatorConfig::default(),
        }
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// How long a command may wait for confirmation
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.dispatch.command_timeout = timeout;
        self
    }

    /// Age after which the catalog is reported stale
    pub fn catalog_ttl(mut self, ttl: Duration) -> Self {
        self.config.catalog.ttl = ttl;
        self
    }

    /// Keeps the last catalog on disk between runs
    pub fn persist_catalog(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.catalog.persist_path = Some(path.into());
        self
    }

    /// Builds the coordinator; must run inside a Tokio runtime
    pub async fn build(self) -> Result<Coordinator> {
        self.config.validate()?;

        let state = Arc::new(StateMachine::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let dispatcher = CommandDispatcher::with_updates(
            Arc::clone(&self.api),
            Arc::clone(&state),
            self.config.dispatch.clone(),
            command_tx,
        );
        let catalog = CatalogCache::open(self.config.catalog.clone(), self.fetcher).await;
        let hub = NotificationHub::spawn(self.config.notification_capacity, command_rx);

        let coordinator = Coordinator {
            inner: Arc::new(CoordinatorInner {
                api: self.api,
                transport: self.transport,
                state,
                dispatcher,
                catalog,
                registry: DeviceRegistry::default(),
                hub,
                subscribed: Mutex::new(HashSet::new()),
                pumps: Mutex::new(Vec::new()),
                connect_task: Mutex::new(None),
                connected: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
            }),
        };

        // Devices from a persisted catalog are usable before the first refresh
        let seeded = coordinator.inner.catalog.get();
        for change in coordinator.inner.registry.apply_listing(seeded.devices()) {
            coordinator.notify_connectivity(change);
        }

        info!(
            "Coordinator created (command timeout {:?}, catalog ttl {:?})",
            self.config.dispatch.command_timeout, self.config.catalog.ttl
        );
        Ok(coordinator)
    }
}
