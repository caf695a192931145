// ── Controller abstraction ──
//
// Full lifecycle management for a hub connection: the push channel,
// reconciliation into the store, command routing, and the diagnostics
// feed.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use meshly_api::{EventStreamHandle, HubClient, MeshEvent, PushMessage, ReconnectConfig};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::HubConfig;
use crate::correlate::CorrelationTracker;
use crate::error::CoreError;
use crate::guard::{ControlTarget, InteractionGuard};
use crate::model::BROADCAST_GROUP_ID;
use crate::reconcile::{Reconciler, Update};
use crate::store::DataStore;

const COMMAND_CHANNEL_SIZE: usize = 64;
const UPDATE_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── Diagnostics feed ─────────────────────────────────────────────

/// One timestamped line of the diagnostics feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub at: DateTime<Utc>,
    pub line: String,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns the push channel
/// lifecycle, reconciles events into the [`DataStore`], and routes
/// [`Command`]s to the hub.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: HubConfig,
    client: HubClient,
    store: Arc<DataStore>,
    guard: Arc<InteractionGuard>,
    tracker: Arc<CorrelationTracker>,
    connection_state: watch::Sender<ConnectionState>,
    /// Latched sync flag: set on `SyncComplete`, cleared whenever the
    /// stream (re)connects. A `watch` so late subscribers still see it.
    synced: watch::Sender<bool>,
    update_tx: broadcast::Sender<Arc<Update>>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current connection -- cancelled on
    /// disconnect, replaced on reconnect (avoids permanent cancellation).
    cancel_child: Mutex<CancellationToken>,
    sse_handle: Mutex<Option<EventStreamHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    feed: std::sync::Mutex<VecDeque<FeedEntry>>,
}

impl Controller {
    /// Create a new Controller from configuration. Does NOT connect --
    /// call [`connect()`](Self::connect) to open the push channel.
    pub fn new(config: HubConfig) -> Result<Self, CoreError> {
        let client = HubClient::new(config.url.clone(), config.timeout)?;
        let store = Arc::new(DataStore::new());
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (synced, _) = watch::channel(false);
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                store,
                guard: Arc::new(InteractionGuard::new()),
                tracker: Arc::new(CorrelationTracker::new()),
                connection_state,
                synced,
                update_tx,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                sse_handle: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                feed: std::sync::Mutex::new(VecDeque::new()),
            }),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// The interaction guard. Views call `begin_edit`/`end_edit` here
    /// as the user grabs and releases controls.
    pub fn guard(&self) -> &Arc<InteractionGuard> {
        &self.inner.guard
    }

    /// Correlation state: scan candidates and outstanding operations.
    pub fn tracker(&self) -> &Arc<CorrelationTracker> {
        &self.inner.tracker
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open the push channel and start background tasks.
    ///
    /// Returns as soon as the stream task is spawned; the hub replays
    /// full state on connect, so consumers that need a populated store
    /// should call [`wait_for_sync()`](Self::wait_for_sync) next.
    pub async fn connect(&self) -> Result<(), CoreError> {
        // `send_replace`, not `send`: the value must update even while
        // nobody is subscribed yet.
        self.inner.connection_state.send_replace(ConnectionState::Connecting);
        self.inner.synced.send_replace(false);

        // Fresh child token for this connection (supports reconnect).
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let events_url = self.inner.client.events_url()?;
        let reconnect = ReconnectConfig {
            initial_delay: self.inner.config.reconnect_initial,
            max_delay: self.inner.config.reconnect_max,
            max_retries: self.inner.config.max_reconnect_attempts,
        };
        let handle = EventStreamHandle::connect(
            self.inner.client.http().clone(),
            events_url,
            reconnect,
            child.clone(),
        );
        let push_rx = handle.subscribe();
        *self.inner.sse_handle.lock().await = Some(handle);

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(bridge_task(self.clone(), push_rx, child.clone())));

        // Command processor: consumes the receiver for this connection.
        if let Some(command_rx) = self.inner.command_rx.lock().await.take() {
            handles.push(tokio::spawn(command_processor_task(self.clone(), command_rx)));
        }
        drop(handles);

        info!(url = %self.inner.config.url, "push channel starting");
        Ok(())
    }

    /// Disconnect from the hub.
    ///
    /// Cancels background tasks and resets the connection state to
    /// [`Disconnected`](ConnectionState::Disconnected).
    pub async fn disconnect(&self) {
        // Cancel the child token (not the parent -- allows reconnect).
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if let Some(handle) = self.inner.sse_handle.lock().await.take() {
            handle.shutdown();
        }

        // Recreate the command channel so reconnects can spawn a fresh
        // receiver. The previous receiver is consumed by the processor.
        {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
            *self.inner.command_tx.lock().await = tx;
            *self.inner.command_rx.lock().await = Some(rx);
        }

        self.inner.connection_state.send_replace(ConnectionState::Disconnected);
        self.inner.synced.send_replace(false);
        debug!("disconnected");
    }

    /// Wait until the hub finishes replaying full state to this session.
    ///
    /// The sync flag is latched in a `watch`, so this resolves
    /// immediately when the replay already finished before the call --
    /// a `SyncComplete` cannot slip past between `connect()` and here.
    /// Callers bound the wait with `tokio::time::timeout` as needed.
    pub async fn wait_for_sync(&self) -> Result<(), CoreError> {
        let mut rx = self.inner.synced.subscribe();
        rx.wait_for(|synced| *synced).await.map_err(|_| CoreError::NotConnected)?;
        Ok(())
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command against the hub.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() == ConnectionState::Disconnected {
            return Err(CoreError::NotConnected);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let command_tx = self.inner.command_tx.lock().await.clone();

        command_tx
            .send(CommandEnvelope { command: cmd, response_tx: tx })
            .await
            .map_err(|_| CoreError::NotConnected)?;

        rx.await.map_err(|_| CoreError::NotConnected)?
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to render updates from the reconciler.
    pub fn updates(&self) -> broadcast::Receiver<Arc<Update>> {
        self.inner.update_tx.subscribe()
    }

    /// Current diagnostics feed, oldest first.
    pub fn feed(&self) -> Vec<FeedEntry> {
        self.inner
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn push_feed(&self, line: impl Into<String>) {
        let mut feed = self.inner.feed.lock().unwrap_or_else(PoisonError::into_inner);
        if feed.len() >= self.inner.config.feed_capacity {
            feed.pop_front();
        }
        feed.push_back(FeedEntry { at: Utc::now(), line: line.into() });
    }
}

// ── Push channel bridge ──────────────────────────────────────────

/// Consume the push channel: reconcile events into the store and
/// re-broadcast the resulting render updates.
async fn bridge_task(
    controller: Controller,
    mut push_rx: broadcast::Receiver<Arc<PushMessage>>,
    cancel: CancellationToken,
) {
    let reconciler = Reconciler::new(
        Arc::clone(&controller.inner.store),
        Arc::clone(&controller.inner.guard),
        Arc::clone(&controller.inner.tracker),
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = push_rx.recv() => {
                match result {
                    Ok(msg) => handle_push(&controller, &reconciler, &msg),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "push bridge: receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    debug!("push bridge exiting");
}

fn handle_push(controller: &Controller, reconciler: &Reconciler, msg: &PushMessage) {
    match msg {
        PushMessage::Connected => {
            // New session: the hub is about to replay everything, and
            // results for operations from the old session will never
            // arrive. Drop both before the burst lands.
            controller.inner.store.clear();
            controller.inner.tracker.reset();
            controller.inner.connection_state.send_replace(ConnectionState::Connected);
            controller.inner.synced.send_replace(false);
            controller.push_feed("event stream connected");
            let _ = controller.inner.update_tx.send(Arc::new(Update::Resync));
        }
        PushMessage::Event(event) => {
            if let MeshEvent::Debug(line) = event {
                controller.push_feed(format!("DBG: {line}"));
            }
            let update = reconciler.apply(event.clone());
            match &update {
                Update::None => {}
                Update::SyncComplete => {
                    controller.inner.synced.send_replace(true);
                    controller.push_feed(format!(
                        "sync complete: {} devices, {} groups",
                        controller.inner.store.device_count(),
                        controller.inner.store.group_count(),
                    ));
                    let _ = controller.inner.update_tx.send(Arc::new(update));
                }
                Update::ClaimSucceeded { device_id } => {
                    controller.push_feed(match device_id {
                        Some(id) => format!("claim ok: device {id}"),
                        None => "claim ok".to_owned(),
                    });
                    let _ = controller.inner.update_tx.send(Arc::new(update));
                }
                Update::ClaimFailed { message } => {
                    controller.push_feed(format!("claim failed: {message}"));
                    let _ = controller.inner.update_tx.send(Arc::new(update));
                }
                _ => {
                    let _ = controller.inner.update_tx.send(Arc::new(update));
                }
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

/// Process commands from the mpsc channel, routing each to the
/// matching hub endpoint.
async fn command_processor_task(controller: Controller, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = controller.inner.cancel_child.lock().await.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&controller, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

/// Resolve a control target to the wire id (devices and groups share
/// the `control` endpoint's id field).
fn resolve_target(controller: &Controller, target: ControlTarget) -> Result<u16, CoreError> {
    let store = &controller.inner.store;
    match target {
        ControlTarget::Device(id) if store.has_device(id) => Ok(id),
        ControlTarget::Device(id) => Err(CoreError::UnknownEntity { entity: "device", id }),
        // Broadcast pseudo-group exists even when the hub has no groups.
        ControlTarget::Group(BROADCAST_GROUP_ID) => Ok(BROADCAST_GROUP_ID),
        ControlTarget::Group(id) if store.has_group(id) => Ok(id),
        ControlTarget::Group(id) => Err(CoreError::UnknownEntity { entity: "group", id }),
    }
}

/// Route one command. Scans and claims arm the correlation tracker
/// before the POST and disarm it again if the POST never reached the
/// hub, so a transport failure does not wedge the state machine.
async fn route_command(controller: &Controller, cmd: Command) -> Result<CommandResult, CoreError> {
    let client = &controller.inner.client;
    let tracker = &controller.inner.tracker;

    match cmd {
        // ── Light control ────────────────────────────────────────
        Command::SetBrightness { target, value } => {
            let id = resolve_target(controller, target)?;
            client.set_brightness(id, value).await?;
            Ok(CommandResult::Ok)
        }

        Command::SetColorTemp { target, value } => {
            if value == 0 {
                debug!(?target, "color temp 0 suppressed");
                return Ok(CommandResult::Skipped);
            }
            let id = resolve_target(controller, target)?;
            client.set_color_temp(id, value).await?;
            Ok(CommandResult::Ok)
        }

        // ── Device management ────────────────────────────────────
        Command::ExamineDevice { avion_id } => {
            client.examine_device(avion_id).await?;
            Ok(CommandResult::Ok)
        }

        Command::UnclaimDevice { avion_id } => {
            client.unclaim_device(avion_id).await?;
            Ok(CommandResult::Ok)
        }

        Command::SetMqttExposed { id, exposed } => {
            client.set_mqtt_exposed(id, exposed).await?;
            Ok(CommandResult::Ok)
        }

        // ── Groups ───────────────────────────────────────────────
        Command::CreateGroup { name } => {
            client.create_group(&name).await?;
            Ok(CommandResult::Ok)
        }

        Command::DeleteGroup { group_id } => {
            client.delete_group(group_id).await?;
            Ok(CommandResult::Ok)
        }

        Command::AddToGroup { group_id, avion_id } => {
            client.add_to_group(avion_id, group_id).await?;
            Ok(CommandResult::Ok)
        }

        Command::RemoveFromGroup { group_id, avion_id } => {
            client.remove_from_group(avion_id, group_id).await?;
            Ok(CommandResult::Ok)
        }

        // ── Discovery / provisioning ─────────────────────────────
        Command::DiscoverMesh => {
            tracker.begin_mesh_scan()?;
            if let Err(e) = client.discover_mesh().await {
                tracker.abort_mesh_scan();
                return Err(e.into());
            }
            Ok(CommandResult::Ok)
        }

        Command::ScanUnassociated => {
            tracker.begin_unassoc_scan()?;
            if let Err(e) = client.scan_unassociated().await {
                tracker.abort_unassoc_scan();
                return Err(e.into());
            }
            Ok(CommandResult::Ok)
        }

        Command::AddDiscovered { device_id, name, product } => {
            let name = non_blank(name).unwrap_or_else(|| format!("Device {device_id}"));
            let product = product.unwrap_or_default();
            client.add_discovered(device_id, &name, product.code()).await?;
            Ok(CommandResult::Ok)
        }

        Command::ClaimDevice { uuid_hash, name, product } => {
            let name = non_blank(name).unwrap_or_else(|| "Unknown Device".to_owned());
            let product = product.unwrap_or_default();
            tracker.begin_claim(uuid_hash)?;
            if let Err(e) = client.claim_device(uuid_hash, &name, product.code()).await {
                tracker.abort_claim();
                return Err(e.into());
            }
            Ok(CommandResult::Ok)
        }

        // ── Mesh administration ──────────────────────────────────
        Command::Import(backup) => {
            client.import_backup(&backup).await?;
            Ok(CommandResult::Ok)
        }

        Command::Save => {
            client.save().await?;
            Ok(CommandResult::Ok)
        }

        Command::SetPassphrase(passphrase) => {
            client.set_passphrase(&passphrase).await?;
            Ok(CommandResult::Ok)
        }

        Command::GeneratePassphrase => {
            let passphrase = client.generate_passphrase().await?;
            Ok(CommandResult::Passphrase(passphrase))
        }

        Command::FactoryReset => {
            client.factory_reset().await?;
            Ok(CommandResult::Ok)
        }
    }
}

fn non_blank(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::ProductType;

    fn test_controller() -> Controller {
        let config = HubConfig::new("http://hub.test".parse().unwrap());
        Controller::new(config).unwrap()
    }

    fn test_reconciler(controller: &Controller) -> Reconciler {
        Reconciler::new(
            Arc::clone(&controller.inner.store),
            Arc::clone(&controller.inner.guard),
            Arc::clone(&controller.inner.tracker),
        )
    }

    #[test]
    fn blank_names_fall_back_to_defaults() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" Porch ".into())), Some("Porch".to_owned()));
        assert_eq!(ProductType::default().code(), 134);
    }

    #[test]
    fn connected_push_clears_mirror_and_tracker() {
        let controller = test_controller();
        let reconciler = test_reconciler(&controller);

        controller.inner.store.upsert_device(crate::model::DeviceDelta::state(1, 255, None));
        controller.inner.tracker.begin_mesh_scan().unwrap();

        handle_push(&controller, &reconciler, &PushMessage::Connected);

        assert_eq!(controller.inner.store.device_count(), 0);
        assert!(!controller.inner.tracker.mesh_scan_outstanding());
        assert_eq!(*controller.inner.connection_state.borrow(), ConnectionState::Connected);
        assert!(controller.feed().iter().any(|e| e.line.contains("connected")));
    }

    // The watch senders have no subscribers here on purpose: state must
    // still advance so `execute()` sees it.
    #[tokio::test]
    async fn connection_state_advances_without_subscribers() {
        let controller = test_controller();
        assert_eq!(*controller.inner.connection_state.borrow(), ConnectionState::Disconnected);

        controller.connect().await.unwrap();
        assert_eq!(*controller.inner.connection_state.borrow(), ConnectionState::Connecting);

        controller.disconnect().await;
        assert_eq!(*controller.inner.connection_state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn sync_wait_resolves_when_replay_already_finished() {
        let controller = test_controller();
        let reconciler = test_reconciler(&controller);

        // SyncComplete lands before anyone waits; the latch must hold it.
        handle_push(&controller, &reconciler, &PushMessage::Event(MeshEvent::SyncComplete));

        tokio::time::timeout(Duration::from_secs(1), controller.wait_for_sync())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn reconnect_resets_the_sync_latch() {
        let controller = test_controller();
        let reconciler = test_reconciler(&controller);

        handle_push(&controller, &reconciler, &PushMessage::Event(MeshEvent::SyncComplete));
        handle_push(&controller, &reconciler, &PushMessage::Connected);

        assert!(!*controller.inner.synced.borrow());
    }
}
