use crate::channel::{HandlerId, SessionChannel};
use crate::config::DocumentConfig;
use crate::document::document_command::DocumentCommand;
use crate::document::sync_status::SyncStatus;
use crate::error::{ChannelError, StoreError};
use crate::store::{DocumentStore, StoredDocument};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tandem_core::{ConsistencyPolicy, Delta, EditOperation, RoomId, Snapshot};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Work that arrived before the stored snapshot was loaded.
enum Pending {
    Edit(Delta),
    Replace(Delta),
}

struct DocumentState {
    content: Delta,
    /// `Some` until the initial fetch completes.
    pending: Option<Vec<Pending>>,
    closed: bool,
}

/// Content shared by the local editor, the channel's edit handler and the
/// autosave actor. Every mutation goes through one lock, so edits land in
/// the order they reach this process.
struct SharedDocument {
    room_id: RoomId,
    state: Mutex<DocumentState>,
    content_tx: watch::Sender<Delta>,
}

impl SharedDocument {
    /// Applies `work` now, or queues it while the snapshot is loading.
    /// False once the document is closed.
    fn apply(&self, work: Pending) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        if let Some(queue) = state.pending.as_mut() {
            queue.push(work);
            return true;
        }
        self.apply_locked(&mut state, work);
        true
    }

    fn apply_locked(&self, state: &mut DocumentState, work: Pending) {
        let next = match work {
            Pending::Edit(delta) => state.content.apply(&delta),
            Pending::Replace(content) => content.normalized(),
        };
        if next != state.content {
            state.content = next;
            self.content_tx.send_replace(state.content.clone());
        }
    }

    fn finish_load(&self, stored: Delta) {
        let mut state = self.state.lock();
        state.content = stored;

        let queued = state.pending.take().unwrap_or_default();
        if !queued.is_empty() {
            debug!("Applying {} queued changes to {}", queued.len(), self.room_id);
        }
        for work in queued {
            self.apply_locked(&mut state, work);
        }

        self.content_tx.send_replace(state.content.clone());
        info!("Loaded {} ({} chars)", self.room_id, state.content.text_len());
    }

    /// Current content, or `None` while the snapshot is loading.
    fn loaded_content(&self) -> Option<Delta> {
        let state = self.state.lock();
        state.pending.is_none().then(|| state.content.clone())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending = None;
    }
}

struct DocumentActor {
    shared: Arc<SharedDocument>,
    channel: SessionChannel,
    config: DocumentConfig,
    saving_until: Option<Instant>,
    edit_handler: HandlerId,
    command_rx: mpsc::UnboundedReceiver<DocumentCommand>,
    status_tx: watch::Sender<SyncStatus>,
}

impl DocumentActor {
    async fn run(mut self, store: Arc<dyn DocumentStore>) {
        let room_id = self.shared.room_id.clone();
        info!("Document sync for {} started", room_id);

        let fetch_id = room_id.clone();
        let load = async move { store.fetch(&fetch_id).await };
        tokio::pin!(load);
        let mut loading = true;

        let period = self.config.autosave_interval;
        let mut autosave = tokio::time::interval_at(Instant::now() + period, period);
        autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = &mut load, if loading => {
                    loading = false;
                    self.finish_load(result);
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(DocumentCommand::Close { reply }) => {
                            let _ = reply.send(());
                            break;
                        }
                        None => break,
                    }
                }

                _ = autosave.tick() => {
                    self.autosave();
                }

                _ = tokio::time::sleep_until(self.saving_until.unwrap_or_else(Instant::now)),
                    if self.saving_until.is_some() => {
                    self.saving_until = None;
                    self.status_tx.send_modify(|s| s.saving = false);
                }
            }
        }

        self.channel.remove_handler(self.edit_handler);
        self.shared.close();
        info!("Document sync for {} stopped", room_id);
    }

    fn finish_load(&mut self, result: Result<StoredDocument, StoreError>) {
        let room_id = &self.shared.room_id;
        let stored = match result {
            Ok(doc) => doc.content.map(|c| c.normalized()).unwrap_or_default(),
            Err(StoreError::NotFound(_)) => {
                info!("No stored content for {}, starting empty", room_id);
                Delta::new()
            }
            Err(e) => {
                warn!("Failed to load {}, starting empty: {}", room_id, e);
                Delta::new()
            }
        };

        self.shared.finish_load(stored);
        self.status_tx.send_modify(|s| s.loaded = true);
    }

    /// Sends the full content whether or not it changed since the last save.
    fn autosave(&mut self) {
        if !self.channel.is_connected() {
            return;
        }
        let Some(content) = self.shared.loaded_content() else {
            return;
        };

        let room_id = self.shared.room_id.clone();
        match self.channel.send_snapshot(Snapshot::new(room_id, content)) {
            Ok(()) => {
                debug!("Autosaved {}", self.shared.room_id);
                self.saving_until = Some(Instant::now() + self.config.saving_indicator);
                self.status_tx.send_modify(|s| {
                    s.saving = true;
                    s.last_saved = Some(SystemTime::now());
                });
            }
            Err(e) => debug!("Skipping autosave of {}: {}", self.shared.room_id, e),
        }
    }
}

/// Keeps one document's content in sync with the other room members.
///
/// Local edits are applied and broadcast one by one as they happen; remote
/// edits are applied as the channel delivers them, with no reconciliation
/// (see [`ConsistencyPolicy`]). The content is saved to the store every
/// `autosave_interval` while the channel is connected.
#[derive(Clone)]
pub struct DocumentSync {
    shared: Arc<SharedDocument>,
    channel: SessionChannel,
    edit_handler: HandlerId,
    command_tx: mpsc::UnboundedSender<DocumentCommand>,
    content_rx: watch::Receiver<Delta>,
    status_rx: watch::Receiver<SyncStatus>,
}

impl DocumentSync {
    /// Subscribes to the channel's edits and starts loading the stored
    /// snapshot. Edits arriving before the load completes are held back.
    pub fn start(
        room_id: RoomId,
        channel: SessionChannel,
        store: Arc<dyn DocumentStore>,
        config: DocumentConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (content_tx, content_rx) = watch::channel(Delta::new());
        let (status_tx, status_rx) = watch::channel(SyncStatus::default());

        let shared = Arc::new(SharedDocument {
            room_id,
            state: Mutex::new(DocumentState {
                content: Delta::new(),
                pending: Some(Vec::new()),
                closed: false,
            }),
            content_tx,
        });

        let remote = shared.clone();
        let edit_handler = channel.on_edit(move |delta| {
            debug!("Remote edit for {}", remote.room_id);
            remote.apply(Pending::Edit(delta));
        });

        let actor = DocumentActor {
            shared: shared.clone(),
            channel: channel.clone(),
            config,
            saving_until: None,
            edit_handler,
            command_rx,
            status_tx,
        };
        tokio::spawn(actor.run(store));

        Self {
            shared,
            channel,
            edit_handler,
            command_tx,
            content_rx,
            status_rx,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.shared.room_id
    }

    pub fn policy(&self) -> ConsistencyPolicy {
        ConsistencyPolicy::LastAppliedWins
    }

    /// Applies a local mutation and broadcasts it. `content()` reflects the
    /// edit as soon as this returns, even when the broadcast fails; the edit
    /// is then lost for the others. While the snapshot is loading the edit
    /// is sent at once and applied after the load.
    pub fn local_edit(&self, delta: Delta) -> Result<(), ChannelError> {
        if delta.is_empty() {
            return Ok(());
        }

        if !self.shared.apply(Pending::Edit(delta.clone())) {
            return Err(ChannelError::Closed);
        }

        self.channel
            .send_edit(EditOperation::new(self.shared.room_id.clone(), delta))
    }

    /// Replaces the content. Applying the current content again is a no-op.
    pub fn apply_snapshot(&self, snapshot: Snapshot) {
        if snapshot.room_id != self.shared.room_id {
            warn!(
                "Ignoring snapshot of {} in document {}",
                snapshot.room_id, self.shared.room_id
            );
            return;
        }
        self.shared.apply(Pending::Replace(snapshot.content));
    }

    pub fn content(&self) -> Delta {
        self.shared.state.lock().content.clone()
    }

    pub fn watch_content(&self) -> watch::Receiver<Delta> {
        self.content_rx.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.status_rx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    /// Resolves once the stored snapshot has been applied.
    pub async fn wait_loaded(&self) {
        let mut status = self.status_rx.clone();
        let _ = status.wait_for(|s| s.loaded).await;
    }

    /// Stops listening for edits and stops autosave. Later local edits
    /// fail with [`ChannelError::Closed`].
    pub async fn close(&self) {
        self.channel.remove_handler(self.edit_handler);
        self.shared.close();

        let (reply, rx) = oneshot::channel();
        if self
            .command_tx
            .send(DocumentCommand::Close { reply })
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}
