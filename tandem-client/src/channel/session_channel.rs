use crate::channel::channel_state::ChannelState;
use crate::channel::relay_connector::{RelayConnector, RelayLink};
use crate::config::ReconnectPolicy;
use crate::error::ChannelError;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tandem_core::{
    Delta, EditOperation, ParticipantId, RelayMessage, RoomId, SessionContext, SignalMessage,
    Snapshot,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub type EditHandler = Arc<dyn Fn(Delta) + Send + Sync>;
pub type SignalHandler = Arc<dyn Fn(SignalMessage) + Send + Sync>;

/// Returned by `on_edit`/`on_signal`, used to unregister the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct ActiveLink {
    connection_id: ParticipantId,
    outbound: mpsc::UnboundedSender<RelayMessage>,
}

#[derive(Default)]
struct Handlers {
    edits: Vec<(HandlerId, EditHandler)>,
    signals: Vec<(HandlerId, SignalHandler)>,
}

struct ChannelInner {
    ctx: SessionContext,
    connector: Arc<dyn RelayConnector>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ChannelState>,
    link: Mutex<Option<ActiveLink>>,
    room: Mutex<Option<RoomId>>,
    handlers: RwLock<Handlers>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    next_handler: AtomicU64,
}

/// The single duplex connection to the relay for one document room.
///
/// Sends are fire-and-forget: nothing is queued while the connection is
/// down, and a send that fails is lost. After a transport drop the channel
/// reconnects with exponential backoff and re-sends the room join, since
/// the relay does not remember memberships across connections.
#[derive(Clone)]
pub struct SessionChannel {
    inner: Arc<ChannelInner>,
}

impl SessionChannel {
    pub fn new(
        ctx: SessionContext,
        connector: Arc<dyn RelayConnector>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);

        Self {
            inner: Arc::new(ChannelInner {
                ctx,
                connector,
                policy,
                state_tx,
                link: Mutex::new(None),
                room: Mutex::new(None),
                handlers: RwLock::new(Handlers::default()),
                supervisor: Mutex::new(None),
                next_handler: AtomicU64::new(1),
            }),
        }
    }

    /// Opens the relay connection. A no-op while connected or connecting.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        self.open(false).await
    }

    /// Like [`connect`](Self::connect), but a failed first attempt is not
    /// returned: the channel keeps retrying in the background under its
    /// reconnect policy. Fails only once the channel is closed.
    pub async fn connect_or_retry(&self) -> Result<(), ChannelError> {
        self.open(true).await
    }

    async fn open(&self, retry: bool) -> Result<(), ChannelError> {
        let mut claimed = false;
        let mut closed = false;
        self.inner.state_tx.send_if_modified(|state| match state {
            ChannelState::Disconnected => {
                *state = ChannelState::Connecting;
                claimed = true;
                true
            }
            ChannelState::Closed => {
                closed = true;
                false
            }
            _ => false,
        });

        if closed {
            return Err(ChannelError::Closed);
        }
        if !claimed {
            debug!("connect() ignored, channel is {:?}", self.state());
            return Ok(());
        }

        let inbound = match self.inner.connector.connect(&self.inner.ctx).await {
            Ok(link) => Some(self.inner.install(link).ok_or(ChannelError::Closed)?),
            Err(e) if retry => {
                warn!("Relay connection failed, retrying in the background: {}", e);
                None
            }
            Err(e) => {
                warn!("Relay connection failed: {}", e);
                self.inner.transition(ChannelState::Disconnected);
                return Err(e);
            }
        };

        let supervisor = tokio::spawn(supervise(Arc::downgrade(&self.inner), inbound));
        if let Some(previous) = self.inner.supervisor.lock().replace(supervisor) {
            previous.abort();
        }

        Ok(())
    }

    /// Records the room to join and sends `join-document` when connected.
    /// Before that, the intent is replayed as soon as a connection is up.
    pub fn join_room(&self, room_id: RoomId) {
        let previous = self.inner.room.lock().replace(room_id.clone());
        if previous.as_ref().is_some_and(|p| *p != room_id) {
            warn!(
                "Switching room from {:?} to {}; the relay keeps the old membership until reconnect",
                previous, room_id
            );
        }

        match self.send(RelayMessage::JoinDocument {
            room_id: room_id.clone(),
        }) {
            Ok(()) => info!("Joined document room {}", room_id),
            Err(_) => debug!("Join intent for {} buffered until connected", room_id),
        }
    }

    pub fn send_edit(&self, op: EditOperation) -> Result<(), ChannelError> {
        self.send(RelayMessage::SendChanges {
            delta: op.delta,
            room_id: op.room_id,
        })
    }

    pub fn send_snapshot(&self, snapshot: Snapshot) -> Result<(), ChannelError> {
        self.send(RelayMessage::SaveDocument {
            content: snapshot.content,
            room_id: snapshot.room_id,
        })
    }

    pub fn send_signal(&self, signal: SignalMessage) -> Result<(), ChannelError> {
        self.send(signal.into())
    }

    fn send(&self, msg: RelayMessage) -> Result<(), ChannelError> {
        let link = self.inner.link.lock();
        let Some(link) = link.as_ref() else {
            return Err(ChannelError::NotConnected);
        };
        link.outbound
            .send(msg)
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Registers a handler for edits coming from other room members.
    pub fn on_edit<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(Delta) + Send + Sync + 'static,
    {
        let id = self.next_handler_id();
        self.inner.handlers.write().edits.push((id, Arc::new(handler)));
        id
    }

    /// Registers a handler for call-signaling messages.
    pub fn on_signal<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(SignalMessage) + Send + Sync + 'static,
    {
        let id = self.next_handler_id();
        self.inner.handlers.write().signals.push((id, Arc::new(handler)));
        id
    }

    pub fn remove_handler(&self, id: HandlerId) {
        let mut handlers = self.inner.handlers.write();
        handlers.edits.retain(|(h, _)| *h != id);
        handlers.signals.retain(|(h, _)| *h != id);
    }

    fn next_handler_id(&self) -> HandlerId {
        HandlerId(self.inner.next_handler.fetch_add(1, Ordering::Relaxed))
    }

    /// Releases the connection and stops every handler. Idempotent.
    pub fn disconnect(&self) {
        let previous = self.inner.state_tx.send_replace(ChannelState::Closed);
        if previous == ChannelState::Closed {
            return;
        }

        if let Some(supervisor) = self.inner.supervisor.lock().take() {
            supervisor.abort();
        }
        self.inner.link.lock().take();

        let mut handlers = self.inner.handlers.write();
        handlers.edits.clear();
        handlers.signals.clear();

        info!("Session channel closed");
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Relay-assigned id of the current connection.
    pub fn connection_id(&self) -> Option<ParticipantId> {
        self.inner
            .link
            .lock()
            .as_ref()
            .map(|l| l.connection_id.clone())
    }

    pub fn context(&self) -> &SessionContext {
        &self.inner.ctx
    }
}

impl ChannelInner {
    /// Moves to `next` unless the channel was closed meanwhile.
    fn transition(&self, next: ChannelState) -> bool {
        let mut applied = false;
        self.state_tx.send_if_modified(|state| {
            if *state == ChannelState::Closed {
                return false;
            }
            *state = next;
            applied = true;
            true
        });
        applied
    }

    /// Makes `link` the active connection, replays the join intent and
    /// returns the inbound half. `None` if the channel was closed during
    /// the handshake.
    fn install(&self, link: RelayLink) -> Option<mpsc::UnboundedReceiver<RelayMessage>> {
        let RelayLink {
            connection_id,
            outbound,
            inbound,
        } = link;

        if let Some(room_id) = self.room.lock().clone() {
            info!("Replaying join of room {} on {}", room_id, connection_id);
            let _ = outbound.send(RelayMessage::JoinDocument { room_id });
        }

        *self.link.lock() = Some(ActiveLink {
            connection_id: connection_id.clone(),
            outbound,
        });

        if !self.transition(ChannelState::Connected) {
            self.link.lock().take();
            return None;
        }

        info!("Session channel connected as {}", connection_id);
        Some(inbound)
    }

    fn dispatch(&self, msg: RelayMessage) {
        match msg.into_signal() {
            Ok(signal) => {
                let handlers: Vec<SignalHandler> = self
                    .handlers
                    .read()
                    .signals
                    .iter()
                    .map(|(_, h)| h.clone())
                    .collect();
                for handler in handlers {
                    handler(signal.clone());
                }
            }
            Err(RelayMessage::ReceiveChanges { delta }) => {
                let handlers: Vec<EditHandler> = self
                    .handlers
                    .read()
                    .edits
                    .iter()
                    .map(|(_, h)| h.clone())
                    .collect();
                for handler in handlers {
                    handler(delta.clone());
                }
            }
            Err(other) => debug!("Ignoring '{}' from relay", other.event_name()),
        }
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.abort();
        }
    }
}

/// Delivers inbound frames in receipt order and reconnects when the
/// transport drops, or right away when started without a connection.
/// Holds only a weak reference so dropping the last channel handle ends it.
async fn supervise(
    inner: Weak<ChannelInner>,
    mut inbound: Option<mpsc::UnboundedReceiver<RelayMessage>>,
) {
    loop {
        if let Some(rx) = inbound.as_mut() {
            while let Some(msg) = rx.recv().await {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                inner.dispatch(msg);
            }
        }

        match reconnect(&inner).await {
            Some(next) => inbound = Some(next),
            None => return,
        }
    }
}

/// Retries the connection under the reconnect policy. Upgrades `weak` only
/// between waits, so a channel dropped meanwhile stops the loop.
async fn reconnect(weak: &Weak<ChannelInner>) -> Option<mpsc::UnboundedReceiver<RelayMessage>> {
    let (policy, connector, ctx) = {
        let inner = weak.upgrade()?;
        if let Some(dropped) = inner.link.lock().take() {
            warn!("Relay connection {} dropped", dropped.connection_id);
        }
        (
            inner.policy.clone(),
            inner.connector.clone(),
            inner.ctx.clone(),
        )
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        let Some(delay) = policy.delay_for(attempt) else {
            error!("Giving up on relay after {} attempts", attempt - 1);
            if let Some(inner) = weak.upgrade() {
                inner.transition(ChannelState::Disconnected);
            }
            return None;
        };

        if !weak
            .upgrade()?
            .transition(ChannelState::Reconnecting { attempt })
        {
            return None;
        }
        info!("Reconnecting to relay in {:?} (attempt {})", delay, attempt);
        tokio::time::sleep(delay).await;

        let result = connector.connect(&ctx).await;
        let inner = weak.upgrade()?;
        match result {
            Ok(link) => return inner.install(link),
            Err(e) => warn!("Reconnection attempt {} failed: {}", attempt, e),
        }
    }
}
