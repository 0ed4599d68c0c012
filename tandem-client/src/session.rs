use crate::channel::{HandlerId, RelayConnector, SessionChannel};
use crate::config::ClientConfig;
use crate::document::DocumentSync;
use crate::error::{ChannelError, MeshError};
use crate::media::MediaSource;
use crate::mesh::{MeshHandle, MeshObserver, PeerMesh};
use crate::store::DocumentStore;
use crate::transport::PeerTransportFactory;
use std::sync::Arc;
use tandem_core::{RoomId, SessionContext};
use tokio::task::JoinHandle;
use tracing::info;

/// Collaborators a session is built from.
pub struct SessionParts {
    pub connector: Arc<dyn RelayConnector>,
    pub store: Arc<dyn DocumentStore>,
    pub media: Arc<dyn MediaSource>,
    pub transports: Arc<dyn PeerTransportFactory>,
    pub observer: Arc<dyn MeshObserver>,
}

/// Everything one participant runs for one open document: the relay
/// channel, the document sync and the call mesh.
pub struct CollabSession {
    room_id: RoomId,
    channel: SessionChannel,
    document: DocumentSync,
    mesh: MeshHandle,
    mesh_task: JoinHandle<()>,
    signal_handler: HandlerId,
}

impl CollabSession {
    /// Connects to the relay, joins `room_id` and starts loading the document.
    ///
    /// An unreachable relay does not fail the call: the channel keeps
    /// retrying in the background and joins the room once it gets through.
    pub async fn open(
        ctx: SessionContext,
        config: &ClientConfig,
        room_id: RoomId,
        parts: SessionParts,
    ) -> Result<Self, ChannelError> {
        let channel = SessionChannel::new(ctx, parts.connector, config.reconnect.clone());
        channel.join_room(room_id.clone());

        let document = DocumentSync::start(
            room_id.clone(),
            channel.clone(),
            parts.store,
            config.document.clone(),
        );

        let (mesh, mesh_handle) = PeerMesh::new(
            config.mesh.clone(),
            Arc::new(channel.clone()),
            parts.media,
            parts.transports,
            parts.observer,
        );
        let mesh_task = tokio::spawn(mesh.run());
        let signal_handler = mesh_handle.listen(&channel);

        if let Err(e) = channel.connect_or_retry().await {
            document.close().await;
            mesh_task.abort();
            channel.disconnect();
            return Err(e);
        }

        info!(
            "Opened session for {} as {}",
            room_id,
            channel.context().user_id().unwrap_or("anonymous")
        );
        Ok(Self {
            room_id,
            channel,
            document,
            mesh: mesh_handle,
            mesh_task,
            signal_handler,
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn channel(&self) -> &SessionChannel {
        &self.channel
    }

    pub fn document(&self) -> &DocumentSync {
        &self.document
    }

    pub fn mesh(&self) -> &MeshHandle {
        &self.mesh
    }

    pub async fn join_call(&self) -> Result<(), MeshError> {
        self.mesh.join_call(self.room_id.clone()).await
    }

    pub async fn leave_call(&self) -> Result<(), MeshError> {
        self.mesh.leave_call().await
    }

    /// Leaves the call, stops the document timers and disconnects.
    pub async fn close(self) {
        let _ = self.mesh.leave_call().await;
        self.channel.remove_handler(self.signal_handler);
        self.document.close().await;
        self.channel.disconnect();
        self.mesh_task.abort();
        info!("Closed session for {}", self.room_id);
    }
}
