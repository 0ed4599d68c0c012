use crate::mesh::peer_link::LinkState;
use crate::transport::RemoteTrack;
use async_trait::async_trait;
use tandem_core::ParticipantId;

/// Hooks for the layer that renders the call.
#[async_trait]
pub trait MeshObserver: Send + Sync + 'static {
    async fn on_link_state(&self, remote: &ParticipantId, state: LinkState);

    async fn on_remote_track(&self, remote: &ParticipantId, track: RemoteTrack);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

#[async_trait]
impl MeshObserver for NullObserver {
    async fn on_link_state(&self, _remote: &ParticipantId, _state: LinkState) {}

    async fn on_remote_track(&self, _remote: &ParticipantId, _track: RemoteTrack) {}
}
