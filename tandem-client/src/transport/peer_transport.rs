use crate::media::LocalMedia;
use crate::transport::transport_event::{LinkKey, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use tandem_core::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

/// One peer connection, as the mesh drives it.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Creates an offer and sets it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Creates an answer and sets it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, sdp: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PeerTransportFactory: Send + Sync + 'static {
    /// Builds a transport for `key` with every track of `media` attached.
    /// Events are reported on `events`, tagged with `key`.
    async fn create(
        &self,
        key: LinkKey,
        media: &LocalMedia,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>>;
}
