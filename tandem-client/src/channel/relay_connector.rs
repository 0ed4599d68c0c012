use crate::error::ChannelError;
use async_trait::async_trait;
use tandem_core::{ParticipantId, RelayMessage, SessionContext};
use tokio::sync::mpsc;

/// A live, handshaken connection to the relay.
///
/// Dropping `outbound` closes the connection; `inbound` ends when the
/// transport drops.
pub struct RelayLink {
    pub connection_id: ParticipantId,
    pub outbound: mpsc::UnboundedSender<RelayMessage>,
    pub inbound: mpsc::UnboundedReceiver<RelayMessage>,
}

/// Opens connections to the relay service.
#[async_trait]
pub trait RelayConnector: Send + Sync + 'static {
    async fn connect(&self, ctx: &SessionContext) -> Result<RelayLink, ChannelError>;
}
