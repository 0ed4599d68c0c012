use crate::channel::SessionChannel;
use crate::error::ChannelError;
use tandem_core::{ParticipantId, SignalMessage};

/// Outbound half of call signaling.
pub trait SignalSink: Send + Sync + 'static {
    /// Relay-assigned id of this participant, once connected.
    fn local_id(&self) -> Option<ParticipantId>;

    fn send_signal(&self, signal: SignalMessage) -> Result<(), ChannelError>;
}

impl SignalSink for SessionChannel {
    fn local_id(&self) -> Option<ParticipantId> {
        self.connection_id()
    }

    fn send_signal(&self, signal: SignalMessage) -> Result<(), ChannelError> {
        SessionChannel::send_signal(self, signal)
    }
}
