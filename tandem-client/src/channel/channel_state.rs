/// Lifecycle of the relay connection, as seen by the session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Transport dropped; waiting out the backoff before attempt `attempt`.
    Reconnecting { attempt: u32 },
    /// `disconnect()` was called. Terminal.
    Closed,
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}
