use crate::media::TrackKind;
use std::sync::Arc;
use tandem_core::{IceCandidate, ParticipantId};
use webrtc::track::track_remote::TrackRemote;

/// Identifies one peer connection. The serial tells a rebuilt link apart
/// from the one it replaced, so late events of the old one can be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub remote: ParticipantId,
    pub serial: u64,
}

impl LinkKey {
    pub fn new(remote: ParticipantId, serial: u64) -> Self {
        Self { remote, serial }
    }
}

/// Connection state reported by a peer transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// States after which the link is considered gone.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed
        )
    }
}

/// Media arriving from a remote participant.
#[derive(Clone)]
pub struct RemoteTrack {
    pub track_id: String,
    pub stream_id: String,
    pub kind: TrackKind,
    /// Absent for transports that carry no real media.
    pub track: Option<Arc<TrackRemote>>,
}

impl std::fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("track_id", &self.track_id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Events a transport raises for the mesh loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local ICE candidate was gathered and must be sent to the remote.
    CandidateGenerated(LinkKey, IceCandidate),

    StateChanged(LinkKey, TransportState),

    RemoteTrack(LinkKey, RemoteTrack),
}
