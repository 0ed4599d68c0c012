use crate::model::delta::Delta;
use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use crate::model::signaling::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};

/// Offer or answer addressed to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdpSignal {
    pub target: ParticipantId,
    pub caller: ParticipantId,
    pub sdp: SessionDescription,
}

/// ICE candidate addressed to one participant. `caller` is the sender, so
/// the recipient can find the matching link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSignal {
    pub target: ParticipantId,
    pub caller: ParticipantId,
    pub candidate: IceCandidate,
}

/// Every frame exchanged with the relay, as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RelayMessage {
    /// First frame of every connection; carries the relay-assigned id.
    Welcome { connection_id: ParticipantId },
    JoinDocument { room_id: RoomId },
    SendChanges { delta: Delta, room_id: RoomId },
    ReceiveChanges { delta: Delta },
    SaveDocument { content: Delta, room_id: RoomId },
    JoinVideo { room_id: RoomId },
    AllUsers { users: Vec<ParticipantId> },
    Offer(SdpSignal),
    Answer(SdpSignal),
    IceCandidate(CandidateSignal),
    LeaveVideo { room_id: RoomId },
    UserLeft { id: ParticipantId },
}

impl RelayMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            RelayMessage::Welcome { .. } => "welcome",
            RelayMessage::JoinDocument { .. } => "join-document",
            RelayMessage::SendChanges { .. } => "send-changes",
            RelayMessage::ReceiveChanges { .. } => "receive-changes",
            RelayMessage::SaveDocument { .. } => "save-document",
            RelayMessage::JoinVideo { .. } => "join-video",
            RelayMessage::AllUsers { .. } => "all-users",
            RelayMessage::Offer(_) => "offer",
            RelayMessage::Answer(_) => "answer",
            RelayMessage::IceCandidate(_) => "ice-candidate",
            RelayMessage::LeaveVideo { .. } => "leave-video",
            RelayMessage::UserLeft { .. } => "user-left",
        }
    }

    /// Splits call-signaling frames from the rest.
    pub fn into_signal(self) -> Result<SignalMessage, RelayMessage> {
        match self {
            RelayMessage::JoinVideo { room_id } => Ok(SignalMessage::JoinVideo { room_id }),
            RelayMessage::AllUsers { users } => Ok(SignalMessage::AllUsers { users }),
            RelayMessage::Offer(s) => Ok(SignalMessage::Offer(s)),
            RelayMessage::Answer(s) => Ok(SignalMessage::Answer(s)),
            RelayMessage::IceCandidate(c) => Ok(SignalMessage::IceCandidate(c)),
            RelayMessage::LeaveVideo { room_id } => Ok(SignalMessage::LeaveVideo { room_id }),
            RelayMessage::UserLeft { id } => Ok(SignalMessage::UserLeft { id }),
            other => Err(other),
        }
    }
}

/// The call-signaling subset of [`RelayMessage`].
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    JoinVideo { room_id: RoomId },
    AllUsers { users: Vec<ParticipantId> },
    Offer(SdpSignal),
    Answer(SdpSignal),
    IceCandidate(CandidateSignal),
    LeaveVideo { room_id: RoomId },
    UserLeft { id: ParticipantId },
}

impl From<SignalMessage> for RelayMessage {
    fn from(signal: SignalMessage) -> Self {
        match signal {
            SignalMessage::JoinVideo { room_id } => RelayMessage::JoinVideo { room_id },
            SignalMessage::AllUsers { users } => RelayMessage::AllUsers { users },
            SignalMessage::Offer(s) => RelayMessage::Offer(s),
            SignalMessage::Answer(s) => RelayMessage::Answer(s),
            SignalMessage::IceCandidate(c) => RelayMessage::IceCandidate(c),
            SignalMessage::LeaveVideo { room_id } => RelayMessage::LeaveVideo { room_id },
            SignalMessage::UserLeft { id } => RelayMessage::UserLeft { id },
        }
    }
}
