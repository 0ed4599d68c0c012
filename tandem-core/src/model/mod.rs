mod context;
mod delta;
mod edit;
mod participant;
mod relay;
mod room;
mod signaling;

pub use context::{SessionContext, UserIdentity};
pub use delta::{Attributes, Delta, Op};
pub use edit::{ConsistencyPolicy, EditOperation, Snapshot};
pub use participant::ParticipantId;
pub use relay::{CandidateSignal, RelayMessage, SdpSignal, SignalMessage};
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
