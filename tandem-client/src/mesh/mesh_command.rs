use crate::error::MeshError;
use crate::media::{LocalMedia, TrackKind};
use crate::mesh::peer_link::LinkInfo;
use std::sync::Arc;
use tandem_core::RoomId;
use tokio::sync::oneshot;

pub enum MeshCommand {
    JoinCall {
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), MeshError>>,
    },
    LeaveCall {
        reply: oneshot::Sender<()>,
    },
    SetTrackEnabled {
        kind: TrackKind,
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    Links {
        reply: oneshot::Sender<Vec<LinkInfo>>,
    },
    LocalMedia {
        reply: oneshot::Sender<Option<Arc<LocalMedia>>>,
    },
}
