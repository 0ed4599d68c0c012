use crate::model::delta::Delta;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

/// One content mutation, broadcast to every other member of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOperation {
    pub room_id: RoomId,
    pub delta: Delta,
}

impl EditOperation {
    pub fn new(room_id: RoomId, delta: Delta) -> Self {
        Self { room_id, delta }
    }
}

/// Full document content, sent periodically so the store can persist it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub room_id: RoomId,
    pub content: Delta,
}

impl Snapshot {
    pub fn new(room_id: RoomId, content: Delta) -> Self {
        Self { room_id, content }
    }
}

/// How concurrent edits from different participants are reconciled.
///
/// Only one policy exists: every recipient applies operations in the order
/// it receives them, with no position transformation. Two participants
/// editing the same spot at the same time may end up with different text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsistencyPolicy {
    #[default]
    LastAppliedWins,
}
