use crate::transport::{LinkKey, PeerTransport, RemoteTrack};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tandem_core::{IceCandidate, ParticipantId};
use tracing::debug;

/// Negotiation state of one link.
///
/// Caller side: `Idle -> Offering -> AnswerPending -> Connected`.
/// Callee side: `Idle -> AnswerRequired -> Connected`.
/// Any state may move to `Closed`, which is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    Idle,
    Offering,
    AnswerPending,
    AnswerRequired,
    Connected,
    Closed,
}

impl LinkState {
    pub fn can_transition_to(self, next: LinkState) -> bool {
        use LinkState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Offering) | (Idle, AnswerRequired) => true,
            (Offering, AnswerPending) => true,
            (AnswerPending, Connected) | (AnswerRequired, Connected) => true,
            _ => false,
        }
    }
}

/// What `links()` reports for each remote participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub remote: ParticipantId,
    pub state: LinkState,
}

/// Connection to one remote participant, owned by the mesh loop.
pub(crate) struct PeerLink {
    pub key: LinkKey,
    pub state: LinkState,
    pub transport: Box<dyn PeerTransport>,
    pub remote_description_set: bool,
    pub pending_candidates: VecDeque<IceCandidate>,
    pub remote_tracks: Vec<RemoteTrack>,
}

impl PeerLink {
    pub fn new(key: LinkKey, transport: Box<dyn PeerTransport>) -> Self {
        Self {
            key,
            state: LinkState::Idle,
            transport,
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
            remote_tracks: Vec::new(),
        }
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.key.remote
    }

    /// Applies `next` if it is a legal move from the current state.
    pub fn transition(&mut self, next: LinkState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(
                "Ignoring link transition {:?} -> {:?} for {}",
                self.state, next, self.key.remote
            );
            return false;
        }
        self.state = next;
        true
    }

    pub fn info(&self) -> LinkInfo {
        LinkInfo {
            remote: self.key.remote.clone(),
            state: self.state,
        }
    }
}
