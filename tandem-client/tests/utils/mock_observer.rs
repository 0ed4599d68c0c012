use async_trait::async_trait;
use std::sync::Arc;
use tandem_client::{LinkState, MeshObserver, RemoteTrack, TrackKind};
use tandem_core::ParticipantId;
use tokio::sync::Mutex;

/// Event types that can be recorded by RecordingObserver.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    /// A link changed state.
    LinkState {
        remote: ParticipantId,
        state: LinkState,
    },
    /// A remote track arrived.
    RemoteTrack {
        remote: ParticipantId,
        kind: TrackKind,
    },
}

/// A test implementation of MeshObserver that records all events.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<MeshEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded events.
    pub async fn get_events(&self) -> Vec<MeshEvent> {
        self.events.lock().await.clone()
    }

    /// States `remote`'s links went through, in order.
    pub async fn states_for(&self, remote: &ParticipantId) -> Vec<LinkState> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                MeshEvent::LinkState { remote: r, state } if r == remote => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Wait for a specific number of events with timeout.
    pub async fn wait_for_events(&self, count: usize, timeout_ms: u64) -> bool {
        self.wait_until(timeout_ms, |events| events.len() >= count)
            .await
    }

    /// Wait until a link to `remote` reaches `state`.
    pub async fn wait_for_state(
        &self,
        remote: &ParticipantId,
        state: LinkState,
        timeout_ms: u64,
    ) -> bool {
        self.wait_until(timeout_ms, |events| {
            events.iter().any(|e| {
                matches!(e, MeshEvent::LinkState { remote: r, state: s } if r == remote && *s == state)
            })
        })
        .await
    }

    async fn wait_until<F>(&self, timeout_ms: u64, done: F) -> bool
    where
        F: Fn(&[MeshEvent]) -> bool,
    {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        while start.elapsed() < timeout {
            if done(self.events.lock().await.as_slice()) {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        false
    }
}

#[async_trait]
impl MeshObserver for RecordingObserver {
    async fn on_link_state(&self, remote: &ParticipantId, state: LinkState) {
        self.events.lock().await.push(MeshEvent::LinkState {
            remote: remote.clone(),
            state,
        });
    }

    async fn on_remote_track(&self, remote: &ParticipantId, track: RemoteTrack) {
        self.events.lock().await.push(MeshEvent::RemoteTrack {
            remote: remote.clone(),
            kind: track.kind,
        });
    }
}
