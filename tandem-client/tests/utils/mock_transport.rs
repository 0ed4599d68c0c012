use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tandem_client::{
    LinkKey, LocalMedia, PeerTransport, PeerTransportFactory, TransportEvent, TransportState,
};
use tandem_core::{IceCandidate, ParticipantId, SdpKind, SessionDescription};
use tokio::sync::mpsc;

/// Calls a mock transport received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    CreateOffer,
    CreateAnswer,
    SetRemoteDescription(SdpKind),
    AddIceCandidate(String),
    Close,
}

pub struct MockTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    serial: u64,
}

impl MockTransport {
    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(TransportCall::CreateOffer);
        Ok(SessionDescription::offer(format!("v=0 offer {}", self.serial)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(TransportCall::CreateAnswer);
        Ok(SessionDescription::answer(format!("v=0 answer {}", self.serial)))
    }

    async fn set_remote_description(&self, sdp: SessionDescription) -> Result<()> {
        self.record(TransportCall::SetRemoteDescription(sdp.kind));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(TransportCall::AddIceCandidate(candidate.candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(TransportCall::Close);
        Ok(())
    }
}

/// One transport handed out by the factory.
#[derive(Clone)]
pub struct CreatedTransport {
    pub key: LinkKey,
    pub calls: Arc<Mutex<Vec<TransportCall>>>,
    pub events: mpsc::Sender<TransportEvent>,
    pub track_count: usize,
}

impl CreatedTransport {
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Reports a connection state change as the WebRTC stack would.
    pub async fn emit_state(&self, state: TransportState) {
        let _ = self
            .events
            .send(TransportEvent::StateChanged(self.key.clone(), state))
            .await;
    }

    pub async fn emit_candidate(&self, candidate: &str) {
        let _ = self
            .events
            .send(TransportEvent::CandidateGenerated(
                self.key.clone(),
                IceCandidate::new(candidate),
            ))
            .await;
    }
}

/// Factory of recording transports that never touch the network.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    created: Arc<Mutex<Vec<CreatedTransport>>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> Vec<CreatedTransport> {
        self.created.lock().clone()
    }

    /// Latest transport created for `remote`.
    pub fn latest_for(&self, remote: &ParticipantId) -> Option<CreatedTransport> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|t| t.key.remote == *remote)
            .cloned()
    }

    pub async fn wait_for_transports(&self, count: usize, timeout_ms: u64) -> bool {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        while start.elapsed() < timeout {
            if self.created.lock().len() >= count {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        false
    }
}

#[async_trait]
impl PeerTransportFactory for MockTransportFactory {
    async fn create(
        &self,
        key: LinkKey,
        media: &LocalMedia,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        self.created.lock().push(CreatedTransport {
            key: key.clone(),
            calls: calls.clone(),
            events,
            track_count: media.tracks().len(),
        });

        Ok(Box::new(MockTransport {
            calls,
            serial: key.serial,
        }))
    }
}
