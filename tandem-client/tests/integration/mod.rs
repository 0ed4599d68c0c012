//! Integration tests for tandem-client.
//!
//! Tests are organized by functionality:
//! - `channel_tests` - relay connection, reconnection and the WebSocket transport
//! - `document_tests` - edit broadcast, loading and autosave
//! - `mesh_tests` - call signaling between peers


use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

use tandem_client::{
    ClientConfig, CollabSession, MeshConfig, MeshHandle, PeerMesh, ReconnectPolicy, SessionParts,
};
use tandem_core::{ParticipantId, RelayMessage, RoomId, SessionContext, SignalMessage};

use crate::utils::{
    CountingMediaSource, MockRelay, MockSignalSink, MockTransportFactory, RecordingObserver,
};

pub const TEST_ROOM: &str = "doc1";

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Client config with short timers so tests finish quickly.
pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.document.autosave_interval = Duration::from_millis(100);
    config.document.saving_indicator = Duration::from_millis(50);
    config.reconnect = ReconnectPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_attempts: Some(50),
    };
    config
}

/// One participant connected to the mock relay, with mock call transports.
pub struct TestPeer {
    pub session: CollabSession,
    pub observer: RecordingObserver,
    pub transports: MockTransportFactory,
    pub media: CountingMediaSource,
}

impl TestPeer {
    pub fn id(&self) -> ParticipantId {
        self.session
            .channel()
            .connection_id()
            .expect("Peer is not connected")
    }
}

pub async fn open_peer(relay: &MockRelay) -> TestPeer {
    open_peer_with(relay, fast_config()).await
}

pub async fn open_peer_with(relay: &MockRelay, config: ClientConfig) -> TestPeer {
    let observer = RecordingObserver::new();
    let transports = MockTransportFactory::new();
    let media = CountingMediaSource::default();

    let parts = SessionParts {
        connector: Arc::new(relay.clone()),
        store: Arc::new(relay.store()),
        media: Arc::new(media.clone()),
        transports: Arc::new(transports.clone()),
        observer: Arc::new(observer.clone()),
    };

    let session = CollabSession::open(
        SessionContext::anonymous(),
        &config,
        RoomId::from(TEST_ROOM),
        parts,
    )
    .await
    .expect("Failed to open session");
    session.document().wait_loaded().await;

    TestPeer {
        session,
        observer,
        transports,
        media,
    }
}

/// A mesh driven by hand: the test plays the relay.
///
/// Returns (mesh handle, outgoing signals, transports, observer).
pub fn create_test_mesh(
    local: &str,
    config: MeshConfig,
) -> (
    MeshHandle,
    mpsc::UnboundedReceiver<SignalMessage>,
    MockTransportFactory,
    RecordingObserver,
) {
    let (signaling, signal_rx) = MockSignalSink::new(local);
    let transports = MockTransportFactory::new();
    let observer = RecordingObserver::new();

    let (mesh, handle) = PeerMesh::new(
        config,
        Arc::new(signaling),
        Arc::new(CountingMediaSource::default()),
        Arc::new(transports.clone()),
        Arc::new(observer.clone()),
    );

    // Spawn mesh event loop
    tokio::spawn(async move {
        mesh.run().await;
    });

    (handle, signal_rx, transports, observer)
}

/// Polls `check` every 10ms until it holds or `timeout_ms` passes.
pub async fn wait_until<F>(timeout_ms: u64, check: F) -> bool
where
    F: Fn() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Joins `peer` to the call and waits until the relay has registered it,
/// so the next joiner is introduced to it.
pub async fn join_call_and_settle(relay: &MockRelay, peer: &TestPeer) {
    let id = peer.id();
    peer.session.join_call().await.expect("Failed to join call");
    assert!(
        wait_until(1000, || relay
            .received()
            .iter()
            .any(|(from, msg)| *from == id && matches!(msg, RelayMessage::JoinVideo { .. })))
        .await,
        "Relay never saw join-video from {id}"
    );
}

/// Next signal the mesh sent, skipping ICE candidates.
pub async fn next_sdp_signal(rx: &mut mpsc::UnboundedReceiver<SignalMessage>) -> SignalMessage {
    loop {
        let signal = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Timed out waiting for signal")
            .expect("Signal channel closed");
        if !matches!(signal, SignalMessage::IceCandidate(_)) {
            return signal;
        }
    }
}
