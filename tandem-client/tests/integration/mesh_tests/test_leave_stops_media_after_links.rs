use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tandem_client::{
    LinkState, LocalMedia, MediaError, MeshConfig, MeshObserver, PeerMesh, RemoteTrack, TrackKind,
};
use tandem_core::{ParticipantId, RoomId, SignalMessage};

use crate::integration::{TEST_ROOM, init_tracing, wait_until};
use crate::utils::{CountingMediaSource, MockSignalSink, MockTransportFactory, TransportCall};

/// Records, for every closed link, whether local media was already stopped.
#[derive(Clone, Default)]
struct MediaRecorder {
    media: Arc<Mutex<Option<Arc<LocalMedia>>>>,
    stopped_at_close: Arc<Mutex<Vec<bool>>>,
    pending: Arc<Mutex<usize>>,
}

#[async_trait]
impl MeshObserver for MediaRecorder {
    async fn on_link_state(&self, _remote: &ParticipantId, state: LinkState) {
        match state {
            LinkState::AnswerPending => *self.pending.lock() += 1,
            LinkState::Closed => {
                let stopped = self
                    .media
                    .lock()
                    .as_ref()
                    .is_some_and(|media| media.is_stopped());
                self.stopped_at_close.lock().push(stopped);
            }
            _ => {}
        }
    }

    async fn on_remote_track(&self, _remote: &ParticipantId, _track: RemoteTrack) {}
}

#[tokio::test]
async fn test_leave_stops_media_after_links() {
    init_tracing();

    let (signaling, _signal_rx) = MockSignalSink::new("local");
    let transports = MockTransportFactory::new();
    let recorder = MediaRecorder::default();
    let config = MeshConfig {
        announce_leave: true,
        ..MeshConfig::default()
    };

    let (mesh, handle) = PeerMesh::new(
        config,
        Arc::new(signaling.clone()),
        Arc::new(CountingMediaSource::default()),
        Arc::new(transports.clone()),
        Arc::new(recorder.clone()),
    );
    tokio::spawn(mesh.run());

    handle
        .join_call(RoomId::from(TEST_ROOM))
        .await
        .expect("Failed to join call");
    let media = handle
        .local_media()
        .await
        .expect("Mesh stopped")
        .expect("No local media in call");
    *recorder.media.lock() = Some(media.clone());

    handle.deliver(SignalMessage::AllUsers {
        users: vec![ParticipantId::from("r1"), ParticipantId::from("r2")],
    });
    assert!(wait_until(1000, || *recorder.pending.lock() == 2).await);

    handle.leave_call().await.expect("Mesh stopped");

    assert_eq!(*recorder.stopped_at_close.lock(), vec![false, false]);
    assert!(media.is_stopped());
    assert!(handle.links().await.expect("Mesh stopped").is_empty());
    for transport in transports.created() {
        assert_eq!(transport.calls().last(), Some(&TransportCall::Close));
    }

    // Leave is announced once links are gone
    assert!(matches!(
        signaling.sent().last(),
        Some(SignalMessage::LeaveVideo { .. })
    ));

    // Stopped tracks reject samples
    let audio = media.track(TrackKind::Audio).expect("No audio track");
    let written = audio
        .write_sample(Bytes::from_static(&[0u8; 8]), Duration::from_millis(20))
        .await;
    assert!(matches!(written, Err(MediaError::Stopped)));

    // Out of the call: introductions are ignored
    handle.deliver(SignalMessage::AllUsers {
        users: vec![ParticipantId::from("r3")],
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transports.created().len(), 2);

    // Leaving twice is harmless
    handle.leave_call().await.expect("Mesh stopped");
    assert!(handle.local_media().await.expect("Mesh stopped").is_none());
}
