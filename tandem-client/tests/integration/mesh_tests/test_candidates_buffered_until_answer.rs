use std::time::Duration;
use tandem_client::{LinkState, MeshConfig};
use tandem_core::{
    CandidateSignal, IceCandidate, ParticipantId, RoomId, SdpSignal, SessionDescription,
    SignalMessage,
};

use crate::integration::{TEST_ROOM, create_test_mesh, init_tracing, next_sdp_signal, wait_until};
use crate::utils::TransportCall;

fn candidate_from(remote: &ParticipantId, candidate: &str) -> SignalMessage {
    SignalMessage::IceCandidate(CandidateSignal {
        target: ParticipantId::from("local"),
        caller: remote.clone(),
        candidate: IceCandidate::new(candidate),
    })
}

#[tokio::test]
async fn test_candidates_buffered_until_answer() {
    init_tracing();

    let (mesh, mut signal_rx, transports, observer) =
        create_test_mesh("local", MeshConfig::default());
    let remote = ParticipantId::from("remote");

    mesh.join_call(RoomId::from(TEST_ROOM))
        .await
        .expect("Failed to join call");
    assert!(matches!(
        next_sdp_signal(&mut signal_rx).await,
        SignalMessage::JoinVideo { .. }
    ));

    mesh.deliver(SignalMessage::AllUsers {
        users: vec![ParticipantId::from("local"), remote.clone()],
    });
    let SignalMessage::Offer(offer) = next_sdp_signal(&mut signal_rx).await else {
        panic!("Expected an offer");
    };
    assert_eq!(offer.target, remote);
    assert_eq!(offer.caller, ParticipantId::from("local"));
    assert!(observer.wait_for_state(&remote, LinkState::AnswerPending, 1000).await);

    // Candidates racing ahead of the answer
    mesh.deliver(candidate_from(&remote, "c1"));
    mesh.deliver(candidate_from(&remote, "c2"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let transport = transports.latest_for(&remote).expect("No transport");
    assert_eq!(transport.calls(), vec![TransportCall::CreateOffer]);

    mesh.deliver(SignalMessage::Answer(SdpSignal {
        target: ParticipantId::from("local"),
        caller: remote.clone(),
        sdp: SessionDescription::answer("v=0"),
    }));
    assert!(observer.wait_for_state(&remote, LinkState::Connected, 1000).await);

    // Applied in arrival order right after the remote description
    assert_eq!(
        transport.calls(),
        vec![
            TransportCall::CreateOffer,
            TransportCall::SetRemoteDescription(tandem_core::SdpKind::Answer),
            TransportCall::AddIceCandidate("c1".into()),
            TransportCall::AddIceCandidate("c2".into()),
        ]
    );

    // Later candidates go straight through
    mesh.deliver(candidate_from(&remote, "c3"));
    assert!(
        wait_until(1000, || transport
            .calls()
            .contains(&TransportCall::AddIceCandidate("c3".into())))
        .await
    );

    // Self was skipped: one transport only
    assert_eq!(transports.created().len(), 1);
}

#[tokio::test]
async fn test_candidates_from_unknown_participant_discarded() {
    init_tracing();

    let (mesh, _signal_rx, transports, observer) =
        create_test_mesh("local", MeshConfig::default());
    mesh.join_call(RoomId::from(TEST_ROOM))
        .await
        .expect("Failed to join call");

    mesh.deliver(candidate_from(&ParticipantId::from("stranger"), "c1"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(transports.created().is_empty());
    assert!(observer.get_events().await.is_empty());
    assert!(mesh.links().await.expect("Mesh stopped").is_empty());
}

#[tokio::test]
async fn test_local_candidates_are_sent_to_remote() {
    init_tracing();

    let (mesh, mut signal_rx, transports, _observer) =
        create_test_mesh("local", MeshConfig::default());
    let remote = ParticipantId::from("remote");

    mesh.join_call(RoomId::from(TEST_ROOM))
        .await
        .expect("Failed to join call");
    mesh.deliver(SignalMessage::AllUsers {
        users: vec![remote.clone()],
    });
    assert!(transports.wait_for_transports(1, 1000).await);

    // Gathered before the answer: sent anyway
    let transport = transports.latest_for(&remote).expect("No transport");
    transport.emit_candidate("host-1").await;

    let sent = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(signal) = signal_rx.recv().await {
            if let SignalMessage::IceCandidate(c) = signal {
                return Some(c);
            }
        }
        None
    })
    .await
    .expect("Timed out")
    .expect("No candidate sent");

    assert_eq!(sent.target, remote);
    assert_eq!(sent.caller, ParticipantId::from("local"));
    assert_eq!(sent.candidate.candidate, "host-1");
}
