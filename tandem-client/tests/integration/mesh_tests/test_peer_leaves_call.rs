use tandem_client::{LinkState, TransportState};

use crate::integration::{
    TestPeer, fast_config, init_tracing, join_call_and_settle, open_peer, open_peer_with,
};
use crate::utils::{MockRelay, TransportCall};

async fn connected_to(peer: &TestPeer, others: &[&TestPeer]) -> bool {
    for other in others {
        if !peer
            .observer
            .wait_for_state(&other.id(), LinkState::Connected, 2000)
            .await
        {
            return false;
        }
    }
    true
}

#[tokio::test]
async fn test_peer_leaves_three_way_call() {
    init_tracing();

    let relay = MockRelay::new();
    let p1 = open_peer(&relay).await;
    let p2 = open_peer(&relay).await;
    let p3 = open_peer(&relay).await;
    let (id1, id2, id3) = (p1.id(), p2.id(), p3.id());

    join_call_and_settle(&relay, &p1).await;
    join_call_and_settle(&relay, &p2).await;
    join_call_and_settle(&relay, &p3).await;

    assert!(connected_to(&p1, &[&p2, &p3]).await);
    assert!(connected_to(&p2, &[&p1, &p3]).await);
    assert!(connected_to(&p3, &[&p1, &p2]).await);

    // P3 hangs up without announcing it
    p3.session.leave_call().await.expect("P3 mesh stopped");
    assert!(p3.session.mesh().links().await.expect("Mesh stopped").is_empty());

    // The others notice through their transports
    p1.transports
        .latest_for(&id3)
        .expect("P1 has no transport to P3")
        .emit_state(TransportState::Disconnected)
        .await;
    p2.transports
        .latest_for(&id3)
        .expect("P2 has no transport to P3")
        .emit_state(TransportState::Failed)
        .await;

    assert!(p1.observer.wait_for_state(&id3, LinkState::Closed, 2000).await);
    assert!(p2.observer.wait_for_state(&id3, LinkState::Closed, 2000).await);

    let links = p1.session.mesh().links().await.expect("Mesh stopped");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].remote, id2);
    assert_eq!(links[0].state, LinkState::Connected);

    let links = p2.session.mesh().links().await.expect("Mesh stopped");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].remote, id1);

    for peer in [p1, p2, p3] {
        peer.session.close().await;
    }
}

#[tokio::test]
async fn test_announced_leave_closes_links() {
    init_tracing();

    let mut config = fast_config();
    config.mesh.announce_leave = true;

    let relay = MockRelay::new();
    let p1 = open_peer_with(&relay, config.clone()).await;
    let p2 = open_peer_with(&relay, config).await;
    let id2 = p2.id();

    join_call_and_settle(&relay, &p1).await;
    join_call_and_settle(&relay, &p2).await;
    assert!(p1.observer.wait_for_state(&id2, LinkState::Connected, 2000).await);

    p2.session.leave_call().await.expect("P2 mesh stopped");

    // user-left from the relay, no transport event needed
    assert!(p1.observer.wait_for_state(&id2, LinkState::Closed, 2000).await);
    assert!(p1.session.mesh().links().await.expect("Mesh stopped").is_empty());
    let transport = p1.transports.latest_for(&id2).expect("No transport to P2");
    assert_eq!(transport.calls().last(), Some(&TransportCall::Close));

    p1.session.close().await;
    p2.session.close().await;
}
