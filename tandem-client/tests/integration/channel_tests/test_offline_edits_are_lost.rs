use std::time::Duration;
use tandem_client::{ChannelError, ChannelState};
use tandem_core::Delta;

use crate::integration::{init_tracing, open_peer, wait_until};
use crate::utils::MockRelay;

#[tokio::test]
async fn test_offline_edits_are_lost() {
    init_tracing();

    let relay = MockRelay::new();
    let p1 = open_peer(&relay).await;
    let p2 = open_peer(&relay).await;
    let doc1 = p1.session.document();

    doc1.local_edit(Delta::new().insert("a")).expect("Edit not sent");
    doc1.local_edit(Delta::new().retain(1).insert("b"))
        .expect("Edit not sent");

    let mut p2_content = p2.session.document().watch_content();
    p2_content
        .wait_for(|c| c.plain_text() == "ab")
        .await
        .expect("P2 stopped");

    // Network drop, and the relay stays unreachable for a while
    relay.set_refuse(true);
    relay.drop_connection(&p1.id());
    let mut state = p1.session.channel().watch_state();
    state
        .wait_for(|s| matches!(s, ChannelState::Reconnecting { .. }))
        .await
        .expect("Channel closed");

    let result = doc1.local_edit(Delta::new().retain(2).insert("lost"));
    assert!(matches!(result, Err(ChannelError::NotConnected)));

    // Back online
    relay.set_refuse(false);
    state
        .wait_for(ChannelState::is_connected)
        .await
        .expect("Channel closed");

    doc1.local_edit(Delta::new().retain(6).insert("c"))
        .expect("Edit not sent");
    let reached = tokio::time::timeout(
        Duration::from_secs(2),
        p2_content.wait_for(|c| c.plain_text() == "abc"),
    )
    .await;
    assert!(reached.is_ok(), "P2 should get the edit sent after reconnecting");

    // Delivered exactly once each, the offline one never
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.edits_received(), vec!["a", "b", "c"]);
    assert_eq!(p2.session.document().content().plain_text(), "abc");

    // The sender keeps its own offline edit: divergence is accepted
    assert_eq!(doc1.content().plain_text(), "ablostc");

    p1.session.close().await;
    p2.session.close().await;
}

#[tokio::test]
async fn test_drop_during_edit_burst() {
    init_tracing();

    const BURST: usize = 1000;
    const DROP_AT: usize = 500;

    let relay = MockRelay::new();
    let p1 = open_peer(&relay).await;
    let p2 = open_peer(&relay).await;
    let doc1 = p1.session.document();
    let id1 = p1.id();
    let mut state = p1.session.channel().watch_state();

    let mut rejected = 0;
    for i in 0..BURST {
        // Let the relay drain what is in flight now and then
        if i % 50 == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        if i == DROP_AT {
            relay.set_refuse(true);
            relay.drop_connection(&id1);
        }

        let len = doc1.content().text_len();
        let edit = Delta::new().retain(len).insert(format!("<{i}>"));
        if doc1.local_edit(edit).is_err() {
            rejected += 1;
        }
    }
    assert!(rejected > 0, "Edits after the drop should be rejected");

    relay.set_refuse(false);
    state
        .wait_for(ChannelState::is_connected)
        .await
        .expect("Channel closed");
    doc1.local_edit(Delta::new().retain(doc1.content().text_len()).insert("<after>"))
        .expect("Edit not sent");
    assert!(
        wait_until(2000, || relay
            .edits_received()
            .last()
            .is_some_and(|e| e == "<after>"))
        .await
    );

    // An in-order prefix of the burst, each edit once, then the post-reconnect edit
    let received = relay.edits_received();
    let (after, burst) = received.split_last().expect("Nothing received");
    assert_eq!(after, "<after>");
    assert!(!burst.is_empty());
    assert!(burst.len() <= DROP_AT);
    let expected: Vec<String> = (0..burst.len()).map(|i| format!("<{i}>")).collect();
    assert_eq!(burst, expected.as_slice());

    // P2 saw exactly what the relay delivered
    let mut p2_content = p2.session.document().watch_content();
    let delivered = received.concat();
    let reached = tokio::time::timeout(
        Duration::from_secs(2),
        p2_content.wait_for(|c| c.plain_text() == delivered),
    )
    .await;
    assert!(reached.is_ok(), "P2 should hold the delivered prefix");

    p1.session.close().await;
    p2.session.close().await;
}
