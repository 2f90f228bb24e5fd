// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use tandem_sync::{PresenceStatus, ServerFrame, TypingState};
use tandem_test_utils::TestHarness;

fn status_of(frame: &ServerFrame) -> String {
    match frame {
        ServerFrame::Event { event, data, .. } => {
            assert_eq!(event.as_str(), "presence:update");
            data["status"].as_str().unwrap_or_default().to_string()
        }
        other => panic!("expected presence event, got {other:?}"),
    }
}

#[tokio::test]
async fn online_on_first_connection_only() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();

    let _a1 = h.connect(&alice).await.unwrap();
    let _a2 = h.connect(&alice).await.unwrap();

    let frames = b1.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(status_of(&frames[0]), "online");
}

#[tokio::test]
async fn offline_on_last_disconnect_only() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();
    let a1 = h.connect(&alice).await.unwrap();
    let a2 = h.connect(&alice).await.unwrap();
    b1.drain();

    h.disconnect(&a1).await;
    assert!(b1.drain().is_empty());

    h.disconnect(&a2).await;
    let frames = b1.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(status_of(&frames[0]), "offline");
}

#[tokio::test]
async fn explicit_status_is_relayed_with_user() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let a1 = h.connect(&alice).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();

    h.hub
        .presence
        .status(&alice.id, Some(&a1.id), PresenceStatus::Away)
        .await;

    let frame = b1.next_frame().await.unwrap();
    assert_eq!(status_of(&frame), "away");
    if let ServerFrame::Event { data, .. } = &frame {
        assert_eq!(data["user"], alice.id.as_str());
        assert!(data["timestamp"].is_string());
    }
}

#[tokio::test]
async fn typing_goes_to_partner_and_not_back_to_sender() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();
    let mut a1 = h.connect(&alice).await.unwrap();
    let mut a2 = h.connect(&alice).await.unwrap();
    for conn in [&mut a1, &mut a2, &mut b1] {
        conn.drain();
    }

    h.hub
        .presence
        .typing(&alice.id, Some(&a1.id), TypingState::Start)
        .await;
    h.hub
        .presence
        .typing(&alice.id, Some(&a1.id), TypingState::Stop)
        .await;

    assert_eq!(b1.drain_event_names(), vec!["typing:start", "typing:stop"]);
    assert!(a1.drain().is_empty());
    assert!(a2.drain().is_empty());
}

#[tokio::test]
async fn unpaired_signals_go_nowhere() {
    let h = TestHarness::new().await.unwrap();
    let carol = h.user("carol").await.unwrap();
    let mut c1 = h.connect(&carol).await.unwrap();
    let mut c2 = h.connect(&carol).await.unwrap();

    let delivery = h
        .hub
        .presence
        .typing(&carol.id, Some(&c1.id), TypingState::Start)
        .await;
    assert_eq!(delivery.delivered, 0);
    assert!(c1.drain().is_empty());
    assert!(c2.drain().is_empty());
}
