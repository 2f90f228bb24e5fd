// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde_json::json;
use tandem_core::{GroupId, PairingError, TandemError};
use tandem_sync::{Domain, EmitOptions, ServerFrame, disconnect_reasons};
use tandem_test_utils::TestHarness;

#[tokio::test]
async fn link_announces_to_both_sides_with_partner_summary() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    let mut a1 = h.connect(&alice).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();

    let link = h
        .hub
        .pairing
        .propose_or_join(&alice.id, "BOB@example.com")
        .await
        .unwrap();
    assert_eq!(link.user.id, alice.id);
    assert_eq!(link.partner.id, bob.id);

    match a1.next_frame().await.unwrap() {
        ServerFrame::Event {
            event,
            data,
            actor_id,
            ..
        } => {
            assert_eq!(event.as_str(), "partner:linked");
            assert_eq!(data["partner"]["id"], bob.id.as_str());
            assert_eq!(actor_id, bob.id);
        }
        other => panic!("unexpected frame {other:?}"),
    }
    match b1.next_frame().await.unwrap() {
        ServerFrame::Event { event, data, .. } => {
            assert_eq!(event.as_str(), "partner:linked");
            assert_eq!(data["partner"]["display_name"], "alice");
        }
        other => panic!("unexpected frame {other:?}"),
    }
}

#[tokio::test]
async fn refusals_change_nothing_and_announce_nothing() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    let carol = h.user("carol").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let mut c1 = h.connect(&carol).await.unwrap();

    let err = h
        .hub
        .pairing
        .propose_or_join(&carol.id, &alice.email)
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::Pairing(PairingError::AlreadyPaired)));

    let err = h
        .hub
        .pairing
        .propose_or_join(&carol.id, &carol.email)
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::Pairing(PairingError::SelfPairing)));

    let err = h
        .hub
        .pairing
        .propose_or_join(&carol.id, "nobody@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::Pairing(PairingError::NotFound(_))));

    assert!(c1.drain().is_empty());
    assert_eq!(h.hub.pairing.status(&carol.id).await.unwrap(), None);
    let snapshot = h.hub.registry.snapshot(&c1.id).unwrap();
    assert_eq!(snapshot.groups.len(), 1);
}

#[tokio::test]
async fn status_reads_current_partner() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    assert_eq!(h.hub.pairing.status(&alice.id).await.unwrap(), None);

    h.pair(&alice, &bob).await.unwrap();
    let partner = h.hub.pairing.status(&alice.id).await.unwrap().unwrap();
    assert_eq!(partner.id, bob.id);
    assert_eq!(partner.display_name, "bob");

    let err = h
        .hub
        .pairing
        .status(&tandem_core::UserId::from("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::UserNotFound(_)));
}

#[tokio::test]
async fn dissolve_notifies_both_and_then_refuses() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let mut a1 = h.connect(&alice).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();
    a1.drain();
    b1.drain();

    let outcome = h.hub.pairing.dissolve(&alice.id).await.unwrap();
    assert_eq!(outcome.former_partner, bob.id);
    assert!(outcome.partner_cleared);

    assert_eq!(a1.drain_event_names(), vec!["partner:unlinked"]);
    assert_eq!(b1.drain_event_names(), vec!["partner:unlinked"]);

    let err = h.hub.pairing.dissolve(&bob.id).await.unwrap_err();
    assert!(matches!(err, TandemError::Pairing(PairingError::NoPartner)));
}

#[tokio::test]
async fn one_sided_record_only_clears_requester() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    let carol = h.user("carol").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let store = h.memory().unwrap();
    store.force_partner(&bob.id, Some(carol.id.clone()));
    let mut b1 = h.connect(&bob).await.unwrap();
    b1.drain();

    let outcome = h.hub.pairing.dissolve(&alice.id).await.unwrap();
    assert!(!outcome.partner_cleared);
    assert!(b1.drain().is_empty());
    assert_eq!(
        h.hub.pairing.status(&bob.id).await.unwrap().map(|p| p.id),
        Some(carol.id)
    );
}

#[tokio::test]
async fn deactivate_disconnects_user_and_frees_partner() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let mut a1 = h.connect(&alice).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();
    a1.drain();
    b1.drain();

    let former = h.hub.pairing.deactivate(&alice.id).await.unwrap();
    assert_eq!(former, Some(bob.id.clone()));

    assert_eq!(
        a1.drain().last(),
        Some(&ServerFrame::disconnect(disconnect_reasons::INACTIVE_USER))
    );
    assert_eq!(b1.drain_event_names(), vec!["partner:unlinked"]);
    assert!(
        !h.hub
            .registry
            .connections_in_group(&GroupId::for_user(&alice.id))
            .contains(&b1.id)
    );
    assert_eq!(h.hub.pairing.status(&bob.id).await.unwrap(), None);

    // Bob is free to pair again, but not with the inactive account.
    let err = h
        .hub
        .pairing
        .propose_or_join(&bob.id, &alice.email)
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::Pairing(PairingError::NotFound(_))));
}

#[tokio::test]
async fn domain_emitters_route_to_partner() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    h.pair(&alice, &bob).await.unwrap();
    let mut b1 = h.connect(&bob).await.unwrap();
    let a1 = h.connect(&alice).await.unwrap();
    b1.drain();

    let tasks = h.hub.emitter(Domain::Task);
    tasks.created(&alice.id, json!({"id": "t1"})).await;
    tasks.updated(&alice.id, json!({"id": "t1"})).await;
    tasks.deleted(&alice.id, json!({"id": "t1"})).await;
    tasks
        .emit_custom(
            &alice.id,
            "completed",
            json!({"id": "t1"}),
            EmitOptions::excluding(a1.id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(
        b1.drain_event_names(),
        vec!["task:created", "task:updated", "task:deleted", "task:completed"]
    );

    let err = tasks
        .emit_custom(&alice.id, "Not Valid", json!({}), EmitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::InvalidEventName(_)));
}

#[tokio::test]
async fn concurrent_pairing_yields_one_partnership() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let bob = h.user("bob").await.unwrap();
    let carol = h.user("carol").await.unwrap();

    let (ab, ac, cb) = tokio::join!(
        h.hub.pairing.propose_or_join(&alice.id, &bob.email),
        h.hub.pairing.propose_or_join(&alice.id, &carol.email),
        h.hub.pairing.propose_or_join(&carol.id, &bob.email),
    );
    let successes = [ab.is_ok(), ac.is_ok(), cb.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1);

    let mut paired = 0;
    for user in [&alice, &bob, &carol] {
        if let Some(partner) = h.hub.pairing.status(&user.id).await.unwrap() {
            paired += 1;
            let back = h.hub.pairing.status(&partner.id).await.unwrap().unwrap();
            assert_eq!(back.id, user.id);
        }
    }
    assert_eq!(paired, 2);
}
