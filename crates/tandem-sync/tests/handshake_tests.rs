// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use serde_json::json;
use tandem_core::{AuthRejection, ConnectionId, TandemError, User};
use tandem_sync::{ConnectionState, Credential, CredentialSource, Handshake, ServerFrame};
use tandem_test_utils::TestHarness;

const HOUR: Duration = Duration::from_secs(3600);

fn frame_credential(token: &str) -> Credential {
    Credential::new(token, CredentialSource::Frame)
}

async fn attempt(
    h: &TestHarness,
    credential: Option<Credential>,
) -> (Handshake, Result<(), TandemError>) {
    let mut handshake = Handshake::new();
    handshake.begin().unwrap();
    let result = handshake
        .authenticate(h.hub.identity.as_ref(), credential.as_ref())
        .await
        .map(|_| ());
    (handshake, result)
}

#[tokio::test]
async fn valid_token_authenticates() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let issued = h.accounts.issue_token(&alice.id, HOUR).await.unwrap();

    let (handshake, result) = attempt(&h, Some(frame_credential(&issued.token))).await;
    result.unwrap();
    assert_eq!(handshake.state(), ConnectionState::Authenticated);
    let session = handshake.session().unwrap();
    assert_eq!(session.user.id, alice.id);
    assert_eq!(session.token_id, issued.token_id);
}

#[tokio::test]
async fn unknown_expired_and_revoked_tokens_are_invalid() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let expired = h
        .accounts
        .issue_token(&alice.id, Duration::ZERO)
        .await
        .unwrap();
    let revoked = h.accounts.issue_token(&alice.id, HOUR).await.unwrap();
    h.accounts.revoke_token(&revoked.token).await.unwrap();

    for token in ["not-a-token", expired.token.as_str(), revoked.token.as_str()] {
        let (handshake, result) = attempt(&h, Some(frame_credential(token))).await;
        assert!(matches!(
            result,
            Err(TandemError::AuthRejected(AuthRejection::InvalidToken))
        ));
        assert_eq!(handshake.state(), ConnectionState::Disconnected);
        assert_eq!(handshake.rejection(), Some(AuthRejection::InvalidToken));
        assert!(handshake.session().is_none());
    }
}

#[tokio::test]
async fn deactivated_account_is_rejected_as_inactive() {
    for h in [
        TestHarness::new().await.unwrap(),
        TestHarness::builder().with_sqlite().build().await.unwrap(),
    ] {
        let alice = h.user("alice").await.unwrap();
        let issued = h.accounts.issue_token(&alice.id, HOUR).await.unwrap();
        h.hub.pairing.deactivate(&alice.id).await.unwrap();

        let (handshake, result) = attempt(&h, Some(frame_credential(&issued.token))).await;
        assert!(matches!(
            result,
            Err(TandemError::AuthRejected(AuthRejection::InactiveUser))
        ));
        assert_eq!(handshake.rejection(), Some(AuthRejection::InactiveUser));
    }
}

#[tokio::test]
async fn inactive_flag_alone_is_enough() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let issued = h.accounts.issue_token(&alice.id, HOUR).await.unwrap();
    h.memory().unwrap().force_inactive(&alice.id);

    let (_, result) = attempt(&h, Some(frame_credential(&issued.token))).await;
    assert!(matches!(
        result,
        Err(TandemError::AuthRejected(AuthRejection::InactiveUser))
    ));
}

#[tokio::test]
async fn missing_credential_is_no_token() {
    let h = TestHarness::new().await.unwrap();
    let (handshake, result) = attempt(&h, None).await;
    assert!(matches!(
        result,
        Err(TandemError::AuthRejected(AuthRejection::NoToken))
    ));
    assert_eq!(handshake.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn store_failure_disconnects_without_rejection() {
    let h = TestHarness::new().await.unwrap();
    h.memory().unwrap().set_unavailable(true);

    let (handshake, result) = attempt(&h, Some(frame_credential("whatever"))).await;
    assert!(matches!(result, Err(TandemError::Storage { .. })));
    assert_eq!(handshake.state(), ConnectionState::Disconnected);
    assert_eq!(handshake.rejection(), None);
}

#[tokio::test]
async fn cannot_authenticate_twice() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let issued = h.accounts.issue_token(&alice.id, HOUR).await.unwrap();
    let credential = frame_credential(&issued.token);

    let (mut handshake, result) = attempt(&h, Some(credential.clone())).await;
    result.unwrap();
    let err = handshake
        .authenticate(h.hub.identity.as_ref(), Some(&credential))
        .await
        .unwrap_err();
    assert!(matches!(err, TandemError::IllegalTransition { .. }));
    assert_eq!(handshake.state(), ConnectionState::Authenticated);
}

#[tokio::test]
async fn sqlite_tokens_authenticate_too() {
    let h = TestHarness::builder().with_sqlite().build().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let issued = h.accounts.issue_token(&alice.id, HOUR).await.unwrap();

    let (handshake, result) = attempt(&h, Some(frame_credential(&issued.token))).await;
    result.unwrap();
    assert_eq!(handshake.session().unwrap().user.email, "alice@example.com");
}

/// Authenticate `user` with a fresh token, returning the raw token and the
/// session's token id.
async fn authenticated(h: &TestHarness, user: &User) -> (String, String) {
    let issued = h.accounts.issue_token(&user.id, HOUR).await.unwrap();
    let (handshake, result) = attempt(h, Some(frame_credential(&issued.token))).await;
    result.unwrap();
    let token_id = handshake.session().unwrap().token_id.clone();
    (issued.token, token_id)
}

#[tokio::test]
async fn logout_before_registration_leaves_nothing_live() {
    for h in [
        TestHarness::new().await.unwrap(),
        TestHarness::builder().with_sqlite().build().await.unwrap(),
    ] {
        let alice = h.user("alice").await.unwrap();
        let bob = h.user("bob").await.unwrap();
        h.pair(&alice, &bob).await.unwrap();
        let (token, token_id) = authenticated(&h, &bob).await;

        h.accounts.revoke_token(&token).await.unwrap();
        assert_eq!(h.hub.registry.disconnect_token(&token_id, "logout"), 0);

        let err = h
            .hub
            .registry
            .register_session(&bob.id, ConnectionId::from("b1"), &token, &token_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TandemError::AuthRejected(AuthRejection::InvalidToken)
        ));
        assert_eq!(h.hub.registry.connection_count(), 0);

        let delivery = h
            .hub
            .router
            .notify_partner(&alice.id, "task:created", json!({}))
            .await
            .unwrap();
        assert_eq!(delivery.delivered, 0);
    }
}

#[tokio::test]
async fn deactivation_before_registration_reports_inactive() {
    let h = TestHarness::builder().with_sqlite().build().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let (token, token_id) = authenticated(&h, &alice).await;

    h.hub.pairing.deactivate(&alice.id).await.unwrap();

    let err = h
        .hub
        .registry
        .register_session(&alice.id, ConnectionId::from("a1"), &token, &token_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TandemError::AuthRejected(AuthRejection::InactiveUser)
    ));
    assert!(h.hub.registry.connections_of_user(&alice.id).is_empty());
}

#[tokio::test]
async fn logout_after_registration_finds_the_connection() {
    let h = TestHarness::new().await.unwrap();
    let alice = h.user("alice").await.unwrap();
    let (token, token_id) = authenticated(&h, &alice).await;

    let mut registration = h
        .hub
        .registry
        .register_session(&alice.id, ConnectionId::from("a1"), &token, &token_id)
        .await
        .unwrap();
    assert_eq!(registration.connection.token_id.as_deref(), Some(token_id.as_str()));

    h.accounts.revoke_token(&token).await.unwrap();
    assert_eq!(h.hub.registry.disconnect_token(&token_id, "logout"), 1);
    assert!(matches!(
        registration.receiver.recv().await,
        Some(ServerFrame::Disconnect { ref reason }) if reason == "logout"
    ));
    assert!(registration.receiver.recv().await.is_none());
}
