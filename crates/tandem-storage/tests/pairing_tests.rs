// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for transactional pairing against a real SQLite file.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tandem_config::model::StorageConfig;
use tandem_core::{
    AccountStore, IdentityStore, PairingError, TandemError, TokenLookup, User, UserId,
};
use tandem_storage::SqliteStore;
use tempfile::TempDir;

async fn store() -> (Arc<SqliteStore>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(StorageConfig {
        database_path: dir.path().join("pairing.db").to_str().unwrap().to_string(),
        wal_mode: true,
    });
    store.initialize().await.unwrap();
    (Arc::new(store), dir)
}

async fn user(store: &SqliteStore, name: &str) -> User {
    let secret = SecretString::from("password".to_string());
    store
        .create_user(&format!("{name}@example.com"), name, &secret)
        .await
        .unwrap()
}

fn pairing_err(err: TandemError) -> PairingError {
    match err {
        TandemError::Pairing(p) => p,
        other => panic!("expected pairing error, got {other:?}"),
    }
}

async fn partner(store: &SqliteStore, id: &UserId) -> Option<UserId> {
    store.partner_of(id).await.unwrap()
}

#[tokio::test]
async fn link_is_symmetric_by_email() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;

    let link = store.link_partners(&a.id, "BLAKE@example.com").await.unwrap();
    assert_eq!(link.user.id, a.id);
    assert_eq!(link.partner.id, b.id);
    assert_eq!(link.partner.display_name, "blake");

    assert_eq!(partner(&store, &a.id).await, Some(b.id.clone()));
    assert_eq!(partner(&store, &b.id).await, Some(a.id.clone()));
}

#[tokio::test]
async fn link_by_user_id() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;
    store.link_partners(&a.id, b.id.as_str()).await.unwrap();
    assert_eq!(partner(&store, &b.id).await, Some(a.id));
}

#[tokio::test]
async fn refusals_leave_no_partial_state() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;
    let c = user(&store, "casey").await;

    let err = store.link_partners(&a.id, "alex@example.com").await.unwrap_err();
    assert_eq!(pairing_err(err), PairingError::SelfPairing);

    let err = store.link_partners(&a.id, "ghost@example.com").await.unwrap_err();
    assert_eq!(
        pairing_err(err),
        PairingError::NotFound("ghost@example.com".to_string())
    );

    store.link_partners(&a.id, "blake@example.com").await.unwrap();

    let err = store.link_partners(&c.id, "alex@example.com").await.unwrap_err();
    assert_eq!(pairing_err(err), PairingError::AlreadyPaired);
    let err = store.link_partners(&a.id, "casey@example.com").await.unwrap_err();
    assert_eq!(pairing_err(err), PairingError::AlreadyPaired);

    assert_eq!(partner(&store, &c.id).await, None);
    assert_eq!(partner(&store, &a.id).await, Some(b.id.clone()));
    assert_eq!(partner(&store, &b.id).await, Some(a.id));
}

#[tokio::test]
async fn inactive_target_is_not_found_and_inactive_requester_refused() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;
    store.deactivate_user(&b.id).await.unwrap();

    let err = store.link_partners(&a.id, "blake@example.com").await.unwrap_err();
    assert!(matches!(pairing_err(err), PairingError::NotFound(_)));

    let err = store.link_partners(&b.id, "alex@example.com").await.unwrap_err();
    assert_eq!(pairing_err(err), PairingError::Inactive);
}

#[tokio::test]
async fn unlink_clears_both_sides() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;
    store.link_partners(&a.id, "blake@example.com").await.unwrap();

    let outcome = store.unlink_partner(&b.id).await.unwrap();
    assert_eq!(outcome.former_partner, a.id);
    assert!(outcome.partner_cleared);
    assert_eq!(partner(&store, &a.id).await, None);
    assert_eq!(partner(&store, &b.id).await, None);

    let err = store.unlink_partner(&a.id).await.unwrap_err();
    assert_eq!(pairing_err(err), PairingError::NoPartner);
}

#[tokio::test]
async fn relink_after_unlink() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;
    let c = user(&store, "casey").await;
    store.link_partners(&a.id, "blake@example.com").await.unwrap();
    store.unlink_partner(&a.id).await.unwrap();
    store.link_partners(&a.id, "casey@example.com").await.unwrap();
    assert_eq!(partner(&store, &a.id).await, Some(c.id.clone()));
    assert_eq!(partner(&store, &c.id).await, Some(a.id));
    assert_eq!(partner(&store, &b.id).await, None);
}

#[tokio::test]
async fn deactivate_dissolves_and_revokes() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;
    store.link_partners(&a.id, "blake@example.com").await.unwrap();
    let token = store.issue_token(&a.id, Duration::from_secs(600)).await.unwrap();

    let former = store.deactivate_user(&a.id).await.unwrap();
    assert_eq!(former, Some(b.id.clone()));
    assert_eq!(partner(&store, &b.id).await, None);
    assert!(!store.get_user(&a.id).await.unwrap().unwrap().active);
    assert!(matches!(
        store.resolve_token(&token.token).await.unwrap(),
        TokenLookup::Inactive(ref user) if user.id == a.id
    ));
}

#[tokio::test]
async fn deactivate_unknown_user() {
    let (store, _dir) = store().await;
    let err = store.deactivate_user(&UserId::from("ghost")).await.unwrap_err();
    assert!(matches!(err, TandemError::UserNotFound(_)));
}

#[tokio::test]
async fn concurrent_links_for_same_pair_produce_one_partnership() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;

    let attempts = (0..8).map(|i| {
        let store = Arc::clone(&store);
        let (from, to) = if i % 2 == 0 {
            (a.id.clone(), "blake@example.com")
        } else {
            (b.id.clone(), "alex@example.com")
        };
        tokio::spawn(async move { store.link_partners(&from, to).await })
    });
    let results = futures::future::join_all(attempts).await;

    let successes = results
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|r| match r {
            Ok(_) => true,
            Err(TandemError::Pairing(PairingError::AlreadyPaired)) => false,
            Err(other) => panic!("unexpected error: {other:?}"),
        })
        .count();
    assert_eq!(successes, 1);
    assert_eq!(partner(&store, &a.id).await, Some(b.id.clone()));
    assert_eq!(partner(&store, &b.id).await, Some(a.id));
}

#[tokio::test]
async fn concurrent_links_to_different_targets_never_form_a_triangle() {
    let (store, _dir) = store().await;
    let a = user(&store, "alex").await;
    let b = user(&store, "blake").await;
    let c = user(&store, "casey").await;

    let s1 = Arc::clone(&store);
    let s2 = Arc::clone(&store);
    let s3 = Arc::clone(&store);
    let (a1, a2, cid) = (a.id.clone(), a.id.clone(), c.id.clone());
    let (r1, r2, r3) = tokio::join!(
        tokio::spawn(async move { s1.link_partners(&a1, "blake@example.com").await }),
        tokio::spawn(async move { s2.link_partners(&a2, "casey@example.com").await }),
        tokio::spawn(async move { s3.link_partners(&cid, "blake@example.com").await }),
    );
    let ok = [r1.unwrap(), r2.unwrap(), r3.unwrap()]
        .into_iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(ok, 1, "exactly one pairing of the three users can win");

    // Whoever won, the relation is symmetric and the third user is single.
    let users = [&a.id, &b.id, &c.id];
    let mut paired = 0;
    for id in users {
        if let Some(p) = partner(&store, id).await {
            paired += 1;
            assert_eq!(partner(&store, &p).await.as_ref(), Some(id));
        }
    }
    assert_eq!(paired, 2);
}
