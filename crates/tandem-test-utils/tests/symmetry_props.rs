// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property: no sequence of link/unlink calls leaves a one-sided partnership.

use proptest::prelude::*;
use tandem_core::{IdentityStore, User};
use tandem_test_utils::MemoryIdentityStore;

#[derive(Debug, Clone)]
enum Op {
    Link(usize, usize),
    Unlink(usize),
}

fn op(users: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..users, 0..users).prop_map(|(a, b)| Op::Link(a, b)),
        (0..users).prop_map(Op::Unlink),
    ]
}

async fn assert_symmetric(store: &MemoryIdentityStore, users: &[User]) {
    for user in users {
        if let Some(partner) = store.partner_of(&user.id).await.unwrap() {
            assert_ne!(partner, user.id, "self-paired");
            assert_eq!(
                store.partner_of(&partner).await.unwrap().as_ref(),
                Some(&user.id),
                "one-sided link"
            );
        }
    }
}

proptest! {
    #[test]
    fn link_unlink_sequences_stay_symmetric(ops in prop::collection::vec(op(5), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = MemoryIdentityStore::new();
            let users: Vec<User> = (0..5)
                .map(|i| store.insert_user(&format!("u{i}@example.com"), &format!("u{i}")))
                .collect();

            for op in ops {
                match op {
                    Op::Link(a, b) => {
                        let _ = store.link_partners(&users[a].id, &users[b].email).await;
                    }
                    Op::Unlink(a) => {
                        let _ = store.unlink_partner(&users[a].id).await;
                    }
                }
                assert_symmetric(&store, &users).await;
            }
        });
    }
}
