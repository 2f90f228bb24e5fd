// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactional partner link, unlink, and account deactivation.
//!
//! Each operation runs inside one `BEGIN IMMEDIATE` transaction on the single
//! writer connection. Link writes are compare-and-swap updates guarded by
//! `partner_id IS NULL`; if fewer than both rows change, the transaction is
//! rolled back and the request is refused, so concurrent attempts can never
//! produce a half-written or triangular partnership.

use rusqlite::{Connection, TransactionBehavior, params};
use tandem_core::{PairingError, PartnerLink, TandemError, UnlinkOutcome, UserId, UserSummary};
use tracing::debug;

use crate::database::{Database, map_tr_err, now_timestamp};
use crate::queries::users::{select_by_identifier, select_user};

/// Domain outcome of a storage closure: either the value or a typed refusal
/// that was decided inside the transaction.
enum Attempt<T> {
    Done(T),
    Refused(PairingError),
}

impl<T> Attempt<T> {
    fn into_result(self) -> Result<T, TandemError> {
        match self {
            Attempt::Done(value) => Ok(value),
            Attempt::Refused(reason) => Err(reason.into()),
        }
    }
}

/// Link `requester` with the active user named by `target_identifier`.
pub async fn link_partners(
    db: &Database,
    requester: &UserId,
    target_identifier: &str,
) -> Result<PartnerLink, TandemError> {
    let requester = requester.clone();
    let identifier = target_identifier.trim().to_string();

    let attempt = db
        .connection()
        .call(move |conn| -> Result<Attempt<PartnerLink>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(me) = select_user(&tx, &requester)?.filter(|u| u.active) else {
                return Ok(Attempt::Refused(PairingError::Inactive));
            };
            let Some(target) = select_by_identifier(&tx, &identifier)?.filter(|u| u.active)
            else {
                return Ok(Attempt::Refused(PairingError::NotFound(identifier)));
            };
            if target.id == me.id {
                return Ok(Attempt::Refused(PairingError::SelfPairing));
            }
            if me.is_paired() || target.is_paired() {
                return Ok(Attempt::Refused(PairingError::AlreadyPaired));
            }

            let now = now_timestamp();
            let mut changed = 0;
            for (id, partner) in [(&me.id, &target.id), (&target.id, &me.id)] {
                changed += tx.execute(
                    "UPDATE users SET partner_id = ?1, updated_at = ?2
                     WHERE id = ?3 AND partner_id IS NULL AND active = 1",
                    params![partner.as_str(), now, id.as_str()],
                )?;
            }
            if changed != 2 {
                // Dropping the transaction rolls it back.
                return Ok(Attempt::Refused(PairingError::AlreadyPaired));
            }
            tx.commit()?;

            Ok(Attempt::Done(PartnerLink {
                user: UserSummary::from(&me),
                partner: UserSummary::from(&target),
            }))
        })
        .await
        .map_err(map_tr_err)?;

    let link = attempt.into_result()?;
    debug!(user = %link.user.id, partner = %link.partner.id, "partners linked");
    Ok(link)
}

/// Clear the requester's partner, and the partner's side if it still points
/// back at the requester.
fn dissolve(conn: &Connection, user: &UserId, partner: &UserId) -> rusqlite::Result<bool> {
    let now = now_timestamp();
    conn.execute(
        "UPDATE users SET partner_id = NULL, updated_at = ?1 WHERE id = ?2",
        params![now, user.as_str()],
    )?;
    let cleared = conn.execute(
        "UPDATE users SET partner_id = NULL, updated_at = ?1
         WHERE id = ?2 AND partner_id = ?3",
        params![now, partner.as_str(), user.as_str()],
    )?;
    Ok(cleared == 1)
}

/// Dissolve the requester's partnership.
pub async fn unlink_partner(db: &Database, requester: &UserId) -> Result<UnlinkOutcome, TandemError> {
    let requester = requester.clone();

    let attempt = db
        .connection()
        .call(move |conn| -> Result<Attempt<UnlinkOutcome>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(me) = select_user(&tx, &requester)? else {
                return Ok(Attempt::Refused(PairingError::Inactive));
            };
            let Some(former_partner) = me.partner_id else {
                return Ok(Attempt::Refused(PairingError::NoPartner));
            };

            let partner_cleared = dissolve(&tx, &me.id, &former_partner)?;
            tx.commit()?;

            Ok(Attempt::Done(UnlinkOutcome {
                user: me.id,
                former_partner,
                partner_cleared,
            }))
        })
        .await
        .map_err(map_tr_err)?;

    let outcome = attempt.into_result()?;
    debug!(
        user = %outcome.user,
        former_partner = %outcome.former_partner,
        partner_cleared = outcome.partner_cleared,
        "partnership dissolved"
    );
    Ok(outcome)
}

/// Deactivate `id`: mark inactive, dissolve any partnership, and revoke all
/// of its tokens. Returns the former partner.
pub async fn deactivate_user(db: &Database, id: &UserId) -> Result<Option<UserId>, TandemError> {
    let user_id = id.clone();

    let result = db
        .connection()
        .call(move |conn| -> Result<Option<Option<UserId>>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(user) = select_user(&tx, &user_id)? else {
                return Ok(None);
            };
            let now = now_timestamp();
            tx.execute(
                "UPDATE users SET active = 0, updated_at = ?1 WHERE id = ?2",
                params![now, user.id.as_str()],
            )?;
            if let Some(partner) = &user.partner_id {
                dissolve(&tx, &user.id, partner)?;
            }
            tx.execute(
                "UPDATE auth_tokens SET revoked_at = ?1
                 WHERE user_id = ?2 AND revoked_at IS NULL",
                params![now, user.id.as_str()],
            )?;
            tx.commit()?;
            Ok(Some(user.partner_id))
        })
        .await
        .map_err(map_tr_err)?;

    let former_partner = result.ok_or_else(|| TandemError::UserNotFound(id.to_string()))?;
    debug!(user = %id, had_partner = former_partner.is_some(), "account deactivated");
    Ok(former_partner)
}
