// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer token issue, lookup, and revocation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tandem_core::{IssuedToken, TandemError, TokenLookup, User, UserId};

use crate::crypto::{generate_token, hash_token};
use crate::database::{Database, format_timestamp, map_tr_err, now_timestamp};
use crate::queries::users::USER_COLUMNS;

/// Issue a token for `user`. Only the digest is stored.
pub async fn issue_token(
    db: &Database,
    user: &UserId,
    ttl: Duration,
) -> Result<IssuedToken, TandemError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| TandemError::Internal(format!("token ttl out of range: {e}")))?;
    let token = generate_token();
    let token_id = uuid::Uuid::new_v4().to_string();
    let expires_at = format_timestamp(Utc::now() + ttl);

    let row = (
        token_id.clone(),
        user.as_str().to_string(),
        hash_token(&token),
        expires_at.clone(),
    );
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO auth_tokens (id, user_id, token_hash, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.0, row.1, row.2, row.3],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .map_err(map_tr_err)?;

    Ok(IssuedToken {
        token,
        token_id,
        user_id: user.clone(),
        expires_at,
    })
}

/// Classify a presented token.
pub async fn resolve_token(db: &Database, token: &str) -> Result<TokenLookup, TandemError> {
    let digest = hash_token(token);

    type Row = (String, String, Option<String>, User);
    let found: Option<Row> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT t.id, t.expires_at, t.revoked_at, {cols}
                     FROM auth_tokens t JOIN users u ON u.id = t.user_id
                     WHERE t.token_hash = ?1",
                    cols = prefixed_user_columns("u")
                ),
                params![digest],
                |row| {
                    let user = User {
                        id: UserId(row.get(3)?),
                        email: row.get(4)?,
                        display_name: row.get(5)?,
                        partner_id: row.get::<_, Option<String>>(6)?.map(UserId),
                        active: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    };
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, user))
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    let Some((token_id, expires_at, revoked_at, user)) = found else {
        return Ok(TokenLookup::Unknown);
    };
    // Deactivation revokes every token, so inactivity is checked first.
    if !user.active {
        return Ok(TokenLookup::Inactive(user));
    }
    if revoked_at.is_some() {
        return Ok(TokenLookup::Revoked);
    }
    let expired = DateTime::parse_from_rfc3339(&expires_at)
        .map(|at| at.with_timezone(&Utc) <= Utc::now())
        .unwrap_or(true);
    if expired {
        return Ok(TokenLookup::Expired);
    }
    Ok(TokenLookup::Valid { user, token_id })
}

/// Mark a live token revoked. Returns its id, or `None` if it was unknown or
/// already revoked.
pub async fn revoke_token(db: &Database, token: &str) -> Result<Option<String>, TandemError> {
    let digest = hash_token(token);
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "UPDATE auth_tokens SET revoked_at = ?1
                 WHERE token_hash = ?2 AND revoked_at IS NULL
                 RETURNING id",
                params![now, digest],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

fn prefixed_user_columns(alias: &str) -> String {
    USER_COLUMNS
        .split(", ")
        .map(|col| format!("{alias}.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
}
