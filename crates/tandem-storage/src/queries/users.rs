// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User record queries.

use rusqlite::{Connection, OptionalExtension, Row, params};
use tandem_core::{TandemError, User, UserId};

use crate::database::{Database, map_tr_err};

/// Column list matching [`user_from_row`].
pub(crate) const USER_COLUMNS: &str =
    "id, email, display_name, partner_id, active, created_at, updated_at";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        display_name: row.get(2)?,
        partner_id: row.get::<_, Option<String>>(3)?.map(UserId),
        active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Load a user by id within an open connection or transaction.
pub(crate) fn select_user(conn: &Connection, id: &UserId) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.as_str()],
        user_from_row,
    )
    .optional()
}

/// Resolve an identifier (id, or email ignoring case) within a connection.
pub(crate) fn select_by_identifier(
    conn: &Connection,
    identifier: &str,
) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 OR email = ?1 COLLATE NOCASE"),
        params![identifier],
        user_from_row,
    )
    .optional()
}

/// Insert a new active, unpaired user. Fails with `UserExists` on a
/// duplicate email.
pub async fn create_user(
    db: &Database,
    email: &str,
    display_name: &str,
    password_hash: &str,
) -> Result<User, TandemError> {
    let id = UserId::generate();
    let email_owned = email.trim().to_string();
    let display_name = display_name.trim().to_string();
    let password_hash = password_hash.to_string();

    let inserted = db
        .connection()
        .call(move |conn| -> Result<Option<User>, rusqlite::Error> {
            let result = conn.execute(
                "INSERT INTO users (id, email, display_name, password_hash) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), email_owned, display_name, password_hash],
            );
            match result {
                Ok(_) => select_user(conn, &id),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    inserted.ok_or_else(|| TandemError::UserExists(email.trim().to_string()))
}

/// Fetch a user by id.
pub async fn get_user(db: &Database, id: &UserId) -> Result<Option<User>, TandemError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| select_user(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Resolve an identifier to a user, active or not.
pub async fn find_user(db: &Database, identifier: &str) -> Result<Option<User>, TandemError> {
    let identifier = identifier.trim().to_string();
    db.connection()
        .call(move |conn| select_by_identifier(conn, &identifier))
        .await
        .map_err(map_tr_err)
}

/// All users, oldest first.
pub async fn list_users(db: &Database) -> Result<Vec<User>, TandemError> {
    db.connection()
        .call(|conn| -> Result<Vec<User>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], user_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The current `partner_id` of `id`. Missing users have no partner.
pub async fn partner_of(db: &Database, id: &UserId) -> Result<Option<UserId>, TandemError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Option<UserId>, rusqlite::Error> {
            let partner: Option<Option<String>> = conn
                .query_row(
                    "SELECT partner_id FROM users WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(partner.flatten().map(UserId))
        })
        .await
        .map_err(map_tr_err)
}

/// The user and stored password hash for an email, if the account exists.
pub async fn credentials_for(
    db: &Database,
    email: &str,
) -> Result<Option<(User, String)>, TandemError> {
    let email = email.trim().to_string();
    db.connection()
        .call(move |conn| -> Result<Option<(User, String)>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1 COLLATE NOCASE"
                ),
                params![email],
                |row| Ok((user_from_row(row)?, row.get(7)?)),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let (db, _dir) = setup_db().await;
        let user = create_user(&db, "ana@example.com", "Ana", "hash").await.unwrap();
        assert!(user.active);
        assert!(user.partner_id.is_none());

        let fetched = get_user(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let (db, _dir) = setup_db().await;
        create_user(&db, "ana@example.com", "Ana", "hash").await.unwrap();
        let err = create_user(&db, "ANA@example.com", "Ana 2", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::UserExists(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_user_by_id_or_email() {
        let (db, _dir) = setup_db().await;
        let user = create_user(&db, "ben@example.com", "Ben", "hash").await.unwrap();

        let by_email = find_user(&db, "  BEN@example.com ").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = find_user(&db, user.id.as_str()).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ben@example.com");
        assert!(find_user(&db, "nobody@example.com").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn partner_of_unknown_user_is_none() {
        let (db, _dir) = setup_db().await;
        assert!(partner_of(&db, &UserId::from("ghost")).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn credentials_include_hash() {
        let (db, _dir) = setup_db().await;
        create_user(&db, "cy@example.com", "Cy", "stored-hash").await.unwrap();
        let (user, hash) = credentials_for(&db, "cy@example.com").await.unwrap().unwrap();
        assert_eq!(user.display_name, "Cy");
        assert_eq!(hash, "stored-hash");
        db.close().await.unwrap();
    }
}
