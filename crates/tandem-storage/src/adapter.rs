// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the identity and account store traits.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::OnceCell;
use tracing::debug;

use tandem_config::model::StorageConfig;
use tandem_core::{
    AccountStore, IdentityStore, IssuedToken, PartnerLink, TandemError, TokenLookup,
    UnlinkOutcome, User, UserId,
};

use crate::crypto;
use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed identity store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened by [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured path. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), TandemError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| TandemError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Cheap liveness check for the health endpoint.
    pub async fn health_check(&self) -> Result<(), TandemError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL. The connection itself closes when the store drops.
    pub async fn close(&self) -> Result<(), TandemError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                })
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }

    fn db(&self) -> Result<&Database, TandemError> {
        self.db.get().ok_or_else(|| TandemError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, TandemError> {
        queries::users::get_user(self.db()?, id).await
    }

    async fn find_user(&self, identifier: &str) -> Result<Option<User>, TandemError> {
        queries::users::find_user(self.db()?, identifier).await
    }

    async fn partner_of(&self, id: &UserId) -> Result<Option<UserId>, TandemError> {
        queries::users::partner_of(self.db()?, id).await
    }

    async fn link_partners(
        &self,
        requester: &UserId,
        target_identifier: &str,
    ) -> Result<PartnerLink, TandemError> {
        queries::pairing::link_partners(self.db()?, requester, target_identifier).await
    }

    async fn unlink_partner(&self, requester: &UserId) -> Result<UnlinkOutcome, TandemError> {
        queries::pairing::unlink_partner(self.db()?, requester).await
    }

    async fn deactivate_user(&self, id: &UserId) -> Result<Option<UserId>, TandemError> {
        queries::pairing::deactivate_user(self.db()?, id).await
    }

    async fn resolve_token(&self, token: &str) -> Result<TokenLookup, TandemError> {
        queries::tokens::resolve_token(self.db()?, token).await
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password: &SecretString,
    ) -> Result<User, TandemError> {
        let hash = crypto::hash_password(password.expose_secret())?;
        queries::users::create_user(self.db()?, email, display_name, &hash).await
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<User>, TandemError> {
        let Some((user, hash)) = queries::users::credentials_for(self.db()?, email).await? else {
            return Ok(None);
        };
        if !user.active {
            return Ok(None);
        }
        let password = password.expose_secret().to_string();
        // Argon2 verification is CPU-bound.
        let matches = tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash))
            .await
            .map_err(|e| TandemError::Internal(format!("password check panicked: {e}")))?;
        Ok(matches.then_some(user))
    }

    async fn issue_token(&self, user: &UserId, ttl: Duration) -> Result<IssuedToken, TandemError> {
        queries::tokens::issue_token(self.db()?, user, ttl).await
    }

    async fn revoke_token(&self, token: &str) -> Result<Option<String>, TandemError> {
        queries::tokens::revoke_token(self.db()?, token).await
    }

    async fn list_users(&self) -> Result<Vec<User>, TandemError> {
        queries::users::list_users(self.db()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn uninitialized_store_errors() {
        let store = SqliteStore::new(make_config("/nonexistent/never.db"));
        let err = store.get_user(&UserId::from("x")).await.unwrap_err();
        assert!(matches!(err, TandemError::Storage { .. }));
    }

    #[tokio::test]
    async fn initialize_creates_file_and_rejects_double_init() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(db_path.exists());
        assert!(store.initialize().await.is_err());
        store.health_check().await.unwrap();
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn password_verification() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(dir.path().join("pw.db").to_str().unwrap()));
        store.initialize().await.unwrap();

        let secret = SecretString::from("hunter22".to_string());
        let user = store.create_user("eve@example.com", "Eve", &secret).await.unwrap();

        let ok = store.verify_password("EVE@example.com", &secret).await.unwrap();
        assert_eq!(ok.map(|u| u.id), Some(user.id.clone()));

        let wrong = SecretString::from("nope".to_string());
        assert!(store.verify_password("eve@example.com", &wrong).await.unwrap().is_none());

        store.deactivate_user(&user.id).await.unwrap();
        assert!(store.verify_password("eve@example.com", &secret).await.unwrap().is_none());
    }
}
