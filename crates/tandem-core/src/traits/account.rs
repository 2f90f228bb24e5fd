// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account trait: registration, login, and bearer token lifecycle.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::TandemError;
use crate::types::{IssuedToken, User, UserId};

/// Minimal account management needed to obtain pairing credentials.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an active, unpaired account.
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password: &SecretString,
    ) -> Result<User, TandemError>;

    /// Check a password. Returns `None` for unknown emails, wrong passwords,
    /// and deactivated accounts alike.
    async fn verify_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<User>, TandemError>;

    /// Issue a new bearer token valid for `ttl`.
    async fn issue_token(&self, user: &UserId, ttl: Duration) -> Result<IssuedToken, TandemError>;

    /// Revoke a bearer token. Returns the token id if it was live.
    async fn revoke_token(&self, token: &str) -> Result<Option<String>, TandemError>;

    /// All accounts, oldest first.
    async fn list_users(&self) -> Result<Vec<User>, TandemError>;
}
