// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline account administration: `tandem user ...` and `tandem token issue`.
//!
//! These commands open the database directly. A deactivation made here
//! takes effect for a running server on the next request or handshake; it
//! does not reach sockets that are already open.

use std::time::Duration;

use secrecy::SecretString;
use tandem_config::model::StorageConfig;
use tandem_core::{
    AccountStore, AuthRejection, IdentityStore, IssuedToken, TandemError, User, UserId,
};
use tandem_storage::SqliteStore;

/// Open and migrate the configured database.
pub async fn open_store(config: &StorageConfig) -> Result<SqliteStore, TandemError> {
    let store = SqliteStore::new(config.clone());
    store.initialize().await?;
    Ok(store)
}

pub async fn add_user(
    store: &SqliteStore,
    email: &str,
    display_name: &str,
    password: &SecretString,
) -> Result<User, TandemError> {
    let user = store.create_user(email, display_name, password).await?;
    tracing::info!(user_id = %user.id, "account created");
    Ok(user)
}

/// Deactivate by id or email. Returns the partner that was unlinked, if any.
pub async fn deactivate_user(
    store: &SqliteStore,
    identifier: &str,
) -> Result<Option<UserId>, TandemError> {
    let user = lookup(store, identifier).await?;
    let former_partner = store.deactivate_user(&user.id).await?;
    tracing::info!(
        user_id = %user.id,
        former_partner = ?former_partner,
        "account deactivated"
    );
    Ok(former_partner)
}

pub async fn list_users(store: &SqliteStore) -> Result<Vec<User>, TandemError> {
    store.list_users().await
}

/// Issue a bearer token for an active account.
pub async fn issue_token(
    store: &SqliteStore,
    identifier: &str,
    ttl: Duration,
) -> Result<IssuedToken, TandemError> {
    let user = lookup(store, identifier).await?;
    if !user.active {
        return Err(AuthRejection::InactiveUser.into());
    }
    store.issue_token(&user.id, ttl).await
}

async fn lookup(store: &SqliteStore, identifier: &str) -> Result<User, TandemError> {
    store
        .find_user(identifier)
        .await?
        .ok_or_else(|| TandemError::UserNotFound(identifier.to_string()))
}

/// Render accounts as a fixed-width table.
pub fn format_user_table(users: &[User]) -> String {
    if users.is_empty() {
        return "no users\n".to_string();
    }
    let email_width = users
        .iter()
        .map(|u| u.email.len())
        .max()
        .unwrap_or(0)
        .max("EMAIL".len());
    let name_width = users
        .iter()
        .map(|u| u.display_name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = format!(
        "{:<36}  {:<email_width$}  {:<name_width$}  {:<8}  PARTNER\n",
        "ID", "EMAIL", "NAME", "STATUS"
    );
    for user in users {
        let status = if user.active { "active" } else { "inactive" };
        let partner = user.partner_id.as_ref().map(UserId::as_str).unwrap_or("-");
        out.push_str(&format!(
            "{:<36}  {:<email_width$}  {:<name_width$}  {:<8}  {}\n",
            user.id.as_str(),
            user.email,
            user.display_name,
            status,
            partner
        ));
    }
    out
}
