// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity store trait: the authoritative source of `partner_id`.

use async_trait::async_trait;

use crate::error::TandemError;
use crate::types::{PartnerLink, TokenLookup, UnlinkOutcome, User, UserId};

/// Read and pairing access to user records.
///
/// Implementations must make `link_partners`, `unlink_partner` and
/// `deactivate_user` atomic: no reader may ever observe one side of a
/// partnership set without the other.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch a user by id.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, TandemError>;

    /// Resolve an identifier (user id or email, case-insensitive) to a user.
    async fn find_user(&self, identifier: &str) -> Result<Option<User>, TandemError>;

    /// Current partner of `id`, read fresh from the store.
    async fn partner_of(&self, id: &UserId) -> Result<Option<UserId>, TandemError>;

    /// Link `requester` with the user named by `target_identifier`.
    ///
    /// Fails with [`PairingError`](crate::PairingError) variants wrapped in
    /// [`TandemError::Pairing`]. Check and write happen in one transaction
    /// with compare-and-swap on `partner_id IS NULL`.
    async fn link_partners(
        &self,
        requester: &UserId,
        target_identifier: &str,
    ) -> Result<PartnerLink, TandemError>;

    /// Dissolve the requester's partnership, clearing the partner's side only
    /// if it still points back at the requester.
    async fn unlink_partner(&self, requester: &UserId) -> Result<UnlinkOutcome, TandemError>;

    /// Deactivate an account, dissolving its partnership and revoking its
    /// tokens. Returns the former partner, if any.
    async fn deactivate_user(&self, id: &UserId) -> Result<Option<UserId>, TandemError>;

    /// Resolve a bearer token presented by a client.
    async fn resolve_token(&self, token: &str) -> Result<TokenLookup, TandemError>;
}
