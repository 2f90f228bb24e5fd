// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory identity store with the same pairing semantics as the SQLite
//! store.
//!
//! All state sits behind one mutex that is never held across an `.await`,
//! so every operation is atomic. Extra knobs let tests force a one-sided
//! link or make the store fail.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tandem_core::{
    AccountStore, IdentityStore, IssuedToken, PairingError, PartnerLink, TandemError,
    TokenLookup, UnlinkOutcome, User, UserId, UserSummary,
};
use tandem_storage::crypto;

struct TokenRow {
    id: String,
    user_id: UserId,
    expires_at: chrono::DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    passwords: HashMap<UserId, String>,
    /// Keyed by token digest.
    tokens: HashMap<String, TokenRow>,
    /// Insertion order for `list_users`.
    order: Vec<UserId>,
}

impl State {
    fn resolve(&self, identifier: &str) -> Option<&User> {
        let identifier = identifier.trim();
        self.users.get(&UserId::from(identifier)).or_else(|| {
            self.users
                .values()
                .find(|u| u.email.eq_ignore_ascii_case(identifier))
        })
    }

    fn set_partner(&mut self, id: &UserId, partner: Option<UserId>) {
        if let Some(user) = self.users.get_mut(id) {
            user.partner_id = partner;
            user.updated_at = now();
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// An [`IdentityStore`] and [`AccountStore`] held entirely in memory.
#[derive(Default)]
pub struct MemoryIdentityStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a storage error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Overwrite one user's `partner_id` without touching anyone else.
    ///
    /// Only for simulating records changed behind the service's back.
    pub fn force_partner(&self, id: &UserId, partner: Option<UserId>) {
        if let Ok(mut state) = self.state.lock() {
            state.set_partner(id, partner);
        }
    }

    /// Mark a user inactive without dissolving anything or revoking tokens.
    pub fn force_inactive(&self, id: &UserId) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(user) = state.users.get_mut(id) {
                user.active = false;
            }
        }
    }

    /// Insert a user directly, with no password.
    pub fn insert_user(&self, email: &str, display_name: &str) -> User {
        let stamp = now();
        let user = User {
            id: UserId::generate(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            partner_id: None,
            active: true,
            created_at: stamp.clone(),
            updated_at: stamp,
        };
        if let Ok(mut state) = self.state.lock() {
            state.order.push(user.id.clone());
            state.users.insert(user.id.clone(), user.clone());
        }
        user
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, State>, TandemError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TandemError::Storage {
                source: "memory store unavailable".into(),
            });
        }
        self.state
            .lock()
            .map_err(|_| TandemError::Internal("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, TandemError> {
        Ok(self.state()?.users.get(id).cloned())
    }

    async fn find_user(&self, identifier: &str) -> Result<Option<User>, TandemError> {
        Ok(self.state()?.resolve(identifier).cloned())
    }

    async fn partner_of(&self, id: &UserId) -> Result<Option<UserId>, TandemError> {
        Ok(self
            .state()?
            .users
            .get(id)
            .and_then(|u| u.partner_id.clone()))
    }

    async fn link_partners(
        &self,
        requester: &UserId,
        target_identifier: &str,
    ) -> Result<PartnerLink, TandemError> {
        let mut state = self.state()?;

        let me = state
            .users
            .get(requester)
            .filter(|u| u.active)
            .cloned()
            .ok_or(PairingError::Inactive)?;
        let target = state
            .resolve(target_identifier)
            .filter(|u| u.active)
            .cloned()
            .ok_or_else(|| PairingError::NotFound(target_identifier.trim().to_string()))?;
        if me.id == target.id {
            return Err(PairingError::SelfPairing.into());
        }
        if me.is_paired() || target.is_paired() {
            return Err(PairingError::AlreadyPaired.into());
        }

        state.set_partner(&me.id, Some(target.id.clone()));
        state.set_partner(&target.id, Some(me.id.clone()));
        Ok(PartnerLink {
            user: UserSummary::from(&me),
            partner: UserSummary::from(&target),
        })
    }

    async fn unlink_partner(&self, requester: &UserId) -> Result<UnlinkOutcome, TandemError> {
        let mut state = self.state()?;
        let me = state
            .users
            .get(requester)
            .cloned()
            .ok_or(PairingError::Inactive)?;
        let former_partner = me.partner_id.clone().ok_or(PairingError::NoPartner)?;

        state.set_partner(&me.id, None);
        let points_back = state
            .users
            .get(&former_partner)
            .is_some_and(|p| p.partner_id.as_ref() == Some(&me.id));
        if points_back {
            state.set_partner(&former_partner, None);
        }
        Ok(UnlinkOutcome {
            user: me.id,
            former_partner,
            partner_cleared: points_back,
        })
    }

    async fn deactivate_user(&self, id: &UserId) -> Result<Option<UserId>, TandemError> {
        let mut state = self.state()?;
        let user = state
            .users
            .get_mut(id)
            .ok_or_else(|| TandemError::UserNotFound(id.to_string()))?;
        user.active = false;
        let former = user.partner_id.take();

        if let Some(partner) = &former {
            let points_back = state
                .users
                .get(partner)
                .is_some_and(|p| p.partner_id.as_ref() == Some(id));
            if points_back {
                state.set_partner(partner, None);
            }
        }
        for token in state.tokens.values_mut().filter(|t| &t.user_id == id) {
            token.revoked = true;
        }
        Ok(former)
    }

    async fn resolve_token(&self, token: &str) -> Result<TokenLookup, TandemError> {
        let state = self.state()?;
        let Some(row) = state.tokens.get(&crypto::hash_token(token)) else {
            return Ok(TokenLookup::Unknown);
        };
        let Some(user) = state.users.get(&row.user_id).cloned() else {
            return Ok(TokenLookup::Unknown);
        };
        // Deactivation revokes every token, so inactivity is checked first.
        if !user.active {
            return Ok(TokenLookup::Inactive(user));
        }
        if row.revoked {
            return Ok(TokenLookup::Revoked);
        }
        if row.expires_at <= Utc::now() {
            return Ok(TokenLookup::Expired);
        }
        Ok(TokenLookup::Valid {
            user,
            token_id: row.id.clone(),
        })
    }
}

#[async_trait]
impl AccountStore for MemoryIdentityStore {
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password: &SecretString,
    ) -> Result<User, TandemError> {
        let exists = self.state()?.resolve(email).is_some();
        if exists {
            return Err(TandemError::UserExists(email.trim().to_string()));
        }
        let hash = crypto::hash_password(password.expose_secret())?;
        let user = self.insert_user(email.trim(), display_name.trim());
        self.state()?.passwords.insert(user.id.clone(), hash);
        Ok(user)
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<User>, TandemError> {
        let state = self.state()?;
        let Some(user) = state.resolve(email).filter(|u| u.active).cloned() else {
            return Ok(None);
        };
        let ok = state
            .passwords
            .get(&user.id)
            .is_some_and(|hash| crypto::verify_password(password.expose_secret(), hash));
        Ok(ok.then_some(user))
    }

    async fn issue_token(&self, user: &UserId, ttl: Duration) -> Result<IssuedToken, TandemError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| TandemError::Internal(format!("token ttl out of range: {e}")))?;
        let token = crypto::generate_token();
        let row = TokenRow {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.clone(),
            expires_at: Utc::now() + ttl,
            revoked: false,
        };
        let issued = IssuedToken {
            token: token.clone(),
            token_id: row.id.clone(),
            user_id: user.clone(),
            expires_at: row
                .expires_at
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        self.state()?.tokens.insert(crypto::hash_token(&token), row);
        Ok(issued)
    }

    async fn revoke_token(&self, token: &str) -> Result<Option<String>, TandemError> {
        let mut state = self.state()?;
        Ok(state
            .tokens
            .get_mut(&crypto::hash_token(token))
            .filter(|row| !row.revoked)
            .map(|row| {
                row.revoked = true;
                row.id.clone()
            }))
    }

    async fn list_users(&self) -> Result<Vec<User>, TandemError> {
        let state = self.state()?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }
}
