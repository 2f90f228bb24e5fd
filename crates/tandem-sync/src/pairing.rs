// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairing service: link and dissolve partnerships, then bring live
//! connections in line with the new state.
//!
//! The store decides; this layer only reacts. Refusals come back from the
//! store as typed [`PairingError`](tandem_core::PairingError)s and are returned
//! unchanged. After a committed change, membership is recomputed for both
//! users and each side's own devices get a `partner:linked` or
//! `partner:unlinked` event. A failure in that follow-up is logged, never
//! reported, because the pairing itself has already taken effect.

use std::sync::Arc;

use serde_json::json;
use tandem_core::{
    DomainEvent, EventName, IdentityStore, PartnerLink, TandemError, UnlinkOutcome, UserId,
    UserSummary,
};
use tracing::{info, warn};

use crate::frame::{ServerFrame, disconnect_reasons};
use crate::registry::ConnectionRegistry;
use crate::router::EventRouter;

pub struct PairingService {
    identity: Arc<dyn IdentityStore>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<EventRouter>,
}

impl PairingService {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        registry: Arc<ConnectionRegistry>,
        router: Arc<EventRouter>,
    ) -> Self {
        Self {
            identity,
            registry,
            router,
        }
    }

    /// Link `requester` with the active user named by `target_identifier`
    /// (user id or email).
    pub async fn propose_or_join(
        &self,
        requester: &UserId,
        target_identifier: &str,
    ) -> Result<PartnerLink, TandemError> {
        let link = self
            .identity
            .link_partners(requester, target_identifier)
            .await?;
        info!(user_id = %link.user.id, partner_id = %link.partner.id, "partnership established");

        self.recompute(&[&link.user.id, &link.partner.id]).await;
        self.announce_linked(&link.user, &link.partner);
        self.announce_linked(&link.partner, &link.user);
        Ok(link)
    }

    /// Dissolve the requester's partnership.
    pub async fn dissolve(&self, requester: &UserId) -> Result<UnlinkOutcome, TandemError> {
        let outcome = self.identity.unlink_partner(requester).await?;
        info!(
            user_id = %outcome.user,
            former_partner = %outcome.former_partner,
            "partnership dissolved"
        );

        self.recompute(&[&outcome.user, &outcome.former_partner]).await;
        self.announce_unlinked(&outcome.user, &outcome.former_partner)
            .await;
        if outcome.partner_cleared {
            self.announce_unlinked(&outcome.former_partner, &outcome.user)
                .await;
        }
        Ok(outcome)
    }

    /// The requester's current partner, read fresh from the store.
    pub async fn status(&self, user: &UserId) -> Result<Option<UserSummary>, TandemError> {
        let me = self
            .identity
            .get_user(user)
            .await?
            .ok_or_else(|| TandemError::UserNotFound(user.to_string()))?;
        let Some(partner_id) = me.partner_id else {
            return Ok(None);
        };
        Ok(self
            .identity
            .get_user(&partner_id)
            .await?
            .map(|partner| UserSummary::from(&partner)))
    }

    /// Deactivate an account: dissolve its partnership, refresh the former
    /// partner's connections, and close the user's own connections.
    pub async fn deactivate(&self, user: &UserId) -> Result<Option<UserId>, TandemError> {
        let former_partner = self.identity.deactivate_user(user).await?;
        info!(user_id = %user, "account deactivated");

        match &former_partner {
            Some(partner) => {
                self.recompute(&[user, partner]).await;
                self.announce_unlinked(partner, user).await;
            }
            None => self.recompute(&[user]).await,
        }
        self.registry
            .disconnect_user(user, disconnect_reasons::INACTIVE_USER);
        Ok(former_partner)
    }

    async fn recompute(&self, users: &[&UserId]) {
        for user in users {
            if let Err(e) = self.registry.recompute_membership(user).await {
                warn!(user_id = %user, error = %e, "membership recompute failed");
            }
        }
    }

    fn announce_linked(&self, to: &UserSummary, partner: &UserSummary) {
        let payload = json!({ "partner": partner });
        self.announce(
            &to.id,
            &partner.id,
            EventName::PARTNER_LINKED,
            payload,
            &partner.display_name,
        );
    }

    async fn announce_unlinked(&self, to: &UserId, former_partner: &UserId) {
        let actor_name = match self.identity.get_user(former_partner).await {
            Ok(Some(user)) => user.display_name,
            _ => String::new(),
        };
        let payload = json!({ "former_partner": former_partner });
        self.announce(
            to,
            former_partner,
            EventName::PARTNER_UNLINKED,
            payload,
            &actor_name,
        );
    }

    fn announce(
        &self,
        to: &UserId,
        actor: &UserId,
        name: &str,
        payload: serde_json::Value,
        actor_name: &str,
    ) {
        let Ok(name) = EventName::parse(name) else {
            return;
        };
        let event = DomainEvent::new(actor.clone(), name, payload);
        self.router
            .notify_user(to, ServerFrame::event(&event, actor_name));
    }
}
