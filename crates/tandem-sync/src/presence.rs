// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence and typing signals.
//!
//! Fire-and-forget UI hints routed exactly like domain events (partner only).
//! Never queued, never retried.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tandem_core::{ConnectionId, EventName, UserId};
use tracing::{debug, warn};

use crate::frame::{PresenceStatus, TypingState};
use crate::router::{Delivery, EmitOptions, EventRouter};

/// Emits presence and typing hints on behalf of connections.
pub struct PresenceSignals {
    router: Arc<EventRouter>,
}

impl PresenceSignals {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self { router }
    }

    /// A connection for `user` went live. Only the first one announces
    /// `online`.
    pub async fn connected(&self, user: &UserId, first_for_user: bool) -> Delivery {
        if !first_for_user {
            return Delivery::default();
        }
        self.status(user, None, PresenceStatus::Online).await
    }

    /// A connection for `user` went away. Only the last one announces
    /// `offline`.
    pub async fn disconnected(&self, user: &UserId, last_for_user: bool) -> Delivery {
        if !last_for_user {
            return Delivery::default();
        }
        self.status(user, None, PresenceStatus::Offline).await
    }

    /// Relay a presence status to the partner.
    pub async fn status(
        &self,
        user: &UserId,
        from: Option<&ConnectionId>,
        status: PresenceStatus,
    ) -> Delivery {
        let payload = json!({
            "status": status,
            "user": user,
            "timestamp": Utc::now(),
        });
        debug!(user_id = %user, %status, "presence update");
        self.signal(user, EventName::PRESENCE_UPDATE, payload, from).await
    }

    /// Relay a typing indicator to the partner.
    pub async fn typing(
        &self,
        user: &UserId,
        from: Option<&ConnectionId>,
        state: TypingState,
    ) -> Delivery {
        let payload = json!({ "user": user });
        self.signal(user, state.event_name(), payload, from).await
    }

    async fn signal(
        &self,
        user: &UserId,
        name: &str,
        payload: serde_json::Value,
        from: Option<&ConnectionId>,
    ) -> Delivery {
        let name = match EventName::parse(name) {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "invalid signal name");
                return Delivery::default();
            }
        };
        let options = EmitOptions {
            exclude_connection: from.cloned(),
            self_notify: false,
        };
        self.router.emit(user, name, payload, options).await
    }
}
