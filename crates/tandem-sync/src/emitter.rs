// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain emitters: one per business feature, called after a write commits.

use std::sync::Arc;

use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tandem_core::{EventName, TandemError, UserId};
use tracing::warn;

use crate::router::{Delivery, EmitOptions, EventRouter};

/// Business features whose mutations are mirrored to the partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Task,
    Note,
    Checkin,
    Finance,
    Schedule,
    BucketList,
}

/// Standard mutation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Domain {
    pub fn event(self, action: Action) -> Result<EventName, TandemError> {
        EventName::from_parts(self.as_ref(), action.as_ref())
    }
}

/// Emits `<domain>:<action>` events for one feature.
#[derive(Clone)]
pub struct DomainEmitter {
    domain: Domain,
    router: Arc<EventRouter>,
}

impl DomainEmitter {
    pub fn new(domain: Domain, router: Arc<EventRouter>) -> Self {
        Self { domain, router }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub async fn created(&self, origin: &UserId, payload: Value) -> Delivery {
        self.emit(origin, Action::Created, payload, EmitOptions::default())
            .await
    }

    pub async fn updated(&self, origin: &UserId, payload: Value) -> Delivery {
        self.emit(origin, Action::Updated, payload, EmitOptions::default())
            .await
    }

    pub async fn deleted(&self, origin: &UserId, payload: Value) -> Delivery {
        self.emit(origin, Action::Deleted, payload, EmitOptions::default())
            .await
    }

    pub async fn emit(
        &self,
        origin: &UserId,
        action: Action,
        payload: Value,
        options: EmitOptions,
    ) -> Delivery {
        match self.domain.event(action) {
            Ok(name) => self.router.emit(origin, name, payload, options).await,
            Err(e) => {
                warn!(error = %e, "invalid domain event name");
                Delivery::default()
            }
        }
    }

    /// Emit a domain-specific action outside the standard three, e.g.
    /// `task:completed`.
    pub async fn emit_custom(
        &self,
        origin: &UserId,
        action: &str,
        payload: Value,
        options: EmitOptions,
    ) -> Result<Delivery, TandemError> {
        let name = EventName::from_parts(self.domain.as_ref(), action)?;
        Ok(self.router.emit(origin, name, payload, options).await)
    }
}
