// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event fan-out: deliver an origin user's events to their partner's
//! live connections.
//!
//! Delivery is best-effort and at-most-once. Each connection gets a
//! non-blocking `try_send`; a full buffer or a closed connection is logged
//! and skipped, and nothing is ever surfaced to the emitting caller. Emits
//! from one origin are serialized so they reach each connection in call
//! order.

use std::sync::Arc;

use serde_json::Value;
use tandem_core::{ConnectionId, DomainEvent, EventName, GroupId, IdentityStore, TandemError, UserId};
use tracing::{debug, warn};

use crate::frame::ServerFrame;
use crate::locks::KeyedLocks;
use crate::registry::{ConnectionRegistry, SendOutcome};

/// Caller-chosen delivery options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Never deliver to this handle (usually the author's own socket).
    pub exclude_connection: Option<ConnectionId>,
    /// Also deliver to the origin user's other devices.
    pub self_notify: bool,
}

impl EmitOptions {
    pub fn excluding(handle: ConnectionId) -> Self {
        Self {
            exclude_connection: Some(handle),
            self_notify: false,
        }
    }
}

/// Per-emit delivery report. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

impl Delivery {
    fn record(&mut self, outcome: SendOutcome, handle: &ConnectionId, event: &str) {
        match outcome {
            SendOutcome::Delivered => self.delivered += 1,
            SendOutcome::Full => {
                warn!(connection_id = %handle, event, "send buffer full, event dropped");
                self.dropped += 1;
            }
            SendOutcome::Closed | SendOutcome::Unknown => {
                debug!(connection_id = %handle, event, "connection gone, event dropped");
                self.dropped += 1;
            }
        }
    }
}

/// Routes domain and signal events to partner groups.
pub struct EventRouter {
    identity: Arc<dyn IdentityStore>,
    registry: Arc<ConnectionRegistry>,
    origin_locks: KeyedLocks<UserId>,
}

impl EventRouter {
    pub fn new(identity: Arc<dyn IdentityStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            identity,
            registry,
            origin_locks: KeyedLocks::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The emit contract for domain emitters: validate the name, then fan
    /// out. Only an invalid event name is reported as an error.
    pub async fn notify_partner(
        &self,
        origin: &UserId,
        event_name: &str,
        payload: Value,
    ) -> Result<Delivery, TandemError> {
        let name = EventName::parse(event_name)?;
        Ok(self.emit(origin, name, payload, EmitOptions::default()).await)
    }

    /// Deliver an event from `origin` to the partner group `user:<partner>`.
    ///
    /// Without a partner this is a silent no-op. By default only the
    /// partner's own connections receive it; with `self_notify` every member
    /// of the group does, including the origin's other devices.
    pub async fn emit(
        &self,
        origin: &UserId,
        name: EventName,
        payload: Value,
        options: EmitOptions,
    ) -> Delivery {
        let order = self.origin_locks.lock(origin).await;
        let delivery = self.fan_out(origin, name, payload, &options).await;
        drop(order);
        self.origin_locks.release(origin);
        delivery
    }

    async fn fan_out(
        &self,
        origin: &UserId,
        name: EventName,
        payload: Value,
        options: &EmitOptions,
    ) -> Delivery {
        let user = match self.identity.get_user(origin).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(user_id = %origin, event = %name, "emit from unknown user ignored");
                return Delivery::default();
            }
            Err(e) => {
                warn!(user_id = %origin, event = %name, error = %e, "partner lookup failed, event dropped");
                return Delivery::default();
            }
        };
        let Some(partner) = user.partner_id.clone() else {
            debug!(user_id = %origin, event = %name, "no partner, nothing to notify");
            return Delivery::default();
        };

        let event = DomainEvent::new(origin.clone(), name, payload);
        let frame = ServerFrame::event(&event, &user.display_name);
        let mut delivery = Delivery::default();

        for handle in self.registry.connections_in_group(&GroupId::for_user(&partner)) {
            if options.exclude_connection.as_ref() == Some(&handle) {
                continue;
            }
            if !options.self_notify && self.registry.owner_of(&handle).as_ref() != Some(&partner) {
                continue;
            }
            let outcome = self.registry.try_send(&handle, frame.clone());
            delivery.record(outcome, &handle, event.name.as_str());
        }

        debug!(
            user_id = %origin,
            partner_id = %partner,
            event = %event.name,
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "event fanned out"
        );
        delivery
    }

    /// Deliver a frame to every live connection of `user` (their own devices).
    pub fn notify_user(&self, user: &UserId, frame: ServerFrame) -> Delivery {
        let name = frame
            .event_name()
            .map(|n| n.as_str().to_string())
            .unwrap_or_default();
        let mut delivery = Delivery::default();
        for handle in self.registry.connections_of_user(user) {
            let outcome = self.registry.try_send(&handle, frame.clone());
            delivery.record(outcome, &handle, &name);
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluding_sets_handle_only() {
        let options = EmitOptions::excluding(ConnectionId::from("c1"));
        assert_eq!(options.exclude_connection, Some(ConnectionId::from("c1")));
        assert!(!options.self_notify);
    }

    #[test]
    fn delivery_counts_outcomes() {
        let handle = ConnectionId::from("c");
        let mut delivery = Delivery::default();
        delivery.record(SendOutcome::Delivered, &handle, "task:created");
        delivery.record(SendOutcome::Full, &handle, "task:created");
        delivery.record(SendOutcome::Closed, &handle, "task:created");
        assert_eq!(
            delivery,
            Delivery {
                delivered: 1,
                dropped: 2
            }
        );
    }
}
