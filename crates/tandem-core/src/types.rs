// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the identity store, the sync core, and the gateway.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TandemError;

/// Unique identifier for a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Generate a fresh random user id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Handle for one live real-time connection (one device or tab).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A logical broadcast target. There is exactly one group per user id,
/// rendered as `user:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    const PREFIX: &'static str = "user:";

    /// The group owned by `user`.
    pub fn for_user(user: &UserId) -> Self {
        Self(format!("{}{}", Self::PREFIX, user.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user record as seen by the pairing subsystem.
///
/// `partner_id` is only ever written by the pairing operations of the
/// identity store, and both sides of a link are written in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub partner_id: Option<UserId>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_paired(&self) -> bool {
        self.partner_id.is_some()
    }
}

/// Public projection of a user, safe to hand to the other partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub display_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

/// A symmetric partnership between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerLink {
    /// The user who initiated the link.
    pub user: UserSummary,
    /// The user that was joined.
    pub partner: UserSummary,
}

/// Result of dissolving a partnership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkOutcome {
    pub user: UserId,
    /// The partner id read inside the dissolving transaction.
    pub former_partner: UserId,
    /// False when the former partner no longer pointed back at the requester,
    /// in which case their record was left untouched.
    pub partner_cleared: bool,
}

/// Outcome of resolving a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    /// Token is live and belongs to an active user.
    Valid { user: User, token_id: String },
    /// Token is live but the account is deactivated.
    Inactive(User),
    Expired,
    Revoked,
    Unknown,
}

/// A freshly issued bearer token. The plaintext is only ever returned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: String,
    pub user_id: UserId,
    pub expires_at: String,
}

/// Event name following the `<domain>:<action>` convention, e.g. `task:created`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventName(String);

impl EventName {
    pub const TYPING_START: &'static str = "typing:start";
    pub const TYPING_STOP: &'static str = "typing:stop";
    pub const PRESENCE_UPDATE: &'static str = "presence:update";
    pub const PARTNER_LINKED: &'static str = "partner:linked";
    pub const PARTNER_UNLINKED: &'static str = "partner:unlinked";

    /// Parse and validate an event name.
    pub fn parse(name: &str) -> Result<Self, TandemError> {
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        };
        match name.split_once(':') {
            Some((domain, action)) if valid_part(domain) && valid_part(action) => {
                Ok(Self(name.to_string()))
            }
            _ => Err(TandemError::InvalidEventName(name.to_string())),
        }
    }

    /// Build from already-validated parts.
    pub fn from_parts(domain: &str, action: &str) -> Result<Self, TandemError> {
        Self::parse(&format!("{domain}:{action}"))
    }

    pub fn domain(&self) -> &str {
        self.0.split_once(':').map(|(d, _)| d).unwrap_or(&self.0)
    }

    pub fn action(&self) -> &str {
        self.0.split_once(':').map(|(_, a)| a).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Presence and typing hints: fire-and-forget, never queued.
    pub fn is_signal(&self) -> bool {
        matches!(self.domain(), "typing" | "presence")
    }
}

impl TryFrom<String> for EventName {
    type Error = TandemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EventName> for String {
    fn from(value: EventName) -> Self {
        value.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable domain event. Transient: never persisted by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub name: EventName,
    pub origin: UserId,
    /// Opaque to the sync core; shape owned by each domain.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(origin: UserId, name: EventName, payload: serde_json::Value) -> Self {
        Self {
            name,
            origin,
            payload,
            timestamp: Utc::now(),
        }
    }
}
