// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames exchanged over a real-time connection.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "auth", "token": "..."}
//! {"type": "typing", "state": "start"}
//! {"type": "presence", "status": "away"}
//! {"type": "ping"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "auth_ok", "connection_id": "...", "user": {"id": "...", "display_name": "..."}}
//! {"type": "auth_error", "reason": "invalid_token"}
//! {"type": "event", "event": "task:created", "data": {}, "actor_id": "...", "actor_name": "...", "timestamp": "..."}
//! {"type": "pong"}
//! {"type": "disconnect", "reason": "logout"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::{AuthRejection, ConnectionId, DomainEvent, EventName, UserId, UserSummary};

/// Typing indicator state sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingState {
    Start,
    Stop,
}

impl TypingState {
    pub fn event_name(self) -> &'static str {
        match self {
            TypingState::Start => EventName::TYPING_START,
            TypingState::Stop => EventName::TYPING_STOP,
        }
    }
}

/// Presence status relayed to the partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// In-band credential, accepted only while authenticating.
    Auth { token: String },
    Typing { state: TypingState },
    Presence { status: PresenceStatus },
    Ping,
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    AuthOk {
        connection_id: ConnectionId,
        user: UserSummary,
    },
    AuthError {
        reason: AuthRejection,
    },
    Event {
        event: EventName,
        data: serde_json::Value,
        actor_id: UserId,
        actor_name: String,
        timestamp: DateTime<Utc>,
    },
    Pong,
    Disconnect {
        reason: String,
    },
}

impl ServerFrame {
    /// Event frame for `event` with actor metadata injected.
    pub fn event(event: &DomainEvent, actor_name: &str) -> Self {
        ServerFrame::Event {
            event: event.name.clone(),
            data: event.payload.clone(),
            actor_id: event.origin.clone(),
            actor_name: actor_name.to_string(),
            timestamp: event.timestamp,
        }
    }

    pub fn disconnect(reason: impl Into<String>) -> Self {
        ServerFrame::Disconnect {
            reason: reason.into(),
        }
    }

    /// The event name, if this is an event frame.
    pub fn event_name(&self) -> Option<&EventName> {
        match self {
            ServerFrame::Event { event, .. } => Some(event),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Reasons carried by `disconnect` frames.
pub mod disconnect_reasons {
    pub const LOGOUT: &str = "logout";
    pub const INACTIVE_USER: &str = "inactive_user";
    pub const SERVER_SHUTDOWN: &str = "server_shutdown";
    pub const TOO_MANY_CONNECTIONS: &str = "too_many_connections";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
