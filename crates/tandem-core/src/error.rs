// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tandem partner-sync subsystem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The primary error type used across the identity store, pairing service,
/// and gateway.
#[derive(Debug, Error)]
pub enum TandemError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A pairing operation was refused. Surfaced synchronously to the caller.
    #[error(transparent)]
    Pairing(#[from] PairingError),

    /// A real-time credential was rejected during the connection handshake.
    #[error("authentication rejected: {0}")]
    AuthRejected(#[from] AuthRejection),

    /// The user already holds the configured maximum of live connections.
    #[error("user {user} already has {limit} live connections")]
    TooManyConnections { user: String, limit: usize },

    /// A connection lifecycle transition that the state machine forbids.
    #[error("illegal connection transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// Login credentials did not match an active account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("an account for `{0}` already exists")]
    UserExists(String),

    /// The referenced account does not exist.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Event names must follow `<domain>:<action>`.
    #[error("invalid event name `{0}`: expected `<domain>:<action>`")]
    InvalidEventName(String),

    /// Transport errors (bind failure, socket closed).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TandemError {
    /// Wrap any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TandemError::Storage {
            source: Box::new(err),
        }
    }
}

/// Typed refusals from the pairing service.
///
/// None of these are retried; each one is shown to the requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    /// The target resolves to the requester.
    #[error("you cannot pair with yourself")]
    SelfPairing,

    /// Either the requester or the target already has a partner.
    #[error("one of these accounts already has a partner")]
    AlreadyPaired,

    /// The target identifier does not resolve to an active account.
    #[error("no active account matches `{0}`")]
    NotFound(String),

    /// Dissolve was requested by a user without a partner.
    #[error("you do not currently have a partner")]
    NoPartner,

    /// The requesting account is deactivated.
    #[error("this account is not active")]
    Inactive,
}

impl PairingError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PairingError::SelfPairing => "self_pairing",
            PairingError::AlreadyPaired => "already_paired",
            PairingError::NotFound(_) => "not_found",
            PairingError::NoPartner => "no_partner",
            PairingError::Inactive => "inactive_user",
        }
    }
}

/// Reason a real-time connection was refused during authentication.
///
/// Sent to the client as an explicit `auth_error` frame before the
/// transport closes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthRejection {
    /// No credential was presented before the auth timeout.
    #[error("no_token")]
    NoToken,
    /// The credential is unknown, expired, or revoked.
    #[error("invalid_token")]
    InvalidToken,
    /// The credential belongs to a deactivated account.
    #[error("inactive_user")]
    InactiveUser,
}

impl AuthRejection {
    /// Wire-level reason string.
    pub fn reason(&self) -> &'static str {
        (*self).into()
    }
}
