// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Tandem.
//!
//! Provides the identifiers, error taxonomy, and store traits shared by the
//! pairing service, the connection registry, and the HTTP/WebSocket gateway.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AuthRejection, PairingError, TandemError};
pub use traits::{AccountStore, IdentityStore};
pub use types::{
    ConnectionId, DomainEvent, EventName, GroupId, IssuedToken, PartnerLink, TokenLookup,
    UnlinkOutcome, User, UserId, UserSummary,
};
