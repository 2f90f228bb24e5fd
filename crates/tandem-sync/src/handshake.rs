// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection-auth handshake state machine.
//!
//! ```text
//! Connecting --begin--> Authenticating --authenticate(ok)--> Authenticated
//!      |                     |                                   |
//!      +------------------ reject / timeout / close -------------+--> Disconnected
//! ```
//!
//! Every rejection carries an [`AuthRejection`] that the transport must send
//! to the client before closing.

use std::fmt;

use tandem_core::{AuthRejection, IdentityStore, TandemError, TokenLookup, User};
use tracing::{debug, info};

/// Lifecycle states of a real-time connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Authenticated,
    Disconnected,
}

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Header,
    Query,
    Frame,
}

/// A bearer credential presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub source: CredentialSource,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[redacted]")
            .field("source", &self.source)
            .finish()
    }
}

impl Credential {
    pub fn new(token: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            token: token.into(),
            source,
        }
    }
}

/// Pick the connection-time credential: an `Authorization: Bearer` header
/// wins over a `token` query parameter. Blank values count as absent.
pub fn connection_credential(
    authorization: Option<&str>,
    query_token: Option<&str>,
) -> Option<Credential> {
    let bearer = authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(Credential::new(token, CredentialSource::Header));
    }
    query_token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| Credential::new(token, CredentialSource::Query))
}

/// The authenticated identity behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub user: User,
    pub token_id: String,
}

/// Drives one connection through the handshake.
#[derive(Debug)]
pub struct Handshake {
    state: ConnectionState,
    session: Option<AuthenticatedSession>,
    rejection: Option<AuthRejection>,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            session: None,
            rejection: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&AuthenticatedSession> {
        self.session.as_ref()
    }

    /// Why the connection was refused, if it was.
    pub fn rejection(&self) -> Option<AuthRejection> {
        self.rejection
    }

    /// `Connecting -> Authenticating`.
    pub fn begin(&mut self) -> Result<(), TandemError> {
        self.transition(ConnectionState::Connecting, ConnectionState::Authenticating)
    }

    /// Validate a credential. `Authenticating -> Authenticated` on success,
    /// `Authenticating -> Disconnected` with a rejection otherwise.
    ///
    /// Store failures also disconnect, and are returned as-is rather than as
    /// a rejection.
    pub async fn authenticate(
        &mut self,
        identity: &dyn IdentityStore,
        credential: Option<&Credential>,
    ) -> Result<&AuthenticatedSession, TandemError> {
        self.expect(ConnectionState::Authenticating, ConnectionState::Authenticated)?;

        let Some(credential) = credential else {
            return Err(self.reject(AuthRejection::NoToken));
        };
        let lookup = match identity.resolve_token(&credential.token).await {
            Ok(lookup) => lookup,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        match lookup {
            TokenLookup::Valid { user, token_id } => {
                info!(user_id = %user.id, source = ?credential.source, "connection authenticated");
                self.state = ConnectionState::Authenticated;
                Ok(self.session.insert(AuthenticatedSession { user, token_id }))
            }
            TokenLookup::Inactive(user) => {
                debug!(user_id = %user.id, "credential belongs to an inactive account");
                Err(self.reject(AuthRejection::InactiveUser))
            }
            TokenLookup::Expired | TokenLookup::Revoked | TokenLookup::Unknown => {
                debug!(?lookup, "credential rejected");
                Err(self.reject(AuthRejection::InvalidToken))
            }
        }
    }

    /// No credential arrived in time: `Authenticating -> Disconnected`.
    pub fn time_out(&mut self) -> Result<AuthRejection, TandemError> {
        self.expect(ConnectionState::Authenticating, ConnectionState::Disconnected)?;
        self.reject(AuthRejection::NoToken);
        Ok(AuthRejection::NoToken)
    }

    /// Transport closed, logout, or deactivation. Legal from any live state.
    pub fn disconnect(&mut self) -> Result<(), TandemError> {
        if self.state == ConnectionState::Disconnected {
            return Err(illegal(self.state, ConnectionState::Disconnected));
        }
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    fn reject(&mut self, reason: AuthRejection) -> TandemError {
        self.state = ConnectionState::Disconnected;
        self.rejection = Some(reason);
        TandemError::AuthRejected(reason)
    }

    fn expect(&self, from: ConnectionState, to: ConnectionState) -> Result<(), TandemError> {
        if self.state == from {
            Ok(())
        } else {
            Err(illegal(self.state, to))
        }
    }

    fn transition(&mut self, from: ConnectionState, to: ConnectionState) -> Result<(), TandemError> {
        self.expect(from, to)?;
        self.state = to;
        Ok(())
    }
}

fn illegal(from: ConnectionState, to: ConnectionState) -> TandemError {
    TandemError::IllegalTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}
