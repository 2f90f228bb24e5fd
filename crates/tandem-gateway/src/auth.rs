// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer token middleware for the REST API.
//!
//! Resolves `Authorization: Bearer <token>` against the identity store and
//! attaches an [`AuthenticatedUser`] to the request. Anything other than a
//! live token for an active account is rejected.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tandem_core::{TokenLookup, User};

use crate::error::ApiError;
use crate::server::GatewayState;

/// The caller behind an authenticated request.
#[derive(Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// The presented bearer token, needed to revoke it on logout.
    pub token: String,
    pub token_id: String,
}

impl std::fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("user", &self.user.id)
            .field("token", &"[redacted]")
            .field("token_id", &self.token_id)
            .finish()
    }
}

/// Middleware that validates the bearer token on every API route.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(header) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return Err(ApiError::unauthorized("missing bearer token"));
    };
    let token = header.token().to_string();

    match state.hub.identity.resolve_token(&token).await? {
        TokenLookup::Valid { user, token_id } => {
            request.extensions_mut().insert(AuthenticatedUser {
                user,
                token,
                token_id,
            });
            Ok(next.run(request).await)
        }
        TokenLookup::Inactive(user) => {
            tracing::debug!(user_id = %user.id, "request from inactive account");
            Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "inactive_user",
                "this account is not active",
            ))
        }
        TokenLookup::Expired | TokenLookup::Revoked | TokenLookup::Unknown => {
            Err(ApiError::unauthorized("invalid or expired token"))
        }
    }
}
