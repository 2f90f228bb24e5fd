// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for accounts, pairing, and the emit endpoint.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_core::{ConnectionId, EventName, TandemError, User, UserId, UserSummary};
use tandem_sync::{EmitOptions, disconnect_reasons};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::server::GatewayState;

/// Request body for POST /v1/auth/register.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: SecretString,
}

/// Request body for POST /v1/auth/login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

/// An account as returned to its owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountView {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub partner_id: Option<UserId>,
}

impl From<User> for AccountView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            partner_id: user.partner_id,
        }
    }
}

/// Response body for register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: String,
    pub user: AccountView,
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Live real-time connections.
    pub connections: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartnerResponse {
    pub partner: Option<UserSummary>,
}

/// Request body for POST /v1/partner/connect.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// User id or email of the account to pair with.
    pub target: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkedResponse {
    pub linked: bool,
    pub partner: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnlinkedResponse {
    pub unlinked: bool,
    pub former_partner: UserId,
}

/// Request body for POST /v1/notify.
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    /// The caller's own real-time connection, if the write came from one.
    #[serde(default)]
    pub exclude_connection: Option<ConnectionId>,
    #[serde(default)]
    pub self_notify: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub accepted: bool,
    pub delivered: usize,
    pub dropped: usize,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        connections: state.hub.registry.connection_count(),
    })
}

/// POST /v1/auth/register
pub async fn register(
    State(state): State<GatewayState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    if !state.auth.allow_registration {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "registration_disabled",
            "registration is disabled",
        ));
    }
    let email = body.email.trim();
    if !email.contains('@') {
        return Err(ApiError::bad_request("email must be an address"));
    }
    if body.display_name.trim().is_empty() {
        return Err(ApiError::bad_request("display_name must not be empty"));
    }
    if body.password.expose_secret().is_empty() {
        return Err(ApiError::bad_request("password must not be empty"));
    }

    let user = state
        .accounts
        .create_user(email, &body.display_name, &body.password)
        .await?;
    tracing::info!(user_id = %user.id, "account registered");
    let response = issue(&state, user).await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// POST /v1/auth/login
pub async fn login(
    State(state): State<GatewayState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .accounts
        .verify_password(&body.email, &body.password)
        .await?
        .ok_or(TandemError::InvalidCredentials)?;
    Ok(Json(issue(&state, user).await?))
}

async fn issue(state: &GatewayState, user: User) -> Result<TokenResponse, TandemError> {
    let issued = state
        .accounts
        .issue_token(&user.id, state.auth.token_ttl())
        .await?;
    Ok(TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: AccountView::from(user),
    })
}

/// POST /v1/auth/logout
///
/// Revokes the presented token and closes the connections opened with it.
pub async fn logout(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<StatusCode, ApiError> {
    if let Some(token_id) = state.accounts.revoke_token(&auth.token).await? {
        let closed = state
            .hub
            .registry
            .disconnect_token(&token_id, disconnect_reasons::LOGOUT);
        tracing::info!(user_id = %auth.user.id, connections = closed, "logged out");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/partner
pub async fn get_partner(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<PartnerResponse>, ApiError> {
    let partner = state.hub.pairing.status(&auth.user.id).await?;
    Ok(Json(PartnerResponse { partner }))
}

/// POST /v1/partner/connect
pub async fn connect_partner(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<ConnectRequest>,
) -> Result<Json<LinkedResponse>, ApiError> {
    if body.target.trim().is_empty() {
        return Err(ApiError::bad_request("target must not be empty"));
    }
    let link = state
        .hub
        .pairing
        .propose_or_join(&auth.user.id, &body.target)
        .await?;
    Ok(Json(LinkedResponse {
        linked: true,
        partner: link.partner,
    }))
}

/// POST /v1/partner/disconnect
pub async fn disconnect_partner(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<UnlinkedResponse>, ApiError> {
    let outcome = state.hub.pairing.dissolve(&auth.user.id).await?;
    Ok(Json(UnlinkedResponse {
        unlinked: true,
        former_partner: outcome.former_partner,
    }))
}

/// POST /v1/account/deactivate
pub async fn deactivate_account(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<StatusCode, ApiError> {
    state.hub.pairing.deactivate(&auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/notify
///
/// Called by the CRUD layer after a write commits. Only the event name is
/// validated; delivery is best-effort and never fails the request.
pub async fn notify(
    State(state): State<GatewayState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<NotifyRequest>,
) -> Result<Response, ApiError> {
    let name = EventName::parse(&body.event)?;
    let options = EmitOptions {
        exclude_connection: body.exclude_connection,
        self_notify: body.self_notify,
    };
    let delivery = state
        .hub
        .router
        .emit(&auth.user.id, name, body.payload, options)
        .await;
    Ok((
        StatusCode::ACCEPTED,
        Json(NotifyResponse {
            accepted: true,
            delivered: delivery.delivered,
            dropped: delivery.dropped,
        }),
    )
        .into_response())
}
