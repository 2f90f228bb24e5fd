// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP mapping of [`TandemError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tandem_core::{PairingError, TandemError};

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub error: String,
    /// Stable machine-readable kind.
    pub code: String,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }
}

fn pairing_status(err: &PairingError) -> StatusCode {
    match err {
        PairingError::SelfPairing => StatusCode::BAD_REQUEST,
        PairingError::NotFound(_) => StatusCode::NOT_FOUND,
        PairingError::AlreadyPaired | PairingError::NoPartner => StatusCode::CONFLICT,
        PairingError::Inactive => StatusCode::FORBIDDEN,
    }
}

impl From<TandemError> for ApiError {
    fn from(err: TandemError) -> Self {
        match &err {
            TandemError::Pairing(pairing) => {
                Self::new(pairing_status(pairing), pairing.code(), pairing.to_string())
            }
            TandemError::AuthRejected(reason) => {
                Self::new(StatusCode::UNAUTHORIZED, reason.reason(), err.to_string())
            }
            TandemError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
            }
            TandemError::UserExists(_) => {
                Self::new(StatusCode::CONFLICT, "user_exists", err.to_string())
            }
            TandemError::UserNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "user_not_found", err.to_string())
            }
            TandemError::InvalidEventName(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_event_name", err.to_string())
            }
            TandemError::TooManyConnections { .. } => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_connections",
                err.to_string(),
            ),
            TandemError::Storage { .. }
            | TandemError::Config(_)
            | TandemError::Channel { .. }
            | TandemError::IllegalTransition { .. }
            | TandemError::Internal(_) => {
                tracing::error!(error = %err, "request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.to_string(),
            }),
        )
            .into_response()
    }
}
