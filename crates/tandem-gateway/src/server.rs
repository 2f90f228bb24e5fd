// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tandem_config::TandemConfig;
use tandem_config::model::{AuthConfig, RealtimeConfig, ServerConfig};
use tandem_core::{AccountStore, TandemError};
use tandem_sync::{SyncHub, disconnect_reasons};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Registry, router, pairing and presence.
    pub hub: SyncHub,
    /// Account and token management.
    pub accounts: Arc<dyn AccountStore>,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(hub: SyncHub, accounts: Arc<dyn AccountStore>, config: &TandemConfig) -> Self {
        Self {
            hub,
            accounts,
            auth: config.auth.clone(),
            realtime: config.realtime.clone(),
            start_time: Instant::now(),
        }
    }
}

/// Build the full route tree:
/// - GET /health, POST /v1/auth/register, POST /v1/auth/login (public)
/// - everything else under /v1 (bearer auth)
/// - GET /ws (auth during the handshake, not via middleware)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/v1/auth/register", post(handlers::register))
        .route("/v1/auth/login", post(handlers::login))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/auth/logout", post(handlers::logout))
        .route("/v1/partner", get(handlers::get_partner))
        .route("/v1/partner/connect", post(handlers::connect_partner))
        .route("/v1/partner/disconnect", post(handlers::disconnect_partner))
        .route("/v1/account/deactivate", post(handlers::deactivate_account))
        .route("/v1/notify", post(handlers::notify))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the configured host:port.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, TandemError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| TandemError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serve until `shutdown` is cancelled. On shutdown every live connection
/// is told `server_shutdown` so WebSocket tasks wind down.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), TandemError> {
    let registry = Arc::clone(&state.hub.registry);
    let app = build_router(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("gateway listening on {addr}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            let closed = registry.disconnect_all(disconnect_reasons::SERVER_SHUTDOWN);
            tracing::info!(connections = closed, "gateway shutting down");
        })
        .await
        .map_err(|e| TandemError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Bind and serve.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), TandemError> {
    let listener = bind(config).await?;
    serve(listener, state, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_test_utils::TestHarness;

    #[tokio::test]
    async fn gateway_state_is_clone() {
        let harness = TestHarness::new().await.unwrap();
        let state = GatewayState::new(
            harness.hub.clone(),
            harness.accounts.clone(),
            &TandemConfig::default(),
        );
        let cloned = state.clone();
        assert_eq!(cloned.realtime.send_buffer, state.realtime.send_buffer);
    }

    #[tokio::test]
    async fn bind_reports_bad_address() {
        let config = ServerConfig {
            host: "256.0.0.1".to_string(),
            port: 0,
            log_level: "info".to_string(),
        };
        let err = bind(&config).await.unwrap_err();
        assert!(matches!(err, TandemError::Channel { .. }));
    }
}
