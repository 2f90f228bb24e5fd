// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport for real-time sync.
//!
//! The credential comes from the `Authorization` header, a `?token=` query
//! parameter, or, failing both, a first `{"type":"auth"}` frame sent within
//! the auth timeout. A rejected connection gets an `auth_error` frame and
//! is closed. An accepted one gets `auth_ok`, is registered, and then runs
//! two halves until either ends:
//! 1. Writer task: drains the registry channel into the socket and pings
//! 2. Reader loop: handles typing, presence and ping frames from the client

use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::{HeaderMap, header::AUTHORIZATION},
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tandem_core::{AuthRejection, ConnectionId, TandemError, UserId, UserSummary};
use tandem_sync::{
    AuthenticatedSession, ClientFrame, Credential, CredentialSource, FrameReceiver, Handshake,
    ServerFrame, connection_credential, disconnect_reasons,
};

use crate::server::GatewayState;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Response {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let credential = connection_credential(authorization, params.token.as_deref());
    ws.on_upgrade(move |socket| handle_socket(socket, state, credential))
}

enum FirstFrame {
    Credential(Credential),
    /// Something other than a usable auth frame arrived.
    Missing,
    TimedOut,
    Closed,
}

async fn read_auth_frame(receiver: &mut WsStream, timeout: Duration) -> FirstFrame {
    let wait = async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    return match serde_json::from_str::<ClientFrame>(text.as_str()) {
                        Ok(ClientFrame::Auth { token }) if !token.trim().is_empty() => {
                            FirstFrame::Credential(Credential::new(
                                token.trim(),
                                CredentialSource::Frame,
                            ))
                        }
                        _ => FirstFrame::Missing,
                    };
                }
                Message::Close(_) => return FirstFrame::Closed,
                _ => {}
            }
        }
        FirstFrame::Closed
    };
    tokio::time::timeout(timeout, wait)
        .await
        .unwrap_or(FirstFrame::TimedOut)
}

async fn send_frame(sender: &mut WsSink, frame: &ServerFrame) -> bool {
    let json = match frame.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode frame");
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

async fn close(sender: &mut WsSink, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_string().into(),
    };
    let _ = sender.send(Message::Close(Some(frame))).await;
}

/// Send a final frame and close.
async fn refuse(sender: &mut WsSink, frame: ServerFrame, reason: &str) {
    send_frame(sender, &frame).await;
    close(sender, close_code::POLICY, reason).await;
}

/// Run the handshake to completion. `None` means the socket has already
/// been refused or closed.
async fn authenticate(
    state: &GatewayState,
    handshake: &mut Handshake,
    credential: Option<Credential>,
    sender: &mut WsSink,
    receiver: &mut WsStream,
) -> Option<(AuthenticatedSession, Credential)> {
    let credential = match credential {
        Some(credential) => Some(credential),
        None => match read_auth_frame(receiver, state.realtime.auth_timeout()).await {
            FirstFrame::Credential(credential) => Some(credential),
            FirstFrame::Missing => None,
            FirstFrame::TimedOut => {
                if let Ok(reason) = handshake.time_out() {
                    tracing::debug!("handshake timed out");
                    refuse(sender, ServerFrame::AuthError { reason }, reason.reason()).await;
                }
                return None;
            }
            FirstFrame::Closed => {
                let _ = handshake.disconnect();
                return None;
            }
        },
    };

    let result = handshake
        .authenticate(state.hub.identity.as_ref(), credential.as_ref())
        .await
        .cloned();
    match result {
        Ok(session) => credential.map(|credential| (session, credential)),
        Err(TandemError::AuthRejected(reason)) => {
            refuse(sender, ServerFrame::AuthError { reason }, reason.reason()).await;
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "handshake failed");
            refuse(
                sender,
                ServerFrame::disconnect(disconnect_reasons::INTERNAL_ERROR),
                disconnect_reasons::INTERNAL_ERROR,
            )
            .await;
            None
        }
    }
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: GatewayState, credential: Option<Credential>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut handshake = Handshake::new();
    if handshake.begin().is_err() {
        return;
    }

    let Some((session, credential)) = authenticate(
        &state,
        &mut handshake,
        credential,
        &mut ws_sender,
        &mut ws_receiver,
    )
    .await
    else {
        return;
    };
    let user = session.user.id.clone();
    let connection_id = ConnectionId::generate();

    let registration = match state
        .hub
        .registry
        .register_session(
            &user,
            connection_id.clone(),
            &credential.token,
            &session.token_id,
        )
        .await
    {
        Ok(registration) => registration,
        Err(e) => {
            let reason = match &e {
                TandemError::TooManyConnections { .. } => {
                    disconnect_reasons::TOO_MANY_CONNECTIONS
                }
                TandemError::AuthRejected(AuthRejection::InactiveUser) => {
                    disconnect_reasons::INACTIVE_USER
                }
                TandemError::AuthRejected(_) => disconnect_reasons::LOGOUT,
                _ => {
                    tracing::error!(user_id = %user, error = %e, "registration failed");
                    disconnect_reasons::INTERNAL_ERROR
                }
            };
            let _ = handshake.disconnect();
            refuse(&mut ws_sender, ServerFrame::disconnect(reason), reason).await;
            return;
        }
    };

    let welcome = ServerFrame::AuthOk {
        connection_id: connection_id.clone(),
        user: UserSummary::from(&session.user),
    };
    if !send_frame(&mut ws_sender, &welcome).await {
        let _ = handshake.disconnect();
        state.hub.registry.unregister(&connection_id).await;
        return;
    }
    state
        .hub
        .presence
        .connected(&user, registration.first_for_user)
        .await;

    let mut writer = tokio::spawn(write_loop(
        ws_sender,
        registration.receiver,
        state.realtime.ping_interval(),
    ));
    tokio::select! {
        _ = read_loop(&state, &connection_id, &user, &mut ws_receiver) => {}
        _ = &mut writer => {}
    }
    writer.abort();

    let _ = handshake.disconnect();
    if let Some(gone) = state.hub.registry.unregister(&connection_id).await {
        state
            .hub
            .presence
            .disconnected(&gone.user, gone.last_for_user)
            .await;
    }
}

/// Forward routed frames to the socket. Ends when the registry drops the
/// channel, after a `disconnect` frame, or when the socket fails.
async fn write_loop(mut sender: WsSink, mut frames: FrameReceiver, ping_every: Duration) {
    let period = ping_every.max(Duration::from_millis(100));
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if !send_frame(&mut sender, &frame).await {
                        break;
                    }
                    if let ServerFrame::Disconnect { reason } = &frame {
                        close(&mut sender, close_code::NORMAL, reason).await;
                        break;
                    }
                }
                None => {
                    close(&mut sender, close_code::NORMAL, "").await;
                    break;
                }
            },
            _ = ping.tick() => {
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Read client frames until the client closes.
async fn read_loop(
    state: &GatewayState,
    connection_id: &ConnectionId,
    user: &UserId,
    receiver: &mut WsStream,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let frame: ClientFrame = match serde_json::from_str(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(connection_id = %connection_id, "invalid WebSocket frame: {e}");
                        continue;
                    }
                };
                match frame {
                    ClientFrame::Typing { state: typing } => {
                        state
                            .hub
                            .presence
                            .typing(user, Some(connection_id), typing)
                            .await;
                    }
                    ClientFrame::Presence { status } => {
                        state
                            .hub
                            .presence
                            .status(user, Some(connection_id), status)
                            .await;
                    }
                    ClientFrame::Ping => {
                        state.hub.registry.try_send(connection_id, ServerFrame::Pong);
                    }
                    ClientFrame::Auth { .. } => {
                        tracing::debug!(connection_id = %connection_id, "auth frame after handshake ignored");
                    }
                }
            }
            Message::Close(_) => break,
            _ => {} // Binary and pong frames are ignored.
        }
    }
}
