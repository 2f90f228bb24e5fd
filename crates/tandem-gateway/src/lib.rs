// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and WebSocket transport for Tandem.
//!
//! REST endpoints cover accounts, pairing and the `notify` emit contract;
//! `/ws` carries the real-time channel. All sync semantics live in
//! `tandem-sync`; this crate only moves frames.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthenticatedUser;
pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, bind, build_router, serve, start_server};
