// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partner pairing and real-time fan-out for Tandem.
//!
//! Transport-independent: the gateway feeds authenticated connections in
//! and drains each connection's [`FrameReceiver`](registry::FrameReceiver).
//!
//! - [`ConnectionRegistry`] tracks live connections and their groups.
//! - [`EventRouter`] delivers an origin's events to its partner's group.
//! - [`PairingService`] links and dissolves partnerships, then recomputes
//!   membership for both sides.
//! - [`Handshake`] is the connection-auth state machine.
//! - [`PresenceSignals`] relays online/offline and typing hints.

pub mod emitter;
pub mod frame;
pub mod handshake;
pub mod hub;
mod locks;
pub mod pairing;
pub mod presence;
pub mod registry;
pub mod router;

pub use emitter::{Action, Domain, DomainEmitter};
pub use frame::{ClientFrame, PresenceStatus, ServerFrame, TypingState, disconnect_reasons};
pub use handshake::{
    AuthenticatedSession, ConnectionState, Credential, CredentialSource, Handshake,
    connection_credential,
};
pub use hub::SyncHub;
pub use pairing::PairingService;
pub use presence::PresenceSignals;
pub use registry::{
    Connection, ConnectionRegistry, FrameReceiver, Registration, RegistryLimits, SendOutcome,
    Unregistration,
};
pub use router::{Delivery, EmitOptions, EventRouter};
