// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store traits consumed by the sync core and the gateway.
//!
//! The sync core never talks to a database directly; it only sees these
//! traits, which lets it be tested against an in-memory store.

pub mod account;
pub mod identity;

pub use account::AccountStore;
pub use identity::IdentityStore;
