// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules over the [`Database`](crate::Database) handle.

pub mod pairing;
pub mod tokens;
pub mod users;
