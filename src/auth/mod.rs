// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Owner identity for the notes API.
//!
//! ## Auth Flow
//!
//! 1. An upstream gateway authenticates the user (session, JWT, mTLS)
//! 2. The gateway forwards the request with the verified user id in the
//!    owner header (`x-owner-id` unless `OWNER_HEADER` says otherwise)
//! 3. This server trusts that header completely and scopes every query by it
//!
//! ## Security
//!
//! - All non-health endpoints require the owner header
//! - The header must be stripped from client traffic by the gateway; this
//!   server cannot tell a forged header from a real one

pub mod error;
pub mod extractor;

pub use error::AuthError;
pub use extractor::Owner;
