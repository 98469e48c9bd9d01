// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cipher Notes - Zero-Knowledge Encrypted Note Storage
//!
//! Stores client-encrypted notes and the per-user folder tree that
//! organizes them. The server never sees plaintext: it keeps ciphertext in
//! a blob store and key-wrapping material in an embedded database.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Owner identity from the authenticating gateway
//! - `envelope` - Encryption envelope validation and decoding
//! - `services` - Note and folder workflows
//! - `storage` - Blob store, metadata database and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
