// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Note and folder services.
//!
//! Services own the workflows: they order blob writes against metadata
//! commits, run the folder invariants, and report to the audit sink. All
//! storage calls are synchronous; async callers go through
//! `tokio::task::spawn_blocking`.

pub mod documents;
pub mod folders;

pub use documents::DocumentService;
pub use folders::FolderService;
