// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed, owner-scoped access to the metadata
//! database.

pub mod documents;
pub mod folders;

pub use documents::DocumentRepository;
pub use folders::FolderRepository;
