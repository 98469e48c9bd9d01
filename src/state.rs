// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::NoteResult;
use crate::services::{DocumentService, FolderService};
use crate::storage::{AuditRepository, FileStorage, FsBlobStore, NoteDatabase, StoragePaths};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub storage: FileStorage,
    pub documents: DocumentService,
    pub folders: FolderService,
}

impl AppState {
    /// Prepare the data directory, open the database and wire the services.
    pub fn initialize(config: ServerConfig) -> NoteResult<Self> {
        let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
        storage.initialize()?;

        let db = Arc::new(NoteDatabase::open(&storage.paths().database_file())?);
        let blobs = Arc::new(FsBlobStore::new(storage.clone()));
        let audit = Arc::new(AuditRepository::new(storage.clone()));

        let documents =
            DocumentService::new(db.clone(), blobs, audit.clone(), config.max_content_bytes);
        let folders = FolderService::new(db, documents.clone(), audit);

        tracing::info!(data_dir = %config.data_dir.display(), "Storage initialized");

        Ok(Self {
            config: Arc::new(config),
            storage,
            documents,
            folders,
        })
    }
}
