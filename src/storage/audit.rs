// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for note and folder mutations.
//!
//! Services report through the [`AuditSink`] trait after each create,
//! update or delete. Recording is fire-and-forget: a sink failure is logged
//! and never fails the operation that triggered it.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::OwnerId;

use super::{FileStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    // Note events
    NoteCreated,
    NoteContentUpdated,
    NoteMetadataUpdated,
    NoteDeleted,

    // Folder events
    FolderCreated,
    FolderUpdated,
    FolderDeleted,
}

impl AuditEventKind {
    /// Resource type the event refers to.
    pub fn resource_type(self) -> &'static str {
        match self {
            AuditEventKind::NoteCreated
            | AuditEventKind::NoteContentUpdated
            | AuditEventKind::NoteMetadataUpdated
            | AuditEventKind::NoteDeleted => "note",
            AuditEventKind::FolderCreated
            | AuditEventKind::FolderUpdated
            | AuditEventKind::FolderDeleted => "folder",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    pub event_kind: AuditEventKind,
    /// Owner on whose behalf the operation ran.
    pub user_id: Option<String>,
    /// Resource type (note, folder).
    pub resource_type: Option<String>,
    /// Note or folder id.
    pub resource_id: Option<String>,
    /// Ids and sizes; never content or titles.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub outcome: AuditOutcome,
    /// Error message if the operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new successful audit event.
    pub fn new(event_kind: AuditEventKind) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_kind,
            user_id: None,
            resource_type: None,
            resource_id: None,
            details: None,
            outcome: AuditOutcome::Success,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.outcome = AuditOutcome::Failure;
        self.error = Some(error.into());
        self
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Record one event. Must not panic and must not block for long.
    fn record(
        &self,
        owner: &OwnerId,
        kind: AuditEventKind,
        outcome: AuditOutcome,
        context: serde_json::Value,
    );
}

/// Audit events appended to daily JSONL files.
pub struct AuditRepository {
    storage: FileStorage,
    write_lock: Mutex<()>,
}

impl AuditRepository {
    /// Create a new audit repository.
    pub fn new(storage: FileStorage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Log an audit event.
    ///
    /// Events are appended to a daily log file in JSONL format.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);
        let line = serde_json::to_vec(event)?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.storage.append_line(&path, &line)
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;

        let content_str = String::from_utf8(content).map_err(|e| {
            StorageError::IntegrityViolation(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        let mut events = Vec::new();
        for line in content_str.lines() {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(line)?);
        }

        Ok(events)
    }

    /// Search events by resource.
    pub fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let events = self.read_events(date)?;
        Ok(events
            .into_iter()
            .filter(|e| {
                e.resource_type.as_deref() == Some(resource_type)
                    && e.resource_id.as_deref() == Some(resource_id)
            })
            .collect())
    }
}

impl AuditSink for AuditRepository {
    fn record(
        &self,
        owner: &OwnerId,
        kind: AuditEventKind,
        outcome: AuditOutcome,
        context: serde_json::Value,
    ) {
        let mut event = AuditEvent::new(kind).with_user(owner.as_str());
        if let Some(id) = context.get("id").and_then(|v| v.as_str()) {
            event = event.with_resource(kind.resource_type(), id);
        }
        if outcome == AuditOutcome::Failure {
            let reason = context
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("operation failed")
                .to_string();
            event = event.failed(reason);
        }
        let event = event.with_details(context);

        if let Err(e) = self.log(&event) {
            tracing::warn!(error = %e, event_kind = ?kind, "Failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AuditRepository) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, AuditRepository::new(storage))
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventKind::NoteCreated)
            .with_user("user_123")
            .with_resource("note", "doc_abc");

        assert_eq!(event.event_kind, AuditEventKind::NoteCreated);
        assert_eq!(event.user_id, Some("user_123".to_string()));
        assert_eq!(event.resource_type, Some("note".to_string()));
        assert_eq!(event.resource_id, Some("doc_abc".to_string()));
        assert_eq!(event.outcome, AuditOutcome::Success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventKind::FolderDeleted)
            .with_user("user_123")
            .failed("Folder not found");

        assert_eq!(event.outcome, AuditOutcome::Failure);
        assert_eq!(event.error, Some("Folder not found".to_string()));
    }

    #[test]
    fn event_kinds_serialize_in_snake_case() {
        let value = serde_json::to_value(AuditEventKind::NoteContentUpdated).unwrap();
        assert_eq!(value, "note_content_updated");
        assert_eq!(AuditEventKind::FolderUpdated.resource_type(), "folder");
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, repo) = setup();

        repo.log(
            &AuditEvent::new(AuditEventKind::NoteCreated)
                .with_user("user_1")
                .with_resource("note", "n1"),
        )
        .unwrap();
        repo.log(
            &AuditEvent::new(AuditEventKind::NoteDeleted)
                .with_user("user_2")
                .with_resource("note", "n2"),
        )
        .unwrap();

        let events = repo.read_events(&today()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_kind, AuditEventKind::NoteCreated);
        assert_eq!(events[1].event_kind, AuditEventKind::NoteDeleted);
    }

    #[test]
    fn sink_records_owner_resource_and_outcome() {
        let (_temp, repo) = setup();
        let owner = OwnerId::new("user_target").unwrap();

        repo.record(
            &owner,
            AuditEventKind::FolderCreated,
            AuditOutcome::Success,
            json!({ "id": "f1" }),
        );
        repo.record(
            &owner,
            AuditEventKind::NoteDeleted,
            AuditOutcome::Failure,
            json!({ "id": "n1", "error": "not found" }),
        );

        let events = repo.read_events(&today()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| e.user_id.as_deref() == Some("user_target")));
        assert_eq!(events[0].resource_type.as_deref(), Some("folder"));
        assert_eq!(events[1].outcome, AuditOutcome::Failure);
        assert_eq!(events[1].error.as_deref(), Some("not found"));

        let by_resource = repo.search_by_resource("note", "n1", &today()).unwrap();
        assert_eq!(by_resource.len(), 1);
    }

    #[test]
    fn sink_swallows_write_failures() {
        let storage = FileStorage::new(StoragePaths::new("/tmp/never-init-audit"));
        let repo = AuditRepository::new(storage);
        let owner = OwnerId::new("u").unwrap();

        // Uninitialized storage fails every write; record must not panic
        repo.record(
            &owner,
            AuditEventKind::NoteCreated,
            AuditOutcome::Success,
            json!({}),
        );
    }
}
