// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Folder service.
//!
//! Runs the folder tree invariants on top of the folder repository:
//!
//! - sibling names are unique per owner and parent (checked here for a
//!   clear error, enforced by the name index in the same transaction as
//!   the write);
//! - the parent graph stays acyclic (every move is checked against the
//!   moving folder's descendant set);
//! - removing a folder removes its whole subtree and moves the contained
//!   notes to the root before any folder record is deleted.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::error::{NoteError, NoteResult};
use crate::models::{Folder, FolderPatch, FolderRef, FolderRemoval, NewFolder, OwnerId};
use crate::storage::{AuditEventKind, AuditOutcome, AuditSink, FolderRepository, NoteDatabase};

use super::DocumentService;

#[derive(Clone)]
pub struct FolderService {
    db: Arc<NoteDatabase>,
    documents: DocumentService,
    audit: Arc<dyn AuditSink>,
}

impl FolderService {
    pub fn new(db: Arc<NoteDatabase>, documents: DocumentService, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            db,
            documents,
            audit,
        }
    }

    fn repo(&self) -> FolderRepository<'_> {
        FolderRepository::new(&self.db)
    }

    /// Create a folder under `input.parent`.
    pub fn create_folder(&self, owner: &OwnerId, input: NewFolder) -> NoteResult<Folder> {
        let name = normalize_name(&input.name)?;
        self.require_parent(owner, &input.parent)?;

        if self.repo().find_by_name(owner, &input.parent, &name)?.is_some() {
            return Err(name_conflict(&name));
        }

        let now = Utc::now();
        let folder = Folder {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner.clone(),
            name,
            parent: input.parent,
            color: normalize_color(input.color),
            created_at: now,
            updated_at: now,
        };

        // The name index rejects a concurrent duplicate that slipped past the check
        self.repo().create(&folder)?;

        tracing::info!(owner_id = %owner, folder_id = %folder.id, parent = %folder.parent, "Created folder");
        self.audit.record(
            owner,
            AuditEventKind::FolderCreated,
            AuditOutcome::Success,
            json!({ "id": folder.id, "parentId": folder.parent.folder_id() }),
        );
        Ok(folder)
    }

    /// All of `owner`'s folders, sorted by name.
    pub fn find_all(&self, owner: &OwnerId) -> NoteResult<Vec<Folder>> {
        let mut folders = self.repo().list(owner)?;
        sort_by_name(&mut folders);
        Ok(folders)
    }

    pub fn find_one(&self, owner: &OwnerId, id: &str) -> NoteResult<Folder> {
        self.repo()
            .get(owner, id)?
            .ok_or_else(|| NoteError::not_found(format!("Folder {id}")))
    }

    /// Direct children of `parent`, sorted by name.
    pub fn find_children(&self, owner: &OwnerId, parent: &FolderRef) -> NoteResult<Vec<Folder>> {
        self.require_parent(owner, parent)?;
        let mut children = self.repo().children(owner, parent)?;
        sort_by_name(&mut children);
        Ok(children)
    }

    /// Ids of every folder below `id`, at any depth. Excludes `id` itself.
    pub fn find_descendants(&self, owner: &OwnerId, id: &str) -> NoteResult<BTreeSet<String>> {
        if !self.repo().exists(owner, id)? {
            return Err(NoteError::not_found(format!("Folder {id}")));
        }
        Ok(self.descendants(owner, id)?.into_iter().collect())
    }

    /// Iterative frontier expansion over the children index.
    ///
    /// Each round fetches the children of the whole frontier; those not seen
    /// before become the next frontier. Every id enters the result at most
    /// once, so the walk terminates even on a corrupted, cyclic graph.
    /// Ids come back level by level, shallowest first.
    fn descendants(&self, owner: &OwnerId, id: &str) -> NoteResult<Vec<String>> {
        let repo = self.repo();
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut frontier = vec![FolderRef::Folder(id.to_string())];

        while !frontier.is_empty() {
            frontier = repo
                .children_of_any(owner, &frontier)?
                .into_iter()
                .filter(|child| child.id != id && seen.insert(child.id.clone()))
                .map(|child| FolderRef::Folder(child.id))
                .collect();
            found.extend(frontier.iter().filter_map(|f| f.folder_id().map(str::to_string)));
        }
        Ok(found)
    }

    /// Rename, move or recolor a folder.
    pub fn update_folder(&self, owner: &OwnerId, id: &str, patch: FolderPatch) -> NoteResult<Folder> {
        let current = self.find_one(owner, id)?;

        let name = match &patch.name {
            Some(name) => normalize_name(name)?,
            None => current.name.clone(),
        };
        let parent = patch.parent.clone().unwrap_or_else(|| current.parent.clone());

        if parent != current.parent {
            if let Some(parent_id) = parent.folder_id() {
                if parent_id == id {
                    return Err(NoteError::invalid("a folder cannot be its own parent"));
                }
                if self.descendants(owner, id)?.iter().any(|d| d == parent_id) {
                    return Err(NoteError::invalid(
                        "a folder cannot be moved into one of its descendants",
                    ));
                }
            }
            self.require_parent(owner, &parent)?;
        }

        if name != current.name || parent != current.parent {
            let holder = self.repo().find_by_name(owner, &parent, &name)?;
            if holder.is_some_and(|holder| holder != id) {
                return Err(name_conflict(&name));
            }
        }

        let color = patch.color.map(normalize_color);
        let updated = self.repo().update(owner, id, |folder| {
            folder.name = name;
            folder.parent = parent;
            if let Some(color) = color {
                folder.color = color;
            }
            folder.updated_at = Utc::now();
            Ok(())
        })?;

        tracing::info!(owner_id = %owner, folder_id = %id, "Updated folder");
        self.audit.record(
            owner,
            AuditEventKind::FolderUpdated,
            AuditOutcome::Success,
            json!({ "id": id, "parentId": updated.parent.folder_id() }),
        );
        Ok(updated)
    }

    /// Remove a folder and its whole subtree. Contained notes move to the root.
    ///
    /// Notes are moved before any folder is deleted. Folders are deleted
    /// deepest first and the target last, so a failure part-way leaves a
    /// connected subtree under the target and repeating the call finishes
    /// the job.
    pub fn remove_folder(&self, owner: &OwnerId, id: &str) -> NoteResult<FolderRemoval> {
        if !self.repo().exists(owner, id)? {
            return Err(NoteError::not_found(format!("Folder {id}")));
        }

        let descendants = self.descendants(owner, id)?;
        let doomed: Vec<&str> = descendants
            .iter()
            .rev()
            .map(String::as_str)
            .chain(std::iter::once(id))
            .collect();

        let mut summary = FolderRemoval::default();
        for folder_id in &doomed {
            summary.documents_moved += self.documents.move_documents_to_root(owner, folder_id)?;
        }

        let repo = self.repo();
        for folder_id in &doomed {
            match repo.delete(owner, folder_id) {
                Ok(Some(_)) => summary.folders_removed += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        owner_id = %owner,
                        folder_id = %folder_id,
                        error = %e,
                        "Folder removal stopped part-way"
                    );
                    self.audit.record(
                        owner,
                        AuditEventKind::FolderDeleted,
                        AuditOutcome::Failure,
                        json!({ "id": id, "error": e.to_string() }),
                    );
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            owner_id = %owner,
            folder_id = %id,
            folders_removed = summary.folders_removed,
            documents_moved = summary.documents_moved,
            "Removed folder"
        );
        self.audit.record(
            owner,
            AuditEventKind::FolderDeleted,
            AuditOutcome::Success,
            json!({
                "id": id,
                "foldersRemoved": summary.folders_removed,
                "documentsMoved": summary.documents_moved,
            }),
        );
        Ok(summary)
    }

    fn require_parent(&self, owner: &OwnerId, parent: &FolderRef) -> NoteResult<()> {
        if let Some(parent_id) = parent.folder_id() {
            if !self.repo().exists(owner, parent_id)? {
                return Err(NoteError::not_found(format!("Folder {parent_id}")));
            }
        }
        Ok(())
    }
}

fn normalize_name(name: &str) -> NoteResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NoteError::invalid("folder name must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn normalize_color(color: Option<String>) -> Option<String> {
    color
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn name_conflict(name: &str) -> NoteError {
    NoteError::Conflict(format!(
        "A folder named '{name}' already exists in this location"
    ))
}

fn sort_by_name(folders: &mut [Folder]) {
    folders.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FolderFilter, NewDocument};
    use crate::services::testing::{envelope, fixture, Fixture};

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn mkdir(fx: &Fixture, owner: &OwnerId, name: &str, parent: &FolderRef) -> Folder {
        fx.folders
            .create_folder(
                owner,
                NewFolder {
                    name: name.to_string(),
                    parent: parent.clone(),
                    color: None,
                },
            )
            .unwrap()
    }

    fn under(folder: &Folder) -> FolderRef {
        FolderRef::Folder(folder.id.clone())
    }

    fn note_in(fx: &Fixture, owner: &OwnerId, folder: &Folder) -> String {
        fx.documents
            .create_document(
                owner,
                envelope(b"body", "h"),
                NewDocument {
                    folder: under(folder),
                    ..Default::default()
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn create_folder_at_root() {
        let fx = fixture();
        let u = owner("u1");

        mkdir(&fx, &u, "Classes", &FolderRef::Root);

        let all = fx.folders.find_all(&u).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Classes");
        assert!(all[0].parent.is_root());
    }

    #[test]
    fn duplicate_name_at_root_conflicts() {
        let fx = fixture();
        let u = owner("u1");
        mkdir(&fx, &u, "Classes", &FolderRef::Root);

        let result = fx.folders.create_folder(
            &u,
            NewFolder {
                name: " Classes ".into(),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(NoteError::Conflict(_))));

        // Names are case-sensitive
        mkdir(&fx, &u, "classes", &FolderRef::Root);
    }

    #[test]
    fn empty_name_is_invalid() {
        let fx = fixture();
        let result = fx.folders.create_folder(
            &owner("u1"),
            NewFolder {
                name: "   ".into(),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(NoteError::InvalidRequest(_))));
    }

    #[test]
    fn parent_must_belong_to_owner() {
        let fx = fixture();
        let theirs = mkdir(&fx, &owner("u2"), "Theirs", &FolderRef::Root);

        let result = fx.folders.create_folder(
            &owner("u1"),
            NewFolder {
                name: "Mine".into(),
                parent: under(&theirs),
                color: None,
            },
        );
        assert!(matches!(result, Err(NoteError::NotFound(_))));
    }

    #[test]
    fn find_one_is_owner_scoped() {
        let fx = fixture();
        let f = mkdir(&fx, &owner("u1"), "Private", &FolderRef::Root);

        assert!(fx.folders.find_one(&owner("u1"), &f.id).is_ok());
        assert!(matches!(
            fx.folders.find_one(&owner("u2"), &f.id),
            Err(NoteError::NotFound(_))
        ));
    }

    #[test]
    fn find_all_and_children_sort_by_name() {
        let fx = fixture();
        let u = owner("u1");
        let top = mkdir(&fx, &u, "Top", &FolderRef::Root);
        mkdir(&fx, &u, "Zoology", &under(&top));
        mkdir(&fx, &u, "Art", &under(&top));
        mkdir(&fx, &u, "Music", &FolderRef::Root);

        let names: Vec<_> = fx
            .folders
            .find_all(&u)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Art", "Music", "Top", "Zoology"]);

        let children: Vec<_> = fx
            .folders
            .find_children(&u, &under(&top))
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(children, vec!["Art", "Zoology"]);
    }

    #[test]
    fn descendants_cover_every_depth() {
        let fx = fixture();
        let u = owner("u1");
        let a = mkdir(&fx, &u, "A", &FolderRef::Root);
        let b = mkdir(&fx, &u, "B", &under(&a));
        let c = mkdir(&fx, &u, "C", &under(&b));
        let d = mkdir(&fx, &u, "D", &under(&a));
        mkdir(&fx, &u, "Elsewhere", &FolderRef::Root);

        let found = fx.folders.find_descendants(&u, &a.id).unwrap();
        assert_eq!(found, BTreeSet::from([b.id, c.id.clone(), d.id]));
        assert!(fx.folders.find_descendants(&u, &c.id).unwrap().is_empty());
        assert!(matches!(
            fx.folders.find_descendants(&owner("u2"), &a.id),
            Err(NoteError::NotFound(_))
        ));
    }

    #[test]
    fn cascade_moves_notes_to_root() {
        let fx = fixture();
        let u = owner("u1");
        let root = mkdir(&fx, &u, "Root", &FolderRef::Root);
        let child = mkdir(&fx, &u, "Child", &under(&root));
        let grandchild = mkdir(&fx, &u, "Grandchild", &under(&child));

        let notes = [
            note_in(&fx, &u, &root),
            note_in(&fx, &u, &child),
            note_in(&fx, &u, &grandchild),
        ];

        let summary = fx.folders.remove_folder(&u, &root.id).unwrap();
        assert_eq!(
            summary,
            FolderRemoval {
                folders_removed: 3,
                documents_moved: 3,
            }
        );

        assert!(fx.folders.find_all(&u).unwrap().is_empty());
        for id in &notes {
            let doc = fx.documents.get_document(&u, id).unwrap();
            assert!(doc.folder.is_root());
        }
        assert_eq!(
            fx.documents
                .list_documents(&u, &FolderFilter::Root)
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn interrupted_cascade_can_be_repeated() {
        let fx = fixture();
        let u = owner("u1");
        let a = mkdir(&fx, &u, "A", &FolderRef::Root);
        let b = mkdir(&fx, &u, "B", &under(&a));
        let c = mkdir(&fx, &u, "C", &under(&b));
        let notes = [note_in(&fx, &u, &a), note_in(&fx, &u, &b), note_in(&fx, &u, &c)];

        // First attempt: every note moved, then stopped after deleting C
        for folder in [&a, &b, &c] {
            fx.documents.move_documents_to_root(&u, &folder.id).unwrap();
        }
        assert!(FolderRepository::new(&fx.db).delete(&u, &c.id).unwrap().is_some());

        let summary = fx.folders.remove_folder(&u, &a.id).unwrap();
        assert_eq!(
            summary,
            FolderRemoval {
                folders_removed: 2,
                documents_moved: 0,
            }
        );

        assert!(fx.folders.find_all(&u).unwrap().is_empty());
        for id in &notes {
            assert!(fx.documents.get_document(&u, id).unwrap().folder.is_root());
        }
    }

    #[test]
    fn cascade_leaves_siblings_and_other_owners_alone() {
        let fx = fixture();
        let u = owner("u1");
        let doomed = mkdir(&fx, &u, "Doomed", &FolderRef::Root);
        let keep = mkdir(&fx, &u, "Keep", &FolderRef::Root);
        let kept_note = note_in(&fx, &u, &keep);

        let other = owner("u2");
        let theirs = mkdir(&fx, &other, "Doomed", &FolderRef::Root);

        fx.folders.remove_folder(&u, &doomed.id).unwrap();

        assert!(fx.folders.find_one(&u, &keep.id).is_ok());
        assert!(fx.folders.find_one(&other, &theirs.id).is_ok());
        assert_eq!(
            fx.documents.get_document(&u, &kept_note).unwrap().folder,
            under(&keep)
        );
    }

    #[test]
    fn remove_missing_folder_is_not_found() {
        let fx = fixture();
        let u = owner("u1");
        let f = mkdir(&fx, &u, "Once", &FolderRef::Root);

        fx.folders.remove_folder(&u, &f.id).unwrap();
        assert!(matches!(
            fx.folders.remove_folder(&u, &f.id),
            Err(NoteError::NotFound(_))
        ));
    }

    #[test]
    fn rename_into_sibling_name_conflicts() {
        let fx = fixture();
        let u = owner("u1");
        mkdir(&fx, &u, "A", &FolderRef::Root);
        let b = mkdir(&fx, &u, "B", &FolderRef::Root);

        let result = fx.folders.update_folder(
            &u,
            &b.id,
            FolderPatch {
                name: Some("A".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(NoteError::Conflict(_))));

        // Renaming to its own current name is not a conflict
        let same = fx
            .folders
            .update_folder(
                &u,
                &b.id,
                FolderPatch {
                    name: Some("B".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(same.name, "B");
    }

    #[test]
    fn move_without_rename_checks_destination_names() {
        let fx = fixture();
        let u = owner("u1");
        let dest = mkdir(&fx, &u, "Dest", &FolderRef::Root);
        mkdir(&fx, &u, "Notes", &under(&dest));
        let mover = mkdir(&fx, &u, "Notes", &FolderRef::Root);

        let result = fx.folders.update_folder(
            &u,
            &mover.id,
            FolderPatch {
                parent: Some(under(&dest)),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(NoteError::Conflict(_))));
    }

    #[test]
    fn move_into_own_subtree_is_invalid() {
        let fx = fixture();
        let u = owner("u1");
        let a = mkdir(&fx, &u, "A", &FolderRef::Root);
        let b = mkdir(&fx, &u, "B", &under(&a));
        let c = mkdir(&fx, &u, "C", &under(&b));

        for target in [&a, &b, &c] {
            let result = fx.folders.update_folder(
                &u,
                &a.id,
                FolderPatch {
                    parent: Some(under(target)),
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(NoteError::InvalidRequest(_))));
        }
        assert!(fx.folders.find_one(&u, &a.id).unwrap().parent.is_root());
    }

    #[test]
    fn move_rename_and_recolor() {
        let fx = fixture();
        let u = owner("u1");
        let a = mkdir(&fx, &u, "A", &FolderRef::Root);
        let b = mkdir(&fx, &u, "B", &FolderRef::Root);

        let moved = fx
            .folders
            .update_folder(
                &u,
                &b.id,
                FolderPatch {
                    name: Some("Renamed".into()),
                    parent: Some(under(&a)),
                    color: Some(Some("#ff0000".into())),
                },
            )
            .unwrap();
        assert_eq!(moved.name, "Renamed");
        assert_eq!(moved.parent, under(&a));
        assert_eq!(moved.color.as_deref(), Some("#ff0000"));

        let cleared = fx
            .folders
            .update_folder(
                &u,
                &b.id,
                FolderPatch {
                    parent: Some(FolderRef::Root),
                    color: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(cleared.parent.is_root());
        assert!(cleared.color.is_none());
        assert_eq!(cleared.name, "Renamed");
    }

    #[test]
    fn move_to_missing_parent_is_not_found() {
        let fx = fixture();
        let u = owner("u1");
        let a = mkdir(&fx, &u, "A", &FolderRef::Root);

        let result = fx.folders.update_folder(
            &u,
            &a.id,
            FolderPatch {
                parent: Some(FolderRef::Folder("nowhere".into())),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(NoteError::NotFound(_))));
    }

    #[test]
    fn folder_events_are_audited() {
        let fx = fixture();
        let u = owner("u1");
        let f = mkdir(&fx, &u, "Audited", &FolderRef::Root);
        fx.folders
            .update_folder(
                &u,
                &f.id,
                FolderPatch {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        fx.folders.remove_folder(&u, &f.id).unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let kinds: Vec<_> = fx
            .audit
            .search_by_resource("folder", &f.id, &today)
            .unwrap()
            .into_iter()
            .map(|e| e.event_kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventKind::FolderCreated,
                AuditEventKind::FolderUpdated,
                AuditEventKind::FolderDeleted,
            ]
        );
    }
}
