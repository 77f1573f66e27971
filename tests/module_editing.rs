//! Integration tests for module editing.
//!
//! These tests drive the public API against the in-memory store and check
//! the approval reset, ordering, atomicity and read-after-write behavior of
//! the editor.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use research_modules::store::InMemoryModuleStore;
use research_modules::{
    seed, AuthorPanel, Authorship, AuthorshipId, EditError, EditPolicy, FollowAction, Handle,
    InMemorySearchIndex, License, LicenseId, Module, ModuleEdit, ModuleEditor, ModuleId,
    ModuleReader, ModuleStore, ModuleType, ModuleTypeId, Principal, ProfileService,
    ReferenceKind, SeedEnvironment, Suffix, Viewer, Workspace, WorkspaceId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

const TARGET: ModuleId = ModuleId::new(1);

fn license(id: i32, name: &str) -> License {
    License {
        id: LicenseId::new(id),
        name: name.to_string(),
        url: format!("https://licenses.test/{}", id),
        price: 0,
        price_id: None,
    }
}

/// Module 1 authored by a (rank 0), b (rank 1) and c (rank 2), all approved.
/// Module 1 cites modules 3 ("Zeta") and 2 ("Alpha"); module 4 derives from it.
fn build_store() -> InMemoryModuleStore {
    let mut store = InMemoryModuleStore::new();
    store.add_module_type(ModuleType { id: ModuleTypeId::new(1), name: "Idea".into(), wikidata: "Q131841".into() });
    store.add_module_type(ModuleType { id: ModuleTypeId::new(2), name: "Data".into(), wikidata: "Q42848".into() });
    store.add_license(license(1, "CC0"));
    store.add_license(license(2, "CC BY 4.0"));

    store.add_module(Module::draft(TARGET, "aaaa-0001", "Original", ModuleTypeId::new(1), Some(LicenseId::new(1))));
    store.add_module(Module::draft(ModuleId::new(2), "aaaa-0002", "Alpha", ModuleTypeId::new(1), None));
    store.add_module(Module::draft(ModuleId::new(3), "aaaa-0003", "Zeta", ModuleTypeId::new(1), None));
    store.add_module(Module::draft(ModuleId::new(4), "aaaa-0004", "Follow-up", ModuleTypeId::new(2), None));
    store.add_reference(TARGET, ModuleId::new(3));
    store.add_reference(TARGET, ModuleId::new(2));
    store.add_derivation(TARGET, ModuleId::new(4));

    for (id, handle) in [(1, "a"), (2, "b"), (3, "c"), (4, "w")] {
        store.add_workspace(Workspace::new(WorkspaceId::new(id), handle));
    }
    // Inserted out of rank order on purpose.
    store.add_authorship(Authorship::new(AuthorshipId::new(30), TARGET, WorkspaceId::new(3), 2).approved(true));
    store.add_authorship(Authorship::new(AuthorshipId::new(10), TARGET, WorkspaceId::new(1), 0).approved(true));
    store.add_authorship(Authorship::new(AuthorshipId::new(20), TARGET, WorkspaceId::new(2), 1).approved(true));
    store.add_authorship(Authorship::new(AuthorshipId::new(40), ModuleId::new(2), WorkspaceId::new(4), 0).approved(true));
    store
}

fn edit(title: &str) -> ModuleEdit {
    ModuleEdit {
        module_id: TARGET,
        type_id: ModuleTypeId::new(2),
        title: title.to_string(),
        description: Some("A longer description".to_string()),
        license_id: LicenseId::new(2),
        display_color: None,
    }
}

fn caller(id: i32) -> Principal {
    Principal::new(WorkspaceId::new(id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Approval Reset
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_edit_resets_every_approval() {
    let store = Arc::new(build_store());
    let editor = ModuleEditor::new(Arc::clone(&store));

    let detail = editor.edit(&caller(1), edit("Renamed")).await.unwrap();

    assert_eq!(detail.authors.len(), 3);
    assert!(detail.authors.iter().all(|a| !a.ready_to_publish));
    assert!(!detail.all_authors_ready());
    assert_eq!(detail.pending_approvals().len(), 3);

    // Another module's approvals are untouched.
    assert!(store.authorship(AuthorshipId::new(40)).unwrap().ready_to_publish);
}

#[tokio::test]
async fn test_noop_edit_still_resets_approvals() {
    let store = Arc::new(build_store());
    let editor = ModuleEditor::new(Arc::clone(&store));

    let same = ModuleEdit {
        module_id: TARGET,
        type_id: ModuleTypeId::new(1),
        title: "Original".to_string(),
        description: None,
        license_id: LicenseId::new(1),
        display_color: None,
    };
    let detail = editor.edit(&caller(1), same).await.unwrap();

    assert_eq!(detail.module.title, "Original");
    assert!(detail.authors.iter().all(|a| !a.ready_to_publish));
}

#[tokio::test]
async fn test_edit_is_idempotent() {
    let store = Arc::new(build_store());
    let editor = ModuleEditor::new(Arc::clone(&store));

    let first = editor.edit(&caller(1), edit("Twice")).await.unwrap();
    let second = editor.edit(&caller(1), edit("Twice")).await.unwrap();

    assert_eq!(first, second);
}

// ─────────────────────────────────────────────────────────────────────────────
// Read After Write
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_returned_detail_matches_fresh_read() {
    let store = Arc::new(build_store());
    let editor = ModuleEditor::new(Arc::clone(&store));
    let reader = ModuleReader::new(Arc::clone(&store));

    let returned = editor.edit(&caller(1), edit("Renamed")).await.unwrap();
    let fresh = reader.detail_by_id(TARGET).await.unwrap().unwrap();

    assert_eq!(returned, fresh);
    assert_eq!(fresh.module.title, "Renamed");
    assert_eq!(fresh.module_type.as_ref().map(|t| t.name.as_str()), Some("Data"));
    assert_eq!(fresh.license.as_ref().map(|l| l.id), Some(LicenseId::new(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_edits_never_lose_a_reset() {
    let store = Arc::new(build_store());
    let editor = Arc::new(ModuleEditor::new(Arc::clone(&store)));
    let titles: Vec<String> = (0..32).map(|i| format!("Concurrent {}", i)).collect();

    let handles: Vec<_> = titles
        .iter()
        .cloned()
        .map(|title| {
            let editor = Arc::clone(&editor);
            tokio::spawn(async move { editor.edit(&caller(1), edit(&title)).await })
        })
        .collect();

    for handle in handles {
        let detail = handle.await.unwrap().unwrap();
        assert!(titles.contains(&detail.module.title));
        assert!(detail.authors.iter().all(|a| !a.ready_to_publish));
    }

    let reader = ModuleReader::new(Arc::clone(&store));
    let fresh = reader.detail_by_id(TARGET).await.unwrap().unwrap();
    assert!(titles.contains(&fresh.module.title));
    assert_eq!(fresh.module.type_id, ModuleTypeId::new(2));
    assert_eq!(fresh.authors.len(), 3);
    assert!(fresh.authors.iter().all(|a| !a.ready_to_publish));
}

#[tokio::test]
async fn test_detail_ordering() {
    let store = Arc::new(build_store());
    let editor = ModuleEditor::new(Arc::clone(&store));

    let detail = editor.edit(&caller(1), edit("Renamed")).await.unwrap();

    let ranks: Vec<i32> = detail.authors.iter().map(|a| a.authorship_rank).collect();
    assert_eq!(ranks, vec![0, 1, 2]);

    let titles: Vec<&str> = detail.references.iter().map(|r| r.module.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Zeta"]);
    assert_eq!(detail.references[0].authors.len(), 1);

    assert_eq!(detail.children.len(), 1);
    assert_eq!(detail.children[0].module.id, ModuleId::new(4));
    assert!(detail.parents.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure Atomicity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_license_changes_nothing() {
    let store = Arc::new(build_store());
    let editor = ModuleEditor::new(Arc::clone(&store));
    let reader = ModuleReader::new(Arc::clone(&store));
    let before = reader.detail_by_id(TARGET).await.unwrap().unwrap();

    let mut bad = edit("Renamed");
    bad.license_id = LicenseId::new(404);
    let err = editor.edit(&caller(1), bad).await.unwrap_err();

    assert!(matches!(err, EditError::ReferenceNotFound(ReferenceKind::License(id)) if id == LicenseId::new(404)));
    assert_eq!(reader.detail_by_id(TARGET).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_failed_reset_rolls_back_edit() {
    let store = Arc::new(build_store());
    let editor = ModuleEditor::new(Arc::clone(&store));

    store.fail_next_authorship_reset();
    let err = editor.edit(&caller(1), edit("Renamed")).await.unwrap_err();
    assert!(matches!(err, EditError::StoreError(_)));

    let module = store.module_by_id(TARGET).await.unwrap().unwrap();
    assert_eq!(module.title, "Original");
    for id in [10, 20, 30] {
        assert!(store.authorship(AuthorshipId::new(id)).unwrap().ready_to_publish);
    }

    // The store recovers once the injected failure is consumed.
    assert!(editor.edit(&caller(1), edit("Renamed")).await.is_ok());
}

#[tokio::test]
async fn test_conflict_exhaustion_changes_nothing() {
    let store = Arc::new(build_store());
    store.inject_conflicts(100);
    let reader = ModuleReader::new(Arc::clone(&store));
    let editor = ModuleEditor::with_reader(reader, EditPolicy { max_conflict_retries: 2, ..EditPolicy::default() });

    let err = editor.edit(&caller(1), edit("Renamed")).await.unwrap_err();
    assert!(matches!(err, EditError::TransactionConflict { attempts: 3, .. }));
    assert!(store.authorship(AuthorshipId::new(10)).unwrap().ready_to_publish);
}

// ─────────────────────────────────────────────────────────────────────────────
// Search Index
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_only_published_modules_are_indexed() {
    let mut store = build_store();
    let published = Module::draft(ModuleId::new(5), "aaaa-0005", "Published", ModuleTypeId::new(1), Some(LicenseId::new(1)))
        .publish(Utc.with_ymd_and_hms(2022, 1, 5, 12, 0, 0).unwrap());
    store.add_module(published);
    let store = Arc::new(store);

    let index = Arc::new(InMemorySearchIndex::new());
    let editor = ModuleEditor::new(Arc::clone(&store)).with_index(index.clone());

    editor.edit(&caller(1), edit("Draft edit")).await.unwrap();
    assert!(index.is_empty());

    let mut on_published = edit("Published, edited");
    on_published.module_id = ModuleId::new(5);
    editor.edit(&caller(1), on_published).await.unwrap();

    let document = index.document(ModuleId::new(5)).unwrap();
    assert_eq!(document.name, "Published, edited");
    assert_eq!(document.doi, "10.53962/aaaa-0005");
    assert_eq!(document.module_type.as_deref(), Some("Data"));
}

#[tokio::test]
async fn test_index_outage_does_not_fail_edit() {
    let mut store = build_store();
    store.add_module(
        Module::draft(ModuleId::new(5), "aaaa-0005", "Published", ModuleTypeId::new(1), None)
            .publish(Utc::now()),
    );
    let store = Arc::new(store);
    let index = Arc::new(InMemorySearchIndex::new());
    index.set_unavailable(true);
    let editor = ModuleEditor::new(Arc::clone(&store)).with_index(index.clone());

    let mut on_published = edit("Edited");
    on_published.module_id = ModuleId::new(5);
    let detail = editor.edit(&caller(1), on_published).await.unwrap();

    assert_eq!(detail.module.title, "Edited");
    assert!(index.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Follow Derivation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_author_panel_follow_actions() {
    let mut store = build_store();
    store.add_authorship(Authorship::new(AuthorshipId::new(50), TARGET, WorkspaceId::new(4), 3));
    let store = Arc::new(store);
    let profiles = ProfileService::new(Arc::clone(&store));
    let reader = ModuleReader::new(Arc::clone(&store));

    // w follows a and b.
    profiles.follow(&caller(4), &Handle::new("a")).await.unwrap();
    profiles.follow(&caller(4), &Handle::new("b")).await.unwrap();

    let module = reader.by_suffix(&Suffix::new("aaaa-0001")).await.unwrap().unwrap();
    let panel = profiles.author_panel(&module, Some(&caller(4))).await.unwrap();

    assert_eq!(panel.action_for("a"), Some(FollowAction::Unfollow));
    assert_eq!(panel.action_for("b"), Some(FollowAction::Unfollow));
    assert_eq!(panel.action_for("c"), Some(FollowAction::Follow));
    assert_eq!(panel.action_for("w"), Some(FollowAction::None));

    let handles: Vec<&str> = panel.entries.iter().map(|e| e.handle.as_str()).collect();
    assert_eq!(handles, vec!["a", "b", "c", "w"]);

    let anonymous = AuthorPanel::build(&module, None);
    assert!(anonymous.entries.iter().all(|e| e.action == FollowAction::None));
}

#[tokio::test]
async fn test_viewer_reflects_unfollow() {
    let store = Arc::new(build_store());
    let profiles = ProfileService::new(Arc::clone(&store));

    profiles.follow(&caller(4), &Handle::new("c")).await.unwrap();
    profiles.unfollow(&caller(4), &Handle::new("c")).await.unwrap();

    let viewer: Viewer = profiles.viewer(&caller(4)).await.unwrap().unwrap();
    assert!(viewer.following.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Seeded Lookups
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_edit_against_seeded_lookups() {
    let mut store = InMemoryModuleStore::new();
    store.add_module(Module::draft(TARGET, "seed-0001", "Seeded", ModuleTypeId::new(1), None));
    let store = Arc::new(store);
    seed(store.as_ref(), SeedEnvironment::Test).await.unwrap();

    let editor = ModuleEditor::new(Arc::clone(&store));
    let mut change = edit("With license");
    change.type_id = ModuleTypeId::new(29);
    change.license_id = LicenseId::new(8);
    let detail = editor.edit(&caller(1), change).await.unwrap();

    assert_eq!(detail.module_type.map(|t| t.name), Some("Poster".to_string()));
    assert_eq!(detail.license.map(|l| l.name), Some("All rights reserved".to_string()));
}
