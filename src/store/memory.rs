//! In-memory module store for testing and local development.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::types::{
    Authorship, AuthorshipId, Handle, License, LicenseId, Module, ModuleEdit, ModuleId,
    ModuleType, ModuleTypeId, ProfileUpdate, Suffix, Workspace, WorkspaceId,
};
use super::{EditCommit, ModuleStore, NewLicense, NewModuleType, StoreError};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Simulated serialization failure.
    #[error("Transaction conflict on module {0}")]
    Conflict(ModuleId),
    /// Simulated failure of the authorship reset step.
    #[error("Authorship reset failed for module {0}")]
    ResetFailed(ModuleId),
}

impl StoreError for InMemoryError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    modules: BTreeMap<ModuleId, Module>,
    authorships: BTreeMap<AuthorshipId, Authorship>,
    workspaces: BTreeMap<WorkspaceId, Workspace>,
    module_types: BTreeMap<ModuleTypeId, ModuleType>,
    licenses: BTreeMap<LicenseId, License>,
    /// Citing module -> cited modules.
    references: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    /// Parent -> children.
    children: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    /// Child -> parents.
    parents: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    /// Follower -> followed.
    following: BTreeMap<WorkspaceId, BTreeSet<WorkspaceId>>,
}

impl State {
    fn modules_in(&self, ids: Option<&BTreeSet<ModuleId>>) -> Vec<Module> {
        ids.map(|set| {
            set.iter()
                .filter_map(|id| self.modules.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }
}

/// In-memory module store.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order. Every write
/// runs under a single write lock, so edits are serializable.
#[derive(Debug, Default)]
pub struct InMemoryModuleStore {
    state: RwLock<State>,
    fail_next_reset: AtomicBool,
    pending_conflicts: AtomicU32,
}

impl InMemoryModuleStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module.
    pub fn add_module(&mut self, module: Module) {
        self.state.get_mut().modules.insert(module.id, module);
    }

    /// Add an authorship.
    pub fn add_authorship(&mut self, authorship: Authorship) {
        self.state.get_mut().authorships.insert(authorship.id, authorship);
    }

    /// Add a workspace.
    pub fn add_workspace(&mut self, workspace: Workspace) {
        self.state.get_mut().workspaces.insert(workspace.id, workspace);
    }

    /// Add a module type.
    pub fn add_module_type(&mut self, module_type: ModuleType) {
        self.state.get_mut().module_types.insert(module_type.id, module_type);
    }

    /// Add a license.
    pub fn add_license(&mut self, license: License) {
        self.state.get_mut().licenses.insert(license.id, license);
    }

    /// Record that `citing` references `cited`.
    pub fn add_reference(&mut self, citing: ModuleId, cited: ModuleId) {
        self.state.get_mut().references.entry(citing).or_default().insert(cited);
    }

    /// Record that `child` derives from `parent`.
    pub fn add_derivation(&mut self, parent: ModuleId, child: ModuleId) {
        let state = self.state.get_mut();
        state.children.entry(parent).or_default().insert(child);
        state.parents.entry(child).or_default().insert(parent);
    }

    /// Make the authorship reset step of the next edit fail.
    ///
    /// The module update staged before it must then not become visible.
    pub fn fail_next_authorship_reset(&self) {
        self.fail_next_reset.store(true, Ordering::SeqCst);
    }

    /// Make the next `count` edits fail with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Get an authorship row.
    pub fn authorship(&self, id: AuthorshipId) -> Option<Authorship> {
        self.state.read().authorships.get(&id).cloned()
    }

    /// Get number of modules.
    pub fn num_modules(&self) -> usize {
        self.state.read().modules.len()
    }

    /// Get number of module types.
    pub fn num_module_types(&self) -> usize {
        self.state.read().module_types.len()
    }

    /// Get number of licenses.
    pub fn num_licenses(&self) -> usize {
        self.state.read().licenses.len()
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    type Error = InMemoryError;

    async fn module_by_id(&self, id: ModuleId) -> Result<Option<Module>, Self::Error> {
        Ok(self.state.read().modules.get(&id).cloned())
    }

    async fn module_by_suffix(&self, suffix: &Suffix) -> Result<Option<Module>, Self::Error> {
        Ok(self.state.read()
            .modules
            .values()
            .find(|m| &m.suffix == suffix)
            .cloned())
    }

    async fn authorships(&self, module: ModuleId) -> Result<Vec<Authorship>, Self::Error> {
        let mut rows: Vec<Authorship> = self.state.read()
            .authorships
            .values()
            .filter(|a| a.module_id == module)
            .cloned()
            .collect();
        rows.sort_by_key(Authorship::order_key);
        Ok(rows)
    }

    async fn workspaces(&self, ids: &[WorkspaceId]) -> Result<Vec<Workspace>, Self::Error> {
        let wanted: BTreeSet<_> = ids.iter().copied().collect();
        let state = self.state.read();
        Ok(wanted.iter()
            .filter_map(|id| state.workspaces.get(id).cloned())
            .collect())
    }

    async fn workspace_by_handle(&self, handle: &Handle) -> Result<Option<Workspace>, Self::Error> {
        Ok(self.state.read()
            .workspaces
            .values()
            .find(|w| &w.handle == handle)
            .cloned())
    }

    async fn references(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error> {
        let state = self.state.read();
        let mut cited = state.modules_in(state.references.get(&module));
        cited.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(cited)
    }

    async fn parents(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error> {
        let state = self.state.read();
        Ok(state.modules_in(state.parents.get(&module)))
    }

    async fn children(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error> {
        let state = self.state.read();
        Ok(state.modules_in(state.children.get(&module)))
    }

    async fn module_type(&self, id: ModuleTypeId) -> Result<Option<ModuleType>, Self::Error> {
        Ok(self.state.read().module_types.get(&id).cloned())
    }

    async fn license(&self, id: LicenseId) -> Result<Option<License>, Self::Error> {
        Ok(self.state.read().licenses.get(&id).cloned())
    }

    async fn apply_edit(&self, edit: &ModuleEdit) -> Result<EditCommit, Self::Error> {
        let mut state = self.state.write();

        if self.take_conflict() {
            return Err(InMemoryError::Conflict(edit.module_id));
        }

        let Some(current) = state.modules.get(&edit.module_id) else {
            return Ok(EditCommit::ModuleMissing);
        };
        if !state.module_types.contains_key(&edit.type_id) {
            return Ok(EditCommit::TypeMissing(edit.type_id));
        }
        if !state.licenses.contains_key(&edit.license_id) {
            return Ok(EditCommit::LicenseMissing(edit.license_id));
        }

        // Stage both steps on copies; nothing is published until both succeed.
        let mut staged_module = current.clone();
        staged_module.apply(edit);

        if self.fail_next_reset.swap(false, Ordering::SeqCst) {
            return Err(InMemoryError::ResetFailed(edit.module_id));
        }
        let staged_authorships: Vec<Authorship> = state.authorships
            .values()
            .filter(|a| a.module_id == edit.module_id)
            .map(|a| a.clone().approved(false))
            .collect();

        let authorships_reset = staged_authorships.len() as u64;
        state.modules.insert(staged_module.id, staged_module);
        for authorship in staged_authorships {
            state.authorships.insert(authorship.id, authorship);
        }

        Ok(EditCommit::Applied {
            module_id: edit.module_id,
            authorships_reset,
        })
    }

    async fn following(&self, workspace: WorkspaceId) -> Result<Vec<Workspace>, Self::Error> {
        let state = self.state.read();
        let mut followed: Vec<Workspace> = state.following
            .get(&workspace)
            .map(|set| {
                set.iter()
                    .filter_map(|id| state.workspaces.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        followed.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(followed)
    }

    async fn follow(&self, follower: WorkspaceId, followee: WorkspaceId) -> Result<bool, Self::Error> {
        Ok(self.state.write()
            .following
            .entry(follower)
            .or_default()
            .insert(followee))
    }

    async fn unfollow(&self, follower: WorkspaceId, followee: WorkspaceId) -> Result<bool, Self::Error> {
        Ok(self.state.write()
            .following
            .get_mut(&follower)
            .map(|set| set.remove(&followee))
            .unwrap_or(false))
    }

    async fn update_profile(
        &self,
        workspace: WorkspaceId,
        update: &ProfileUpdate,
    ) -> Result<Option<Workspace>, Self::Error> {
        let mut state = self.state.write();
        Ok(state.workspaces.get_mut(&workspace).map(|w| {
            w.apply_profile(update);
            w.clone()
        }))
    }

    async fn insert_module_types(&self, types: &[NewModuleType]) -> Result<u64, Self::Error> {
        let mut state = self.state.write();
        let mut inserted = 0;
        for new in types {
            if state.module_types.values().any(|t| t.wikidata == new.wikidata) {
                continue;
            }
            let next = state.module_types.keys().next_back().map_or(1, |id| id.get() + 1);
            let id = ModuleTypeId::new(next);
            state.module_types.insert(id, ModuleType {
                id,
                name: new.name.to_string(),
                wikidata: new.wikidata.to_string(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_licenses(&self, licenses: &[NewLicense]) -> Result<u64, Self::Error> {
        let mut state = self.state.write();
        let mut inserted = 0;
        for new in licenses {
            if state.licenses.values().any(|l| l.name == new.name && l.url == new.url) {
                continue;
            }
            let next = state.licenses.keys().next_back().map_or(1, |id| id.get() + 1);
            let id = LicenseId::new(next);
            state.licenses.insert(id, License {
                id,
                name: new.name.to_string(),
                url: new.url.to_string(),
                price: new.price,
                price_id: new.price_id.map(str::to_string),
            });
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> InMemoryModuleStore {
        let mut store = InMemoryModuleStore::new();
        store.add_module_type(ModuleType { id: ModuleTypeId::new(1), name: "Idea".into(), wikidata: "Q131841".into() });
        store.add_license(License {
            id: LicenseId::new(1),
            name: "CC BY 4.0".into(),
            url: "https://creativecommons.org/licenses/by/4.0/legalcode".into(),
            price: 0,
            price_id: None,
        });
        store.add_module(Module::draft(ModuleId::new(1), "aaaa-0001", "Old", ModuleTypeId::new(1), Some(LicenseId::new(1))));
        store.add_workspace(Workspace::new(WorkspaceId::new(1), "alice"));
        store.add_workspace(Workspace::new(WorkspaceId::new(2), "bob"));
        store.add_authorship(Authorship::new(AuthorshipId::new(2), ModuleId::new(1), WorkspaceId::new(2), 1).approved(true));
        store.add_authorship(Authorship::new(AuthorshipId::new(1), ModuleId::new(1), WorkspaceId::new(1), 0).approved(true));
        store
    }

    fn edit(title: &str) -> ModuleEdit {
        ModuleEdit {
            module_id: ModuleId::new(1),
            type_id: ModuleTypeId::new(1),
            title: title.to_string(),
            description: None,
            license_id: LicenseId::new(1),
            display_color: None,
        }
    }

    #[tokio::test]
    async fn test_authorships_ordered_by_rank() {
        let store = make_store();
        let rows = store.authorships(ModuleId::new(1)).await.unwrap();
        assert_eq!(rows[0].workspace_id, WorkspaceId::new(1));
        assert_eq!(rows[1].workspace_id, WorkspaceId::new(2));
    }

    #[tokio::test]
    async fn test_apply_edit_resets_approvals() {
        let store = make_store();
        let commit = store.apply_edit(&edit("New")).await.unwrap();
        assert_eq!(commit, EditCommit::Applied { module_id: ModuleId::new(1), authorships_reset: 2 });

        let rows = store.authorships(ModuleId::new(1)).await.unwrap();
        assert!(rows.iter().all(|a| !a.ready_to_publish));
    }

    #[tokio::test]
    async fn test_missing_license_writes_nothing() {
        let store = make_store();
        let mut bad = edit("New");
        bad.license_id = LicenseId::new(99);

        let commit = store.apply_edit(&bad).await.unwrap();
        assert_eq!(commit, EditCommit::LicenseMissing(LicenseId::new(99)));

        let module = store.module_by_id(ModuleId::new(1)).await.unwrap().unwrap();
        assert_eq!(module.title, "Old");
        assert!(store.authorship(AuthorshipId::new(1)).unwrap().ready_to_publish);
    }

    #[tokio::test]
    async fn test_missing_module_outranks_missing_references() {
        let store = make_store();
        let mut bad = edit("New");
        bad.module_id = ModuleId::new(42);
        bad.type_id = ModuleTypeId::new(99);
        bad.license_id = LicenseId::new(99);

        assert_eq!(store.apply_edit(&bad).await.unwrap(), EditCommit::ModuleMissing);

        bad.module_id = ModuleId::new(1);
        assert_eq!(store.apply_edit(&bad).await.unwrap(), EditCommit::TypeMissing(ModuleTypeId::new(99)));
    }

    #[tokio::test]
    async fn test_failed_reset_rolls_back_module_update() {
        let store = make_store();
        store.fail_next_authorship_reset();

        let result = store.apply_edit(&edit("New")).await;
        assert!(matches!(result, Err(InMemoryError::ResetFailed(_))));

        let module = store.module_by_id(ModuleId::new(1)).await.unwrap().unwrap();
        assert_eq!(module.title, "Old");
        assert!(store.authorship(AuthorshipId::new(2)).unwrap().ready_to_publish);
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = make_store();
        store.inject_conflicts(1);

        let err = store.apply_edit(&edit("New")).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.apply_edit(&edit("New")).await.is_ok());
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let store = make_store();
        assert!(store.follow(WorkspaceId::new(1), WorkspaceId::new(2)).await.unwrap());
        assert!(!store.follow(WorkspaceId::new(1), WorkspaceId::new(2)).await.unwrap());

        let followed = store.following(WorkspaceId::new(1)).await.unwrap();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].handle.as_str(), "bob");

        assert!(store.unfollow(WorkspaceId::new(1), WorkspaceId::new(2)).await.unwrap());
        assert!(!store.unfollow(WorkspaceId::new(1), WorkspaceId::new(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_skips_duplicates() {
        let store = make_store();
        let types = [
            NewModuleType { wikidata: "Q131841", name: "Idea" },
            NewModuleType { wikidata: "Q1371819", name: "Plan" },
        ];
        assert_eq!(store.insert_module_types(&types).await.unwrap(), 1);
        assert_eq!(store.insert_module_types(&types).await.unwrap(), 0);
        assert_eq!(store.num_module_types(), 2);
        assert_eq!(
            store.module_type(ModuleTypeId::new(2)).await.unwrap().unwrap().name,
            "Plan"
        );
    }
}
