//! Module storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{
    Authorship, Handle, License, LicenseId, Module, ModuleEdit, ModuleId, ModuleType,
    ModuleTypeId, ProfileUpdate, Suffix, Workspace, WorkspaceId,
};

/// Error bound for store backends.
///
/// Backends classify transient serialization failures so callers can retry
/// a whole transaction instead of surfacing the failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
    /// True when the operation lost a race with a concurrent transaction
    /// and may succeed if retried.
    fn is_conflict(&self) -> bool {
        false
    }
}

/// Outcome of the transactional edit write.
///
/// The missing-row variants are returned before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditCommit {
    /// Module fields updated and every authorship's approval cleared.
    Applied {
        /// The edited module.
        module_id: ModuleId,
        /// Number of authorship rows whose approval was cleared.
        authorships_reset: u64,
    },
    /// No module with the edit's id.
    ModuleMissing,
    /// The edit's module type does not exist.
    TypeMissing(ModuleTypeId),
    /// The edit's license does not exist.
    LicenseMissing(LicenseId),
}

/// Trait for module storage backends.
///
/// Implementations must return collections in the documented order.
/// All methods are async to support async database access.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Error type for store operations.
    type Error: StoreError;

    /// Fetch a module by id.
    async fn module_by_id(&self, id: ModuleId) -> Result<Option<Module>, Self::Error>;

    /// Fetch a module by DOI suffix.
    async fn module_by_suffix(&self, suffix: &Suffix) -> Result<Option<Module>, Self::Error>;

    /// Fetch the authorships of a module, ordered by rank then id.
    async fn authorships(&self, module: ModuleId) -> Result<Vec<Authorship>, Self::Error>;

    /// Fetch workspaces by id, ordered by id. Unknown ids are skipped.
    async fn workspaces(&self, ids: &[WorkspaceId]) -> Result<Vec<Workspace>, Self::Error>;

    /// Fetch a workspace by handle.
    async fn workspace_by_handle(&self, handle: &Handle) -> Result<Option<Workspace>, Self::Error>;

    /// Fetch the modules a module references, ordered by title then id.
    async fn references(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error>;

    /// Fetch the modules a module derives from, ordered by id.
    async fn parents(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error>;

    /// Fetch the modules derived from a module, ordered by id.
    async fn children(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error>;

    /// Fetch a module type.
    async fn module_type(&self, id: ModuleTypeId) -> Result<Option<ModuleType>, Self::Error>;

    /// Fetch a license.
    async fn license(&self, id: LicenseId) -> Result<Option<License>, Self::Error>;

    /// Apply an edit as one transaction.
    ///
    /// Verifies, in this order, that the module, its new type and its new
    /// license exist. The first missing row decides the outcome. Then it
    /// overwrites the mutable module fields and sets `ready_to_publish =
    /// false` on every authorship of the module. Either all of this becomes
    /// visible to subsequent reads or none of it does.
    async fn apply_edit(&self, edit: &ModuleEdit) -> Result<EditCommit, Self::Error>;

    /// Fetch the workspaces `workspace` follows, ordered by handle.
    async fn following(&self, workspace: WorkspaceId) -> Result<Vec<Workspace>, Self::Error>;

    /// Record that `follower` follows `followee`. Returns false if it already did.
    async fn follow(&self, follower: WorkspaceId, followee: WorkspaceId) -> Result<bool, Self::Error>;

    /// Remove a follow. Returns false if there was none.
    async fn unfollow(&self, follower: WorkspaceId, followee: WorkspaceId) -> Result<bool, Self::Error>;

    /// Apply profile settings to a workspace, returning the updated row.
    async fn update_profile(
        &self,
        workspace: WorkspaceId,
        update: &ProfileUpdate,
    ) -> Result<Option<Workspace>, Self::Error>;

    /// Insert module types, skipping any whose wikidata id already exists.
    /// Returns the number inserted.
    async fn insert_module_types(&self, types: &[NewModuleType]) -> Result<u64, Self::Error>;

    /// Insert licenses, skipping any whose name and url already exist.
    /// Returns the number inserted.
    async fn insert_licenses(&self, licenses: &[NewLicense]) -> Result<u64, Self::Error>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> bool {
        true
    }
}

/// A module type to be seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModuleType {
    /// Wikidata item id.
    pub wikidata: &'static str,
    /// Display name.
    pub name: &'static str,
}

/// A license to be seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLicense {
    /// License text url.
    pub url: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Price in cents.
    pub price: i32,
    /// Payment price id, for paid licenses.
    pub price_id: Option<&'static str>,
}

pub use memory::InMemoryModuleStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresModuleStore;
