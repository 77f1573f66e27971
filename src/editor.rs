//! Module editor.
//!
//! Applies an edit to a module's mutable fields and revokes every author's
//! publish approval in the same transaction, then returns the rehydrated
//! module.
//!
//! ## Algorithm
//!
//! 1. Check the optional edit policy against the caller
//! 2. `ModuleStore::apply_edit` (validate lookups, update module, reset
//!    approvals), retrying the whole transaction on conflict
//! 3. Re-read the module through [`ModuleReader`]
//! 4. Hand published modules to the search index, if one is attached
//!
//! The approval reset is unconditional: every authorship of the module is
//! cleared on every successful edit, including authorships that were
//! already cleared and edits that change nothing.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::index::{ModuleDocument, SearchIndex};
use crate::reader::{ModuleReader, ReaderError};
use crate::store::{EditCommit, ModuleStore, StoreError};
use crate::types::{
    LicenseId, ModuleDetail, ModuleEdit, ModuleId, ModuleTypeId, Principal, WorkspaceId,
};

/// Which lookup row an edit referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// A module type.
    ModuleType(ModuleTypeId),
    /// A license.
    License(LicenseId),
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleType(id) => write!(f, "module type {}", id),
            Self::License(id) => write!(f, "license {}", id),
        }
    }
}

/// Error type for editor operations.
///
/// Every variant leaves the module and its authorships unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The edit names a module type or license that does not exist.
    #[error("Reference not found: {0}")]
    ReferenceNotFound(ReferenceKind),
    /// The module to edit does not exist.
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),
    /// Concurrent writes kept conflicting with this edit.
    #[error("Transaction conflict on module {module_id} after {attempts} attempts")]
    TransactionConflict {
        /// The module being edited.
        module_id: ModuleId,
        /// Number of attempts made.
        attempts: u32,
    },
    /// The caller may not edit this module.
    #[error("Workspace {workspace} is not an author of module {module_id}")]
    Unauthorized {
        /// The caller.
        workspace: WorkspaceId,
        /// The module being edited.
        module_id: ModuleId,
    },
    /// The module is published and the policy forbids editing it.
    #[error("Module {0} is published")]
    AlreadyPublished(ModuleId),
    /// Store error.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl EditError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::StoreError(e.to_string())
    }

    /// True for failures a caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransactionConflict { .. })
    }
}

impl From<ReaderError> for EditError {
    fn from(e: ReaderError) -> Self {
        match e {
            ReaderError::StoreError(msg) => Self::StoreError(msg),
        }
    }
}

/// Policy knobs for the editor.
///
/// Both checks are off by default; the platform has never enforced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPolicy {
    /// Retries after the first attempt when the store reports a conflict.
    pub max_conflict_retries: u32,
    /// Reject callers who are not authors of the module.
    pub require_authorship: bool,
    /// Reject edits of published modules.
    pub reject_published: bool,
}

impl Default for EditPolicy {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            require_authorship: false,
            reject_published: false,
        }
    }
}

impl EditPolicy {
    /// Policy with both optional checks enabled.
    pub fn strict() -> Self {
        Self {
            require_authorship: true,
            reject_published: true,
            ..Self::default()
        }
    }
}

/// A committed edit and what it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    /// The module as read back after the commit.
    pub detail: ModuleDetail,
    /// Authorship rows whose approval the commit cleared, including rows
    /// whose workspace no longer exists.
    pub authorships_reset: u64,
}

/// Applies module edits.
pub struct ModuleEditor<S: ModuleStore> {
    store: Arc<S>,
    reader: ModuleReader<S>,
    policy: EditPolicy,
    index: Option<Arc<dyn SearchIndex>>,
}

impl<S: ModuleStore + 'static> ModuleEditor<S> {
    /// Create an editor with the default policy and no search index.
    pub fn new(store: Arc<S>) -> Self {
        let reader = ModuleReader::new(Arc::clone(&store));
        Self::with_reader(reader, EditPolicy::default())
    }

    /// Create an editor that rehydrates through `reader`.
    pub fn with_reader(reader: ModuleReader<S>, policy: EditPolicy) -> Self {
        let store = reader.store_handle();
        Self {
            store,
            reader,
            policy,
            index: None,
        }
    }

    /// Attach a search index to notify about edits of published modules.
    pub fn with_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Get the policy.
    pub fn policy(&self) -> &EditPolicy {
        &self.policy
    }

    /// Get the reader used for rehydration.
    pub fn reader(&self) -> &ModuleReader<S> {
        &self.reader
    }

    /// Apply `edit` on behalf of `principal`.
    ///
    /// On success every authorship of the module has `ready_to_publish ==
    /// false` and the returned detail reflects the committed state. On
    /// failure nothing has changed.
    pub async fn edit(&self, principal: &Principal, edit: ModuleEdit) -> Result<ModuleDetail, EditError> {
        Ok(self.apply(principal, edit).await?.detail)
    }

    /// Like [`edit`](Self::edit), but also reports how many approvals the
    /// commit cleared.
    pub async fn apply(&self, principal: &Principal, edit: ModuleEdit) -> Result<EditOutcome, EditError> {
        let start = Instant::now();
        let module_id = edit.module_id;

        self.check_policy(principal, module_id).await?;

        let authorships_reset = self.commit_with_retry(&edit).await?;

        let detail = self.reader.detail_by_id(module_id).await?
            .ok_or(EditError::ModuleNotFound(module_id))?;

        tracing::info!(
            module_id = %module_id,
            workspace = %principal.workspace_id,
            authorships_reset = authorships_reset,
            latency_ms = start.elapsed().as_millis() as u64,
            "Module edited, author approvals cleared"
        );

        if detail.module.published {
            self.reindex(&detail).await;
        }

        Ok(EditOutcome { detail, authorships_reset })
    }

    async fn check_policy(&self, principal: &Principal, module_id: ModuleId) -> Result<(), EditError> {
        if !self.policy.require_authorship && !self.policy.reject_published {
            return Ok(());
        }

        let module = self.store.module_by_id(module_id).await
            .map_err(EditError::from_store)?
            .ok_or(EditError::ModuleNotFound(module_id))?;

        if self.policy.reject_published && module.published {
            return Err(EditError::AlreadyPublished(module_id));
        }

        if self.policy.require_authorship {
            let authorships = self.store.authorships(module_id).await
                .map_err(EditError::from_store)?;
            if !authorships.iter().any(|a| a.workspace_id == principal.workspace_id) {
                return Err(EditError::Unauthorized {
                    workspace: principal.workspace_id,
                    module_id,
                });
            }
        }

        Ok(())
    }

    async fn commit_with_retry(&self, edit: &ModuleEdit) -> Result<u64, EditError> {
        let max_attempts = self.policy.max_conflict_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.store.apply_edit(edit).await {
                Ok(EditCommit::Applied { authorships_reset, .. }) => return Ok(authorships_reset),
                Ok(EditCommit::ModuleMissing) => return Err(EditError::ModuleNotFound(edit.module_id)),
                Ok(EditCommit::TypeMissing(id)) => {
                    return Err(EditError::ReferenceNotFound(ReferenceKind::ModuleType(id)))
                }
                Ok(EditCommit::LicenseMissing(id)) => {
                    return Err(EditError::ReferenceNotFound(ReferenceKind::License(id)))
                }
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    tracing::debug!(
                        module_id = %edit.module_id,
                        attempt = attempt,
                        error = %e,
                        "Edit conflicted, retrying"
                    );
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        module_id = %edit.module_id,
                        attempts = attempt,
                        "Edit conflicted on every attempt"
                    );
                    return Err(EditError::TransactionConflict {
                        module_id: edit.module_id,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(EditError::from_store(e)),
            }
        }
    }

    async fn reindex(&self, detail: &ModuleDetail) {
        let Some(index) = &self.index else {
            return;
        };
        let document = ModuleDocument::from_detail(detail);
        if let Err(e) = index.upsert_module(document).await {
            // The edit is committed; the index catches up on the next sync.
            tracing::warn!(
                module_id = %detail.module.id,
                error = %e,
                "Search index update failed"
            );
        }
    }
}
