//! Read models assembled by the module reader.
//!
//! These are the shapes handed to callers after a lookup or an edit. They
//! are assembled from store rows in a separate step from any write, so a
//! write's atomicity never depends on how much related data is rendered.

use serde::{Deserialize, Serialize};

use super::authorship::{Authorship, AuthorshipId};
use super::lookup::{License, ModuleType};
use super::module::Module;
use super::workspace::Workspace;

/// An authorship together with the workspace it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    /// Authorship identifier.
    pub id: AuthorshipId,
    /// Position in the author list.
    pub authorship_rank: i32,
    /// Whether this author approved publication.
    pub ready_to_publish: bool,
    /// Whether the author accepted the invitation.
    pub accepted_invitation: bool,
    /// Author workspace.
    pub workspace: Workspace,
}

impl AuthorView {
    /// Join an authorship row with its workspace.
    pub fn new(authorship: &Authorship, workspace: Workspace) -> Self {
        Self {
            id: authorship.id,
            authorship_rank: authorship.authorship_rank,
            ready_to_publish: authorship.ready_to_publish,
            accepted_invitation: authorship.accepted_invitation,
            workspace,
        }
    }
}

/// A module with its direct authors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleWithAuthors {
    /// The module.
    #[serde(flatten)]
    pub module: Module,
    /// Authors in (rank, id) order.
    pub authors: Vec<AuthorView>,
}

/// A module cited by another module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencedModule {
    /// The cited module.
    #[serde(flatten)]
    pub module: Module,
    /// Its authors in (rank, id) order.
    pub authors: Vec<AuthorView>,
}

/// A parent or child in a module's derivation lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedModule {
    /// The related module.
    #[serde(flatten)]
    pub module: Module,
    /// Its module type.
    #[serde(rename = "type")]
    pub module_type: Option<ModuleType>,
    /// Its authors in (rank, id) order.
    pub authors: Vec<AuthorView>,
}

/// A module with its full author, reference and lineage graph.
///
/// `authors` is ordered by rank ascending and `references` by title
/// ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDetail {
    /// The module.
    #[serde(flatten)]
    pub module: Module,
    /// Module type, if it still exists.
    #[serde(rename = "type")]
    pub module_type: Option<ModuleType>,
    /// License, if set.
    pub license: Option<License>,
    /// Authors in (rank, id) order.
    pub authors: Vec<AuthorView>,
    /// Cited modules, ordered by title.
    pub references: Vec<ReferencedModule>,
    /// Modules this one derives from.
    pub parents: Vec<RelatedModule>,
    /// Modules derived from this one.
    pub children: Vec<RelatedModule>,
}

impl ModuleDetail {
    /// True when every author has approved the current content.
    ///
    /// A module without authors is never ready.
    pub fn all_authors_ready(&self) -> bool {
        !self.authors.is_empty() && self.authors.iter().all(|a| a.ready_to_publish)
    }

    /// Authors who still have to approve the current content.
    pub fn pending_approvals(&self) -> Vec<&AuthorView> {
        self.authors.iter().filter(|a| !a.ready_to_publish).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorshipId, ModuleId, ModuleTypeId, WorkspaceId};

    fn author(id: i32, ready: bool) -> AuthorView {
        let row = Authorship::new(AuthorshipId::new(id), ModuleId::new(1), WorkspaceId::new(id), id)
            .approved(ready);
        AuthorView::new(&row, Workspace::new(WorkspaceId::new(id), format!("ws{}", id)))
    }

    fn detail(authors: Vec<AuthorView>) -> ModuleDetail {
        ModuleDetail {
            module: Module::draft(ModuleId::new(1), "s", "T", ModuleTypeId::new(1), None),
            module_type: None,
            license: None,
            authors,
            references: vec![],
            parents: vec![],
            children: vec![],
        }
    }

    #[test]
    fn test_all_authors_ready() {
        assert!(detail(vec![author(1, true), author(2, true)]).all_authors_ready());
        assert!(!detail(vec![author(1, true), author(2, false)]).all_authors_ready());
        assert!(!detail(vec![]).all_authors_ready());
    }

    #[test]
    fn test_pending_approvals() {
        let d = detail(vec![author(1, true), author(2, false)]);
        let pending = d.pending_approvals();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].workspace.handle.as_str(), "ws2");
    }

    #[test]
    fn test_serializes_flat_module_fields() {
        let json = serde_json::to_value(detail(vec![author(1, false)])).unwrap();
        assert_eq!(json["title"], "T");
        assert_eq!(json["authors"][0]["readyToPublish"], false);
        assert!(json.get("type").is_some());
    }
}
