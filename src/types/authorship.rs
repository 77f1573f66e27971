//! Authorship join rows.

use serde::{Deserialize, Serialize};

use super::module::ModuleId;
use super::workspace::WorkspaceId;

surrogate_id!(
    /// Identifier of an authorship row.
    AuthorshipId
);

/// One workspace's role on one module.
///
/// `ready_to_publish` approves the module's *current* content; any edit of
/// the module clears it for every author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorship {
    /// Unique authorship identifier.
    pub id: AuthorshipId,
    /// Authored module.
    pub module_id: ModuleId,
    /// Author workspace.
    pub workspace_id: WorkspaceId,
    /// Position in the author list, lowest first.
    pub authorship_rank: i32,
    /// Whether this author approved publication.
    pub ready_to_publish: bool,
    /// Whether the author accepted the invitation.
    pub accepted_invitation: bool,
}

impl Authorship {
    /// Create an accepted, not-yet-approved authorship.
    pub fn new(id: AuthorshipId, module_id: ModuleId, workspace_id: WorkspaceId, rank: i32) -> Self {
        Self {
            id,
            module_id,
            workspace_id,
            authorship_rank: rank,
            ready_to_publish: false,
            accepted_invitation: true,
        }
    }

    /// Set the approval flag.
    pub fn approved(mut self, ready: bool) -> Self {
        self.ready_to_publish = ready;
        self
    }

    /// Ordering key used by every read path: rank, then id.
    pub fn order_key(&self) -> (i32, AuthorshipId) {
        (self.authorship_rank, self.id)
    }
}
