//! Follow/unfollow derivation for a module's author list.
//!
//! Pure functions over already-loaded rows: a viewer sees, per author,
//! either a follow action, an unfollow action, or nothing (anonymous
//! viewers and the viewer's own entry).

use serde::{Deserialize, Serialize};

use crate::types::{AuthorView, Handle, ModuleWithAuthors, Workspace};

/// Action offered next to an author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    /// Viewer does not follow the author yet.
    Follow,
    /// Viewer already follows the author.
    Unfollow,
    /// No action: anonymous viewer, or the author is the viewer.
    None,
}

/// The signed-in workspace looking at an author list, with its follows.
#[derive(Debug, Clone)]
pub struct Viewer {
    /// The viewing workspace.
    pub workspace: Workspace,
    /// Workspaces the viewer follows.
    pub following: Vec<Workspace>,
}

impl Viewer {
    /// Create a viewer from its workspace and the workspaces it follows.
    pub fn new(workspace: Workspace, following: Vec<Workspace>) -> Self {
        Self { workspace, following }
    }
}

/// True when `author`'s handle is among the handles in `following`.
pub fn is_following(following: &[Workspace], author: &Workspace) -> bool {
    following.iter().any(|w| w.handle == author.handle)
}

/// Decide which action to offer `viewer` for `author`.
pub fn follow_action(viewer: Option<&Viewer>, author: &Workspace) -> FollowAction {
    let Some(viewer) = viewer else {
        return FollowAction::None;
    };
    if viewer.workspace.handle == author.handle {
        FollowAction::None
    } else if is_following(&viewer.following, author) {
        FollowAction::Unfollow
    } else {
        FollowAction::Follow
    }
}

/// One row of the author side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorEntry {
    /// Author handle.
    pub handle: Handle,
    /// Name shown in the panel.
    pub display_name: String,
    /// Avatar url.
    pub avatar: Option<String>,
    /// Action offered to the viewer.
    pub action: FollowAction,
}

/// The author side panel of a module, in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorPanel {
    /// One entry per author, in author order.
    pub entries: Vec<AuthorEntry>,
}

impl AuthorPanel {
    /// Build the panel for `viewer` over a module's authors.
    pub fn build(module: &ModuleWithAuthors, viewer: Option<&Viewer>) -> Self {
        Self::from_authors(&module.authors, viewer)
    }

    /// Build the panel from an author list already in display order.
    pub fn from_authors(authors: &[AuthorView], viewer: Option<&Viewer>) -> Self {
        let entries = authors
            .iter()
            .map(|author| AuthorEntry {
                handle: author.workspace.handle.clone(),
                display_name: author.workspace.display_name(),
                avatar: author.workspace.avatar.clone(),
                action: follow_action(viewer, &author.workspace),
            })
            .collect();
        Self { entries }
    }

    /// Action offered for `handle`, if that handle is on the panel.
    pub fn action_for(&self, handle: &str) -> Option<FollowAction> {
        self.entries
            .iter()
            .find(|e| e.handle.as_str() == handle)
            .map(|e| e.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkspaceId;

    fn ws(id: i32, handle: &str) -> Workspace {
        Workspace::new(WorkspaceId::new(id), handle)
    }

    #[test]
    fn test_follow_derivation() {
        let viewer = Viewer::new(ws(10, "w"), vec![ws(1, "a"), ws(2, "b")]);

        assert!(is_following(&viewer.following, &ws(1, "a")));
        assert!(!is_following(&viewer.following, &ws(3, "c")));

        assert_eq!(follow_action(Some(&viewer), &ws(1, "a")), FollowAction::Unfollow);
        assert_eq!(follow_action(Some(&viewer), &ws(3, "c")), FollowAction::Follow);
        assert_eq!(follow_action(Some(&viewer), &ws(10, "w")), FollowAction::None);
    }

    #[test]
    fn test_anonymous_viewer_gets_no_actions() {
        assert_eq!(follow_action(None, &ws(1, "a")), FollowAction::None);
    }

    #[test]
    fn test_handle_match_is_exact() {
        let viewer = Viewer::new(ws(10, "w"), vec![ws(1, "Alice")]);
        assert_eq!(follow_action(Some(&viewer), &ws(2, "alice")), FollowAction::Follow);
        assert_eq!(follow_action(Some(&viewer), &ws(3, "W")), FollowAction::Follow);
    }

    #[test]
    fn test_following_self_still_suppressed() {
        // A viewer who somehow follows itself is still offered nothing.
        let viewer = Viewer::new(ws(10, "w"), vec![ws(10, "w")]);
        assert_eq!(follow_action(Some(&viewer), &ws(10, "w")), FollowAction::None);
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FollowAction::Unfollow).unwrap(), "\"unfollow\"");
    }
}
