//! Workspace settings and follow mutations.
//!
//! Every operation acts on behalf of an explicit [`Principal`]: a caller
//! only ever changes its own workspace's profile and follow list.

use std::sync::Arc;

use crate::social::{AuthorPanel, Viewer};
use crate::store::ModuleStore;
use crate::types::{Handle, ModuleWithAuthors, Principal, ProfileUpdate, Workspace};

/// Error type for profile operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The caller's workspace or the target handle does not exist.
    #[error("Workspace not found: {0}")]
    NotFound(String),
    /// A workspace cannot follow itself.
    #[error("A workspace cannot follow itself")]
    SelfFollow,
    /// The update would not change anything.
    #[error("Profile update is empty")]
    EmptyUpdate,
    /// Store error.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl ProfileError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::StoreError(e.to_string())
    }
}

/// Profile and social-graph operations.
pub struct ProfileService<S: ModuleStore> {
    store: Arc<S>,
}

impl<S: ModuleStore + 'static> ProfileService<S> {
    /// Create a service over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Change the caller's bio, pronouns or avatar.
    pub async fn update(&self, principal: &Principal, update: ProfileUpdate) -> Result<Workspace, ProfileError> {
        if update.is_empty() {
            return Err(ProfileError::EmptyUpdate);
        }
        let workspace = self.store.update_profile(principal.workspace_id, &update).await
            .map_err(ProfileError::from_store)?
            .ok_or_else(|| ProfileError::NotFound(principal.workspace_id.to_string()))?;

        tracing::info!(workspace = %workspace.id, "Profile updated");
        Ok(workspace)
    }

    /// Follow the workspace with `handle`. Returns false if already followed.
    pub async fn follow(&self, principal: &Principal, handle: &Handle) -> Result<bool, ProfileError> {
        let caller = self.caller(principal).await?;
        let target = self.resolve(handle).await?;
        if target.id == caller.id {
            return Err(ProfileError::SelfFollow);
        }
        let changed = self.store.follow(principal.workspace_id, target.id).await
            .map_err(ProfileError::from_store)?;

        tracing::debug!(follower = %principal.workspace_id, followee = %target.handle, changed, "Follow");
        Ok(changed)
    }

    /// Unfollow the workspace with `handle`. Returns false if it was not followed.
    pub async fn unfollow(&self, principal: &Principal, handle: &Handle) -> Result<bool, ProfileError> {
        self.caller(principal).await?;
        let target = self.resolve(handle).await?;
        let changed = self.store.unfollow(principal.workspace_id, target.id).await
            .map_err(ProfileError::from_store)?;

        tracing::debug!(follower = %principal.workspace_id, followee = %target.handle, changed, "Unfollow");
        Ok(changed)
    }

    /// Load the caller as a [`Viewer`], with its follow list.
    ///
    /// Returns `None` when the principal's workspace does not exist.
    pub async fn viewer(&self, principal: &Principal) -> Result<Option<Viewer>, ProfileError> {
        let Some(workspace) = self.load(principal).await? else {
            return Ok(None);
        };
        let following = self.store.following(workspace.id).await
            .map_err(ProfileError::from_store)?;
        Ok(Some(Viewer::new(workspace, following)))
    }

    /// Build the author panel of `module` as seen by `principal`.
    pub async fn author_panel(
        &self,
        module: &ModuleWithAuthors,
        principal: Option<&Principal>,
    ) -> Result<AuthorPanel, ProfileError> {
        let viewer = match principal {
            Some(p) => self.viewer(p).await?,
            None => None,
        };
        Ok(AuthorPanel::build(module, viewer.as_ref()))
    }

    async fn load(&self, principal: &Principal) -> Result<Option<Workspace>, ProfileError> {
        Ok(self.store.workspaces(&[principal.workspace_id]).await
            .map_err(ProfileError::from_store)?
            .into_iter()
            .next())
    }

    async fn caller(&self, principal: &Principal) -> Result<Workspace, ProfileError> {
        self.load(principal).await?
            .ok_or_else(|| ProfileError::NotFound(principal.workspace_id.to_string()))
    }

    async fn resolve(&self, handle: &Handle) -> Result<Workspace, ProfileError> {
        self.store.workspace_by_handle(handle).await
            .map_err(ProfileError::from_store)?
            .ok_or_else(|| ProfileError::NotFound(handle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::FollowAction;
    use crate::store::InMemoryModuleStore;
    use crate::types::WorkspaceId;

    fn service() -> ProfileService<InMemoryModuleStore> {
        let mut store = InMemoryModuleStore::new();
        store.add_workspace(Workspace::new(WorkspaceId::new(1), "me"));
        store.add_workspace(Workspace::new(WorkspaceId::new(2), "other"));
        ProfileService::new(Arc::new(store))
    }

    fn me() -> Principal {
        Principal::new(WorkspaceId::new(1))
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = service();
        let updated = service.update(&me(), ProfileUpdate {
            pronouns: Some("they/them".to_string()),
            ..Default::default()
        }).await.unwrap();
        assert_eq!(updated.pronouns.as_deref(), Some("they/them"));

        let err = service.update(&me(), ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, ProfileError::EmptyUpdate));
    }

    #[tokio::test]
    async fn test_update_unknown_workspace() {
        let service = service();
        let err = service.update(&Principal::new(WorkspaceId::new(77)), ProfileUpdate {
            bio: Some("x".to_string()),
            ..Default::default()
        }).await.unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_follow_round_trip_changes_viewer() {
        let service = service();
        let other = Handle::new("other");

        assert!(service.follow(&me(), &other).await.unwrap());
        let viewer = service.viewer(&me()).await.unwrap().unwrap();
        assert_eq!(viewer.following.len(), 1);

        assert!(service.unfollow(&me(), &other).await.unwrap());
        let viewer = service.viewer(&me()).await.unwrap().unwrap();
        assert!(viewer.following.is_empty());
    }

    #[tokio::test]
    async fn test_cannot_follow_self_or_unknown() {
        let service = service();
        assert!(matches!(
            service.follow(&me(), &Handle::new("me")).await.unwrap_err(),
            ProfileError::SelfFollow
        ));
        assert!(matches!(
            service.follow(&me(), &Handle::new("ghost")).await.unwrap_err(),
            ProfileError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_caller_cannot_follow_or_unfollow() {
        let mut store = InMemoryModuleStore::new();
        store.add_workspace(Workspace::new(WorkspaceId::new(2), "other"));
        let store = Arc::new(store);
        let service = ProfileService::new(Arc::clone(&store));
        let ghost = Principal::new(WorkspaceId::new(77));
        let other = Handle::new("other");

        assert!(matches!(
            service.follow(&ghost, &other).await.unwrap_err(),
            ProfileError::NotFound(_)
        ));
        assert!(matches!(
            service.unfollow(&ghost, &other).await.unwrap_err(),
            ProfileError::NotFound(_)
        ));
        assert!(store.following(WorkspaceId::new(77)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_author_panel_for_anonymous_viewer() {
        let service = service();
        let module = ModuleWithAuthors {
            module: crate::types::Module::draft(
                crate::types::ModuleId::new(1),
                "s",
                "T",
                crate::types::ModuleTypeId::new(1),
                None,
            ),
            authors: vec![],
        };
        let panel = service.author_panel(&module, None).await.unwrap();
        assert!(panel.entries.is_empty());
        assert_eq!(panel.action_for("me"), None::<FollowAction>);
    }
}
