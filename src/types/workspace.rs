//! Workspace identities and the authenticated caller.

use serde::{Deserialize, Serialize};
use std::fmt;

surrogate_id!(
    /// Identifier of a workspace row.
    WorkspaceId
);

/// Public handle of a workspace.
///
/// Compared exactly: no case folding, no trimming.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Wrap a handle string.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A person or group acting on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Unique workspace identifier.
    pub id: WorkspaceId,
    /// Public handle.
    pub handle: Handle,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Avatar url.
    pub avatar: Option<String>,
    /// Short biography.
    pub bio: Option<String>,
    /// Pronouns.
    pub pronouns: Option<String>,
    /// Personal url.
    pub url: Option<String>,
    /// ORCID iD.
    pub orcid: Option<String>,
}

impl Workspace {
    /// Create a workspace with only a handle set.
    pub fn new(id: WorkspaceId, handle: impl Into<String>) -> Self {
        Self {
            id,
            handle: Handle::new(handle),
            first_name: None,
            last_name: None,
            avatar: None,
            bio: None,
            pronouns: None,
            url: None,
            orcid: None,
        }
    }

    /// Set first and last name.
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    /// Name as shown next to the avatar; falls back to the handle.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.handle.to_string()
        } else {
            parts.join(" ")
        }
    }

    pub(crate) fn apply_profile(&mut self, update: &ProfileUpdate) {
        fn merge(field: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *field = if v.is_empty() { None } else { Some(v.clone()) };
            }
        }
        merge(&mut self.bio, &update.bio);
        merge(&mut self.pronouns, &update.pronouns);
        merge(&mut self.avatar, &update.avatar);
    }
}

/// Partial update of a workspace's profile settings.
///
/// `None` leaves a field unchanged, an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New bio.
    #[serde(default)]
    pub bio: Option<String>,
    /// New pronouns.
    #[serde(default)]
    pub pronouns: Option<String>,
    /// New avatar url.
    #[serde(default)]
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    /// True when the update would not touch any field.
    pub fn is_empty(&self) -> bool {
        self.bio.is_none() && self.pronouns.is_none() && self.avatar.is_none()
    }
}

/// The authenticated caller, as established by the authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Workspace the caller acts as.
    pub workspace_id: WorkspaceId,
}

impl Principal {
    /// Principal acting as `workspace_id`.
    pub fn new(workspace_id: WorkspaceId) -> Self {
        Self { workspace_id }
    }
}
