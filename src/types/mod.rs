//! Core types for modules, authorships and workspaces.

/// Declares an integer surrogate key newtype.
///
/// Keys are `Ord` so every collection keyed by them iterates deterministically.
macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw database id.
            pub const fn new(raw: i32) -> Self {
                Self(raw)
            }

            /// Get the raw database id.
            pub const fn get(&self) -> i32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(raw: i32) -> Self {
                Self(raw)
            }
        }
    };
}

pub mod module;
pub mod authorship;
pub mod workspace;
pub mod lookup;
pub mod view;

pub use module::{ModuleId, Suffix, Module, ModuleEdit, DEFAULT_DOI_PREFIX};
pub use authorship::{AuthorshipId, Authorship};
pub use workspace::{WorkspaceId, Handle, Workspace, Principal, ProfileUpdate};
pub use lookup::{ModuleTypeId, LicenseId, ModuleType, License};
pub use view::{AuthorView, ModuleWithAuthors, ModuleDetail, ReferencedModule, RelatedModule};
