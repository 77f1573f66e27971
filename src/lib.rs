//! # research-modules
//!
//! Editing and reading of research modules: small, individually citable
//! research outputs, each with a DOI, a type, a license and an ordered list
//! of authors.
//!
//! ## Core Contract
//!
//! 1. Editing a module replaces its mutable fields and, in the same
//!    transaction, clears every author's publish approval
//! 2. A failed edit changes nothing
//! 3. A successful edit returns the module as committed, with its full
//!    author, reference and lineage graph
//!
//! ## Architecture
//!
//! ```text
//! ModuleEdit → ModuleEditor ─→ ModuleStore::apply_edit (one transaction)
//!                  │                    ↑
//!                  └→ ModuleReader ─────┘ (rehydrate, LookupCache)
//!                  └→ SearchIndex (published modules only)
//! ```
//!
//! ## Ordering Guarantees
//!
//! - Authors are ordered by rank ascending, ties by authorship id
//! - References are ordered by title ascending
//! - Follow lists are ordered by handle

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod store;
pub mod lookup;
pub mod reader;
pub mod editor;
pub mod social;
pub mod profile;
pub mod seed;
pub mod index;
pub mod canonical;
pub mod config;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    Authorship, AuthorshipId, Handle, License, LicenseId, Module, ModuleEdit, ModuleId,
    ModuleType, ModuleTypeId, Principal, ProfileUpdate, Suffix, Workspace, WorkspaceId,
};
pub use types::{AuthorView, ModuleDetail, ModuleWithAuthors, ReferencedModule, RelatedModule};
pub use store::{EditCommit, InMemoryModuleStore, ModuleStore, StoreError};
#[cfg(feature = "postgres")]
pub use store::PostgresModuleStore;
pub use lookup::{CacheStats, LookupCache};
pub use reader::{ModuleReader, ReaderError};
pub use editor::{EditError, EditOutcome, EditPolicy, ModuleEditor, ReferenceKind};
pub use social::{follow_action, is_following, AuthorEntry, AuthorPanel, FollowAction, Viewer};
pub use profile::{ProfileError, ProfileService};
pub use seed::{seed, SeedEnvironment, SeedError, SeedReport};
pub use index::{InMemorySearchIndex, IndexError, IndexWrite, ModuleDocument, SearchIndex};
pub use config::KernelConfig;

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};
