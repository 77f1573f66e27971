//! Module read models.
//!
//! The reader assembles a module and its related rows into the shapes in
//! [`crate::types::view`]. It never writes, and it reads only committed
//! state, so a read issued after a successful edit observes that edit.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::lookup::LookupCache;
use crate::store::ModuleStore;
use crate::types::{
    AuthorView, Module, ModuleDetail, ModuleId, ModuleWithAuthors, ReferencedModule,
    RelatedModule, Suffix,
};

/// Error type for reader operations.
///
/// A module that does not exist is not an error; lookups return `None`.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Store error.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl ReaderError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::StoreError(e.to_string())
    }
}

/// Read path over a module store.
pub struct ModuleReader<S: ModuleStore> {
    store: Arc<S>,
    lookups: LookupCache,
}

impl<S: ModuleStore> Clone for ModuleReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lookups: self.lookups.clone(),
        }
    }
}

impl<S: ModuleStore + 'static> ModuleReader<S> {
    /// Create a reader with a default-sized lookup cache.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_cache(store, LookupCache::default())
    }

    /// Create a reader sharing an existing lookup cache.
    pub fn with_cache(store: Arc<S>, lookups: LookupCache) -> Self {
        Self { store, lookups }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_handle(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Get the lookup cache.
    pub fn lookups(&self) -> &LookupCache {
        &self.lookups
    }

    /// Find a module by DOI suffix, with its authors in rank order.
    pub async fn by_suffix(&self, suffix: &Suffix) -> Result<Option<ModuleWithAuthors>, ReaderError> {
        let module = self.store.module_by_suffix(suffix).await
            .map_err(ReaderError::from_store)?;
        match module {
            Some(module) => Ok(Some(self.with_authors(module).await?)),
            None => Ok(None),
        }
    }

    /// Find a module by id, with its authors in rank order.
    pub async fn by_id(&self, id: ModuleId) -> Result<Option<ModuleWithAuthors>, ReaderError> {
        let module = self.store.module_by_id(id).await
            .map_err(ReaderError::from_store)?;
        match module {
            Some(module) => Ok(Some(self.with_authors(module).await?)),
            None => Ok(None),
        }
    }

    /// Assemble the full detail view of a module by id.
    pub async fn detail_by_id(&self, id: ModuleId) -> Result<Option<ModuleDetail>, ReaderError> {
        let module = self.store.module_by_id(id).await
            .map_err(ReaderError::from_store)?;
        match module {
            Some(module) => Ok(Some(self.detail(module).await?)),
            None => Ok(None),
        }
    }

    /// Assemble the full detail view of a module by DOI suffix.
    pub async fn detail_by_suffix(&self, suffix: &Suffix) -> Result<Option<ModuleDetail>, ReaderError> {
        let module = self.store.module_by_suffix(suffix).await
            .map_err(ReaderError::from_store)?;
        match module {
            Some(module) => Ok(Some(self.detail(module).await?)),
            None => Ok(None),
        }
    }

    async fn with_authors(&self, module: Module) -> Result<ModuleWithAuthors, ReaderError> {
        let authors = self.authors(module.id).await?;
        Ok(ModuleWithAuthors { module, authors })
    }

    async fn detail(&self, module: Module) -> Result<ModuleDetail, ReaderError> {
        let store = self.store.as_ref();

        let module_type = self.lookups.module_type(store, module.type_id).await
            .map_err(ReaderError::from_store)?;
        let license = match module.license_id {
            Some(id) => self.lookups.license(store, id).await
                .map_err(ReaderError::from_store)?,
            None => None,
        };
        let authors = self.authors(module.id).await?;

        let mut references = Vec::new();
        for cited in store.references(module.id).await.map_err(ReaderError::from_store)? {
            let authors = self.authors(cited.id).await?;
            references.push(ReferencedModule { module: cited, authors });
        }

        let parents = self.related(store.parents(module.id).await
            .map_err(ReaderError::from_store)?).await?;
        let children = self.related(store.children(module.id).await
            .map_err(ReaderError::from_store)?).await?;

        Ok(ModuleDetail {
            module,
            module_type,
            license,
            authors,
            references,
            parents,
            children,
        })
    }

    async fn related(&self, modules: Vec<Module>) -> Result<Vec<RelatedModule>, ReaderError> {
        let mut related = Vec::with_capacity(modules.len());
        for module in modules {
            let module_type = self.lookups.module_type(self.store.as_ref(), module.type_id).await
                .map_err(ReaderError::from_store)?;
            let authors = self.authors(module.id).await?;
            related.push(RelatedModule { module, module_type, authors });
        }
        Ok(related)
    }

    /// Authors of a module in rank order, joined with their workspaces.
    ///
    /// Authorships whose workspace no longer resolves are dropped.
    async fn authors(&self, module: ModuleId) -> Result<Vec<AuthorView>, ReaderError> {
        let mut rows = self.store.authorships(module).await
            .map_err(ReaderError::from_store)?;
        rows.sort_by_key(|a| a.order_key());

        let ids: Vec<_> = rows.iter().map(|a| a.workspace_id).collect();
        let workspaces: BTreeMap<_, _> = self.store.workspaces(&ids).await
            .map_err(ReaderError::from_store)?
            .into_iter()
            .map(|w| (w.id, w))
            .collect();

        Ok(rows.iter()
            .filter_map(|a| {
                workspaces.get(&a.workspace_id)
                    .map(|w| AuthorView::new(a, w.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryModuleStore;
    use crate::types::{
        Authorship, AuthorshipId, License, LicenseId, ModuleType, ModuleTypeId, Workspace,
        WorkspaceId,
    };

    fn build_store() -> Arc<InMemoryModuleStore> {
        let mut store = InMemoryModuleStore::new();
        store.add_module_type(ModuleType { id: ModuleTypeId::new(1), name: "Idea".into(), wikidata: "Q131841".into() });
        store.add_module_type(ModuleType { id: ModuleTypeId::new(2), name: "Plan".into(), wikidata: "Q1371819".into() });
        store.add_license(License {
            id: LicenseId::new(1),
            name: "CC0 Public Domain Dedication".into(),
            url: "https://creativecommons.org/publicdomain/zero/1.0/legalcode".into(),
            price: 0,
            price_id: None,
        });

        for (id, handle) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            store.add_workspace(Workspace::new(WorkspaceId::new(id), handle));
        }

        store.add_module(Module::draft(ModuleId::new(1), "main-0001", "Main", ModuleTypeId::new(2), Some(LicenseId::new(1))));
        store.add_module(Module::draft(ModuleId::new(2), "zeta-0002", "Zeta", ModuleTypeId::new(1), None));
        store.add_module(Module::draft(ModuleId::new(3), "alfa-0003", "Alpha", ModuleTypeId::new(1), None));
        store.add_module(Module::draft(ModuleId::new(4), "kid-0004", "Child", ModuleTypeId::new(1), None));

        store.add_authorship(Authorship::new(AuthorshipId::new(1), ModuleId::new(1), WorkspaceId::new(3), 2));
        store.add_authorship(Authorship::new(AuthorshipId::new(2), ModuleId::new(1), WorkspaceId::new(1), 0));
        store.add_authorship(Authorship::new(AuthorshipId::new(3), ModuleId::new(1), WorkspaceId::new(2), 1));
        store.add_authorship(Authorship::new(AuthorshipId::new(4), ModuleId::new(2), WorkspaceId::new(2), 0));

        store.add_reference(ModuleId::new(1), ModuleId::new(2));
        store.add_reference(ModuleId::new(1), ModuleId::new(3));
        store.add_derivation(ModuleId::new(3), ModuleId::new(1));
        store.add_derivation(ModuleId::new(1), ModuleId::new(4));

        Arc::new(store)
    }

    #[tokio::test]
    async fn test_by_suffix_orders_authors_by_rank() {
        let reader = ModuleReader::new(build_store());
        let found = reader.by_suffix(&Suffix::new("main-0001")).await.unwrap().unwrap();

        let handles: Vec<_> = found.authors.iter().map(|a| a.workspace.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_missing_module_is_none() {
        let reader = ModuleReader::new(build_store());
        assert!(reader.by_suffix(&Suffix::new("nope")).await.unwrap().is_none());
        assert!(reader.detail_by_id(ModuleId::new(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_detail_assembles_graph() {
        let reader = ModuleReader::new(build_store());
        let detail = reader.detail_by_id(ModuleId::new(1)).await.unwrap().unwrap();

        assert_eq!(detail.module_type.as_ref().unwrap().name, "Plan");
        assert_eq!(detail.license.as_ref().unwrap().id, LicenseId::new(1));

        let titles: Vec<_> = detail.references.iter().map(|r| r.module.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Zeta"]);
        assert_eq!(detail.references[1].authors[0].workspace.handle.as_str(), "bob");

        assert_eq!(detail.parents.len(), 1);
        assert_eq!(detail.parents[0].module.id, ModuleId::new(3));
        assert_eq!(detail.parents[0].module_type.as_ref().unwrap().name, "Idea");
        assert_eq!(detail.children[0].module.id, ModuleId::new(4));
    }

    #[tokio::test]
    async fn test_detail_by_suffix_matches_by_id() {
        let reader = ModuleReader::new(build_store());
        let a = reader.detail_by_id(ModuleId::new(1)).await.unwrap();
        let b = reader.detail_by_suffix(&Suffix::new("main-0001")).await.unwrap();
        assert_eq!(a, b);
    }
}
