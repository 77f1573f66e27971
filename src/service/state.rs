//! Service state management.
//!
//! Wires one store into the reader, editor and profile services, sharing a
//! single lookup cache between the read path and edit rehydration.

use std::sync::Arc;

use crate::config::KernelConfig;
use crate::editor::ModuleEditor;
use crate::index::SearchIndex;
use crate::lookup::LookupCache;
use crate::profile::ProfileService;
use crate::reader::ModuleReader;
use crate::store::ModuleStore;

/// Shared service state.
pub struct ServiceState<S: ModuleStore + 'static> {
    /// The module store.
    pub store: Arc<S>,
    /// Read path.
    pub reader: ModuleReader<S>,
    /// Edit path.
    pub editor: Arc<ModuleEditor<S>>,
    /// Profile and follow operations.
    pub profiles: Arc<ProfileService<S>>,
    /// Configuration the state was built from.
    pub config: KernelConfig,
}

impl<S: ModuleStore + 'static> ServiceState<S> {
    /// Create state with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, KernelConfig::default())
    }

    /// Create state from an explicit configuration.
    pub fn with_config(store: S, config: KernelConfig) -> Self {
        Self::build(Arc::new(store), config, None)
    }

    /// Create state from environment variables.
    pub fn from_env(store: S) -> Self {
        Self::with_config(store, KernelConfig::from_env())
    }

    /// Rebuild the editor so committed edits of published modules are
    /// pushed to `index`.
    pub fn with_index(self, index: Arc<dyn SearchIndex>) -> Self {
        Self::build(self.store, self.config, Some(index))
    }

    fn build(store: Arc<S>, config: KernelConfig, index: Option<Arc<dyn SearchIndex>>) -> Self {
        let lookups = LookupCache::new(config.lookup_cache_entries);
        let reader = ModuleReader::with_cache(Arc::clone(&store), lookups);

        let mut editor = ModuleEditor::with_reader(reader.clone(), config.edit_policy);
        if let Some(index) = index {
            editor = editor.with_index(index);
        }

        Self {
            profiles: Arc::new(ProfileService::new(Arc::clone(&store))),
            editor: Arc::new(editor),
            reader,
            store,
            config,
        }
    }
}

impl<S: ModuleStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reader: self.reader.clone(),
            editor: Arc::clone(&self.editor),
            profiles: Arc::clone(&self.profiles),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::EditPolicy;
    use crate::store::InMemoryModuleStore;

    #[test]
    fn test_state_carries_policy_into_editor() {
        let config = KernelConfig {
            edit_policy: EditPolicy::strict(),
            ..KernelConfig::default()
        };
        let state = ServiceState::with_config(InMemoryModuleStore::new(), config);
        assert!(state.editor.policy().require_authorship);
        assert!(state.editor.policy().reject_published);
    }

    #[test]
    fn test_clone_shares_store() {
        let state = ServiceState::new(InMemoryModuleStore::new());
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.store, &cloned.store));
    }
}
