//! Cache for module type and license rows.
//!
//! Lookup rows are immutable once seeded, so entries never need
//! invalidation. Misses fall through to the store; absent rows are not
//! cached, so a row seeded later is still found.
//!
//! Edits never consult this cache: reference validation happens inside the
//! store's edit transaction.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::store::ModuleStore;
use crate::types::{License, LicenseId, ModuleType, ModuleTypeId};

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => unreachable!(),
};

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the store.
    pub misses: u64,
}

#[derive(Debug)]
struct Inner {
    types: LruCache<ModuleTypeId, ModuleType>,
    licenses: LruCache<LicenseId, License>,
    stats: CacheStats,
}

/// LRU cache of lookup rows, shared between readers.
#[derive(Debug, Clone)]
pub struct LookupCache {
    inner: Arc<Mutex<Inner>>,
}

impl LookupCache {
    /// Create a cache holding up to `capacity` rows of each kind.
    pub fn new(capacity: usize) -> Self {
        let size = NonZeroUsize::new(capacity).unwrap_or(FALLBACK_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                types: LruCache::new(size),
                licenses: LruCache::new(size),
                stats: CacheStats::default(),
            })),
        }
    }

    /// Fetch a module type, consulting the store on a miss.
    pub async fn module_type<S: ModuleStore>(
        &self,
        store: &S,
        id: ModuleTypeId,
    ) -> Result<Option<ModuleType>, S::Error> {
        {
            let mut inner = self.inner.lock();
            if let Some(hit) = inner.types.get(&id).cloned() {
                inner.stats.hits += 1;
                return Ok(Some(hit));
            }
            inner.stats.misses += 1;
        }

        let fetched = store.module_type(id).await?;
        if let Some(ref row) = fetched {
            self.inner.lock().types.put(id, row.clone());
        }
        Ok(fetched)
    }

    /// Fetch a license, consulting the store on a miss.
    pub async fn license<S: ModuleStore>(
        &self,
        store: &S,
        id: LicenseId,
    ) -> Result<Option<License>, S::Error> {
        {
            let mut inner = self.inner.lock();
            if let Some(hit) = inner.licenses.get(&id).cloned() {
                inner.stats.hits += 1;
                return Ok(Some(hit));
            }
            inner.stats.misses += 1;
        }

        let fetched = store.license(id).await?;
        if let Some(ref row) = fetched {
            self.inner.lock().licenses.put(id, row.clone());
        }
        Ok(fetched)
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(256)
    }
}
