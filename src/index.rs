//! Search index contract.
//!
//! Published modules are mirrored into an external search index. The
//! editor pushes a [`ModuleDocument`] after each committed edit of a
//! published module; the index is eventually consistent with the store and
//! its failures never roll back an edit.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::types::{ModuleDetail, ModuleId};

/// Error type for index operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IndexError {
    /// The index could not be reached.
    #[error("Search index unavailable: {0}")]
    Unavailable(String),
    /// The document could not be serialized.
    #[error("Document serialization failed: {0}")]
    Serialization(String),
}

/// Searchable projection of a published module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDocument {
    /// Module id, used as the document key.
    #[serde(rename = "objectID")]
    pub object_id: ModuleId,
    /// Full DOI.
    pub doi: String,
    /// DOI suffix.
    pub suffix: String,
    /// License url.
    pub license: Option<String>,
    /// Module type name.
    #[serde(rename = "type")]
    pub module_type: Option<String>,
    /// Module title; indexed as `name` for better ranking.
    pub name: String,
    /// Module description.
    pub description: Option<String>,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
}

impl ModuleDocument {
    /// Project a module detail view into a search document.
    pub fn from_detail(detail: &ModuleDetail) -> Self {
        let module = &detail.module;
        Self {
            object_id: module.id,
            doi: module.doi(),
            suffix: module.suffix.to_string(),
            license: detail.license.as_ref().map(|l| l.url.clone()),
            module_type: detail.module_type.as_ref().map(|t| t.name.clone()),
            name: module.title.clone(),
            description: module.description.clone(),
            published_at: module.published_at,
        }
    }

    /// Content fingerprint of the document.
    pub fn fingerprint(&self) -> Result<String, IndexError> {
        canonical_hash_hex(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWrite {
    /// The document was new or changed and was written.
    Written,
    /// The index already held identical content.
    Unchanged,
}

/// A search index holding module documents.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for its module.
    async fn upsert_module(&self, document: ModuleDocument) -> Result<IndexWrite, IndexError>;
}

/// In-memory search index for testing.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<BTreeMap<ModuleId, (String, ModuleDocument)>>,
    unavailable: AtomicBool,
}

impl InMemorySearchIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upsert fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Get the stored document for a module.
    pub fn document(&self, id: ModuleId) -> Option<ModuleDocument> {
        self.documents.read().get(&id).map(|(_, doc)| doc.clone())
    }

    /// Get number of documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert_module(&self, document: ModuleDocument) -> Result<IndexWrite, IndexError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("index marked unavailable".to_string()));
        }

        let fingerprint = document.fingerprint()?;
        let mut documents = self.documents.write();
        if documents.get(&document.object_id).is_some_and(|(fp, _)| fp == &fingerprint) {
            return Ok(IndexWrite::Unchanged);
        }
        documents.insert(document.object_id, (fingerprint, document));
        Ok(IndexWrite::Written)
    }
}
