//! Lookup entities referenced by modules. Immutable once seeded.

use serde::{Deserialize, Serialize};

surrogate_id!(
    /// Identifier of a module type row.
    ModuleTypeId
);

surrogate_id!(
    /// Identifier of a license row.
    LicenseId
);

/// Kind of research output, keyed to a Wikidata concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleType {
    /// Unique module type identifier.
    pub id: ModuleTypeId,
    /// Display name.
    pub name: String,
    /// Wikidata item id.
    pub wikidata: String,
}

/// License a module is published under, with its publication price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// Unique license identifier.
    pub id: LicenseId,
    /// Display name.
    pub name: String,
    /// License text url.
    pub url: String,
    /// Price in euro cents.
    pub price: i32,
    /// Payment price id, for paid licenses.
    #[serde(rename = "price_id")]
    pub price_id: Option<String>,
}

impl License {
    /// True when publishing under this license costs nothing.
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}
