//! Module records and the editable subset of their fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::lookup::{LicenseId, ModuleTypeId};

/// DOI prefix registered for modules published on the platform.
pub const DEFAULT_DOI_PREFIX: &str = "10.53962";

surrogate_id!(
    /// Identifier of a module row.
    ModuleId
);

/// DOI suffix of a module, unique across the platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Suffix(String);

impl Suffix {
    /// Wrap a suffix string.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self(suffix.into())
    }

    /// Borrow the suffix.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Suffix {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Suffix {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A research module, draft or published.
///
/// Identity fields (`id`, `prefix`, `suffix`) are never written by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Unique module identifier.
    pub id: ModuleId,
    /// DOI prefix.
    pub prefix: String,
    /// DOI suffix.
    pub suffix: Suffix,
    /// Title.
    pub title: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Display color, as a CSS color.
    pub display_color: Option<String>,
    /// Module type.
    pub type_id: ModuleTypeId,
    /// License, unset until chosen.
    pub license_id: Option<LicenseId>,
    /// Whether the module has been published.
    pub published: bool,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Where the module was published.
    pub published_where: Option<String>,
    /// External url.
    pub url: Option<String>,
}

impl Module {
    /// Create an unpublished module under the default DOI prefix.
    pub fn draft(
        id: ModuleId,
        suffix: impl Into<Suffix>,
        title: impl Into<String>,
        type_id: ModuleTypeId,
        license_id: Option<LicenseId>,
    ) -> Self {
        Self {
            id,
            prefix: DEFAULT_DOI_PREFIX.to_string(),
            suffix: suffix.into(),
            title: title.into(),
            description: None,
            display_color: None,
            type_id,
            license_id,
            published: false,
            published_at: None,
            published_where: None,
            url: None,
        }
    }

    /// Mark the module as published at `at` and derive its DOI url.
    pub fn publish(mut self, at: DateTime<Utc>) -> Self {
        self.published = true;
        self.published_at = Some(at);
        self.published_where = Some("ResearchEquals".to_string());
        self.url = Some(format!("https://doi.org/{}", self.doi()));
        self
    }

    /// Full DOI, `prefix/suffix`.
    pub fn doi(&self) -> String {
        format!("{}/{}", self.prefix, self.suffix)
    }

    /// Overwrite the mutable fields with those of `edit`.
    pub(crate) fn apply(&mut self, edit: &ModuleEdit) {
        self.type_id = edit.type_id;
        self.title = edit.title.clone();
        self.description = edit.description.clone();
        self.display_color = edit.display_color.clone();
        self.license_id = Some(edit.license_id);
    }
}

/// Editor-supplied replacement for a module's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEdit {
    /// Module being edited.
    #[serde(rename = "id")]
    pub module_id: ModuleId,
    /// New module type.
    pub type_id: ModuleTypeId,
    /// New title.
    pub title: String,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New license.
    pub license_id: LicenseId,
    /// New display color.
    #[serde(default)]
    pub display_color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doi_uses_prefix_and_suffix() {
        let module = Module::draft(ModuleId::new(1), "abcd-1234", "Title", ModuleTypeId::new(1), None);
        assert_eq!(module.doi(), "10.53962/abcd-1234");
    }

    #[test]
    fn test_published_sets_url() {
        let module = Module::draft(ModuleId::new(1), "abcd-1234", "Title", ModuleTypeId::new(1), None)
            .publish(Utc::now());
        assert!(module.published);
        assert_eq!(module.url.as_deref(), Some("https://doi.org/10.53962/abcd-1234"));
    }

    #[test]
    fn test_apply_leaves_identity_untouched() {
        let mut module = Module::draft(ModuleId::new(7), "keep-me", "Old", ModuleTypeId::new(1), Some(LicenseId::new(1)));
        module.apply(&ModuleEdit {
            module_id: ModuleId::new(7),
            type_id: ModuleTypeId::new(3),
            title: "New".to_string(),
            description: Some("text".to_string()),
            license_id: LicenseId::new(2),
            display_color: Some("#574cfa".to_string()),
        });

        assert_eq!(module.id, ModuleId::new(7));
        assert_eq!(module.suffix.as_str(), "keep-me");
        assert_eq!(module.title, "New");
        assert_eq!(module.license_id, Some(LicenseId::new(2)));
        assert_eq!(module.type_id, ModuleTypeId::new(3));
    }

    #[test]
    fn test_edit_payload_field_names() {
        let edit: ModuleEdit = serde_json::from_str(
            r##"{"id":4,"typeId":2,"title":"T","licenseId":1,"displayColor":"#fff"}"##,
        ).unwrap();
        assert_eq!(edit.module_id, ModuleId::new(4));
        assert_eq!(edit.description, None);
        assert_eq!(edit.display_color.as_deref(), Some("#fff"));
    }
}
