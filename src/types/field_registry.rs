use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::FieldId;

/// Form field type, as far as formulas care about it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Select,
    /// Values come from a hierarchical option tree.
    AdvancedSelect,
    #[serde(untagged)]
    Other(String),
}

/// One selectable option of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Catalog entry for a form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub id: FieldId,
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

impl FieldInfo {
    #[must_use]
    pub fn new(id: impl Into<FieldId>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn is_advanced_select(&self) -> bool {
        self.kind == FieldKind::AdvancedSelect
    }
}

/// Synchronous lookup into an already-loaded field catalog.
pub trait FieldCatalog {
    fn field(&self, id: &FieldId) -> Option<&FieldInfo>;

    /// Whether `id` names a known advanced-select field.
    fn is_advanced_select(&self, id: &FieldId) -> bool {
        self.field(id).is_some_and(FieldInfo::is_advanced_select)
    }

    /// Catalog label of `id`, falling back to the raw id.
    fn label_of(&self, id: &FieldId) -> String {
        self.field(id)
            .map_or_else(|| id.to_string(), |info| info.label.clone())
    }
}

/// In-memory [`FieldCatalog`] keyed by field id.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: HashMap<FieldId, FieldInfo>,
}

impl FieldRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field, replacing any previous entry with the same id.
    pub fn register(&mut self, info: FieldInfo) -> Option<FieldInfo> {
        self.fields.insert(info.id.clone(), info)
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, info: FieldInfo) -> Self {
        self.register(info);
        self
    }

    pub fn remove(&mut self, id: &FieldId) -> Option<FieldInfo> {
        self.fields.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FieldInfo> {
        self.fields.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.values()
    }
}

impl FieldCatalog for FieldRegistry {
    fn field(&self, id: &FieldId) -> Option<&FieldInfo> {
        self.fields.get(id)
    }
}

impl FromIterator<FieldInfo> for FieldRegistry {
    fn from_iter<I: IntoIterator<Item = FieldInfo>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|f| (f.id.clone(), f)).collect(),
        }
    }
}
