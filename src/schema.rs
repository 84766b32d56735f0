//! Output types: the canonical record and the extraction envelope.

use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{FieldSchema, FieldSpec};
use crate::projectors::NormalizedView;
use crate::raw::{RawSections, Table};

/// A canonical field value: a string, or a nested group of strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    Text(String),
    Group(IndexMap<String, String>),
}

impl CanonicalValue {
    /// Empty string, or a group without any non-empty sub-value.
    pub fn is_missing(&self) -> bool {
        match self {
            CanonicalValue::Text(s) => s.is_empty(),
            CanonicalValue::Group(g) => g.values().all(|v| v.is_empty()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CanonicalValue::Text(s) => Some(s),
            CanonicalValue::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&IndexMap<String, String>> {
        match self {
            CanonicalValue::Group(g) => Some(g),
            CanonicalValue::Text(_) => None,
        }
    }
}

/// Canonical field -> value, in schema order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: IndexMap<String, CanonicalValue>,
}

impl CanonicalRecord {
    /// A record with every scalar field `""` and every group empty.
    pub fn empty_for(schema: &FieldSchema) -> Self {
        let fields = schema
            .iter()
            .map(|(name, spec)| {
                let value = match spec {
                    FieldSpec::Aliases(_) => CanonicalValue::Text(String::new()),
                    FieldSpec::Group(_) => CanonicalValue::Group(IndexMap::new()),
                };
                (name.clone(), value)
            })
            .collect();
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&CanonicalValue> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CanonicalValue> {
        self.fields.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: CanonicalValue) {
        self.fields.insert(name.into(), value);
    }

    /// Scalar value of a field, if it is a scalar.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(CanonicalValue::as_text)
    }

    /// Sub-value of a group field.
    pub fn group_value(&self, group: &str, sub: &str) -> Option<&str> {
        self.get(group)
            .and_then(CanonicalValue::as_group)
            .and_then(|g| g.get(sub))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CanonicalValue)> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut CanonicalValue)> {
        self.fields.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of fields whose value is missing, in schema order.
    pub fn missing_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_missing())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Full result for one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub id: String,
    pub source_file: String,
    pub content_hash: String,
    pub extractor_version: String,
    pub total_pages: u32,
    pub mapped_fields: CanonicalRecord,
    pub raw_data: RawSections,
    pub tables: Vec<Table>,
    pub full_text: String,
    pub normalized: NormalizedView,
}

impl Extraction {
    pub fn new(source_file: String, content_hash: String) -> Self {
        Self {
            id: format!("ext_{}", Uuid::new_v4().simple()),
            source_file,
            content_hash,
            extractor_version: env!("CARGO_PKG_VERSION").to_string(),
            total_pages: 0,
            mapped_fields: CanonicalRecord::default(),
            raw_data: RawSections::default(),
            tables: Vec::new(),
            full_text: String::new(),
            normalized: NormalizedView::default(),
        }
    }
}
