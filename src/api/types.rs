// src/api/types.rs
//! Wire types for the Paperless REST API.
//!
//! Representation quirks are absorbed here, at the boundary: tags arrive
//! either as bare ids or as objects carrying an id, and are normalized to
//! a plain id set before anything else looks at them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One page of a paginated collection response.
///
/// `next` is an absolute URL to the following page, or null on the last
/// page.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// A tag or correspondent: an id plus a display name, unique by name
/// (case-insensitively) within its resource type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamedResource {
    pub id: u64,
    pub name: String,
}

/// Data type of a custom field, as reported by the API.
///
/// Only `date` and `monetary` get value normalization; everything else
/// passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldKind {
    #[default]
    String,
    Date,
    Monetary,
    #[serde(other)]
    Other,
}

/// A custom field definition attached to the archive.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomField {
    pub id: u64,
    pub name: String,
    pub data_type: CustomFieldKind,
}

/// A tag reference as it appears on a document: either a bare id or an
/// object containing one. Normalized via [`Document::tag_ids`]; nothing
/// deeper in the call chain branches on this representation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    Id(u64),
    Object { id: u64 },
}

impl TagRef {
    pub fn id(&self) -> u64 {
        match self {
            TagRef::Id(id) | TagRef::Object { id } => *id,
        }
    }
}

/// One custom-field value slot on a document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomFieldValue {
    pub field: u64,
    pub value: serde_json::Value,
}

/// A document as returned by `GET /api/documents/{id}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// OCR-extracted text body.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub correspondent: Option<u64>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
}

impl Document {
    /// The document's tags as a normalized id set, regardless of which
    /// wire representation each entry used.
    pub fn tag_ids(&self) -> BTreeSet<u64> {
        self.tags.iter().map(TagRef::id).collect()
    }
}
