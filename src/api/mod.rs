// src/api/mod.rs
//! Paperless REST API access: client, pagination, and wire types.

pub mod client;
pub mod pagination;
pub mod types;

pub use client::PaperlessClient;
pub use types::{
    CustomField, CustomFieldKind, CustomFieldValue, Document, NamedResource, PaginatedResponse,
    TagRef,
};
