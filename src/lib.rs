// src/lib.rs
//! paperless-curator library — maintenance and enrichment of a
//! Paperless-ngx archive over its REST API.
//!
//! # Public API
//!
//! Types are organized by concern:
//! - **Error handling** — `AppError`, `CompletionError`
//! - **Configuration** — `PaperlessConfig`, `OpenAiConfig`, `PromptSet`
//! - **API client** — `PaperlessClient` and the wire types
//! - **Resolution** — `Resolver`, `ResourceKind`, `FieldMapping`
//! - **Maintenance** — duplicate merging, JSON-name cleanup
//! - **Enrichment** — tax-relief analysis, metadata extraction,
//!   correspondent assignment

pub mod annotate;
pub mod api;
pub mod assign;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod merge;
pub mod openai;
pub mod resolve;
pub mod tax;

// --- Error handling ---
pub use crate::error::{AppError, CompletionError, PaperlessErrorKind};

// --- Configuration ---
pub use crate::config::{Command, CommandLineInput, OpenAiConfig, PaperlessConfig, PromptSet};

// --- API client ---
pub use crate::api::{
    CustomField, CustomFieldKind, CustomFieldValue, Document, NamedResource, PaperlessClient,
    TagRef,
};

// --- Resolution ---
pub use crate::resolve::{FieldMapping, FieldSpec, Resolver, ResourceKind};

// --- Maintenance ---
pub use crate::merge::{cleanup_json_names, merge_duplicate_correspondents};

// --- Enrichment ---
pub use crate::annotate::{add_tag_to_document, clean_fields, union_tags};
pub use crate::assign::{CorrespondentAssigner, CorrespondentDecision};
pub use crate::extract::MetadataExtractor;
pub use crate::openai::{ChatClient, RetryPolicy};
pub use crate::tax::{DetectedService, TaxReliefAnalyzer, TaxReliefAssessment};
