// src/config.rs
//! CLI surface and runtime configuration.
//!
//! Environment and config files are read once at startup into explicit
//! structs that get passed into every component; no ambient globals.

use crate::constants::OPENAI_API_BASE;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge duplicate correspondents into the earliest-created one
    MergeDuplicates,

    /// Repair correspondents whose display name is a serialized JSON blob
    CleanupNames,

    /// Classify a document for tax relief and write the findings back
    TaxCheck {
        /// Paperless document id
        document_id: u64,

        /// Prompt file (system + user prompt)
        #[arg(long, default_value = "config/tax_relief_prompts.json")]
        prompts: PathBuf,

        /// Field-mapping file (result key -> custom field name/type)
        #[arg(long, default_value = "config/field_mapping.json")]
        field_mapping: PathBuf,
    },

    /// Generate a title and extract custom-field values from OCR text
    ExtractMetadata {
        /// Paperless document id
        document_id: u64,
    },

    /// Determine and set a document's correspondent via the AI flow
    AssignCorrespondent {
        /// Paperless document id
        document_id: u64,
    },

    /// Run correspondent assignment on every document not yet processed
    AssignAll,
}

/// Connection settings for the Paperless instance.
#[derive(Debug, Clone)]
pub struct PaperlessConfig {
    pub base_url: Url,
    pub token: String,
}

impl PaperlessConfig {
    /// Resolves from `PAPERLESS_URL` (default `http://localhost:8000`)
    /// and `PAPERLESS_API_TOKEN`.
    pub fn from_env() -> Result<Self, AppError> {
        let raw_url = std::env::var("PAPERLESS_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let token = std::env::var("PAPERLESS_API_TOKEN").map_err(|_| {
            AppError::MissingConfiguration(
                "PAPERLESS_API_TOKEN environment variable not set".to_string(),
            )
        })?;
        Self::new(&raw_url, token)
    }

    pub fn new(raw_url: &str, token: String) -> Result<Self, AppError> {
        // A trailing slash keeps Url::join from eating the last path
        // segment of instances served under a subpath.
        let normalized = if raw_url.ends_with('/') {
            raw_url.to_string()
        } else {
            format!("{}/", raw_url)
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| AppError::InvalidUrl(format!("{}: {}", raw_url, e)))?;
        Ok(Self { base_url, token })
    }
}

/// Connection settings for the chat-completions service.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
}

impl OpenAiConfig {
    /// Resolves from `OPENAI_API_KEY`, with `OPENAI_API_BASE` as an
    /// optional override for compatible endpoints.
    pub fn from_env() -> Result<Self, AppError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            AppError::MissingConfiguration(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;
        let api_base =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| OPENAI_API_BASE.to_string());
        Ok(Self { api_base, api_key })
    }
}

/// The prompt pair driving the tax-relief classification, loaded once
/// and immutable for the run.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSet {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub user_prompt: String,
}

impl PromptSet {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
