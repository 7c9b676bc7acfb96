// src/resolve.rs
//! Idempotent resolution of named resources.
//!
//! The archive enforces case-insensitive name uniqueness for tags,
//! correspondents, and custom fields, but it is observed to race under
//! concurrent creation. `resolve_or_create` is therefore
//! optimistic-create-then-recover: look the name up, create on a miss,
//! and if creation loses a race (unique-constraint rejection) re-fetch
//! once and take the winner's id. A name that is still missing after
//! that single recovery pass is a fatal inconsistency.

use crate::api::types::{CustomField, CustomFieldKind, NamedResource};
use crate::api::PaperlessClient;
use crate::error::AppError;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static SNAKE_CASE_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9]+").expect("snake-case pattern is valid")
});

/// Trim + lowercase, the normalization used for every name lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Converts text to snake_case: lowercased, every non-alphanumeric run
/// collapsed to one underscore, leading/trailing underscores dropped.
pub fn to_snake_case(text: &str) -> String {
    SNAKE_CASE_RUNS
        .replace_all(&text.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// Builds a normalized name -> id lookup from a fetched collection.
pub fn normalized_lookup(resources: &[NamedResource]) -> HashMap<String, u64> {
    resources
        .iter()
        .map(|r| (normalize_name(&r.name), r.id))
        .collect()
}

/// The category of named entity being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Tag,
    Correspondent,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Tag => "tag",
            ResourceKind::Correspondent => "correspondent",
        }
    }
}

/// Fetch-or-create helper over one Paperless client.
pub struct Resolver<'a> {
    client: &'a PaperlessClient,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a PaperlessClient) -> Self {
        Self { client }
    }

    async fn fetch_named(&self, kind: ResourceKind) -> Result<Vec<NamedResource>, AppError> {
        match kind {
            ResourceKind::Tag => self.client.tags().await,
            ResourceKind::Correspondent => self.client.correspondents().await,
        }
    }

    async fn create_named(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<NamedResource, AppError> {
        match kind {
            ResourceKind::Tag => self.client.create_tag(name).await,
            ResourceKind::Correspondent => self.client.create_correspondent(name).await,
        }
    }

    /// Returns the id of the named resource, creating it if absent.
    ///
    /// Logically idempotent: two sequential calls with the same name
    /// yield the same id, and a single concurrent creator racing this
    /// call is tolerated via one recovery re-fetch.
    pub async fn resolve_or_create(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<u64, AppError> {
        let wanted = normalize_name(name);

        let existing = self.fetch_named(kind).await?;
        if let Some(&id) = normalized_lookup(&existing).get(&wanted) {
            log::debug!("{} '{}' already exists with id {}", kind.label(), name, id);
            return Ok(id);
        }

        log::info!("{} '{}' not found, creating it", kind.label(), name);
        match self.create_named(kind, name).await {
            Ok(created) => Ok(created.id),
            Err(err) if err.is_unique_conflict() => {
                // Someone else created the same name between our fetch
                // and our create. One recovery pass only.
                log::warn!(
                    "{} '{}' hit a unique-name conflict, re-fetching",
                    kind.label(),
                    name
                );
                let refreshed = self.fetch_named(kind).await?;
                normalized_lookup(&refreshed)
                    .get(&wanted)
                    .copied()
                    .ok_or_else(|| AppError::Resolution {
                        kind: kind.label(),
                        name: name.to_string(),
                    })
            }
            Err(err) => Err(err),
        }
    }

    /// Ensures a custom field exists, by exact-name case-insensitive
    /// lookup first and creation second. Returns the field metadata.
    pub async fn ensure_custom_field(
        &self,
        name: &str,
        data_type: CustomFieldKind,
        extra_data: Option<serde_json::Value>,
    ) -> Result<CustomField, AppError> {
        let matches = self.client.custom_fields_named(name).await?;
        if let Some(field) = matches.into_iter().next() {
            log::debug!("Custom field '{}' already exists (id {})", name, field.id);
            return Ok(field);
        }

        log::info!("Creating custom field '{}' ({:?})", name, data_type);
        self.client
            .create_custom_field(name, data_type, extra_data)
            .await
    }
}

/// One entry in the field-mapping file, before normalization: either a
/// bare field name or a name with an explicit data type.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawFieldEntry {
    Name(String),
    Spec {
        name: String,
        #[serde(default)]
        data_type: CustomFieldKind,
        #[serde(default)]
        extra_data: Option<serde_json::Value>,
    },
}

/// A mapping entry enriched with the live field id once resolved.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub data_type: CustomFieldKind,
    pub extra_data: Option<serde_json::Value>,
    pub id: Option<u64>,
}

/// Ordered mapping from canonical snake_case result keys to custom
/// field specs. Entries that cannot be resolved keep `id = None` and
/// are excluded from later updates rather than failing the run.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    entries: IndexMap<String, FieldSpec>,
}

impl FieldMapping {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: IndexMap<String, RawFieldEntry> =
            serde_json::from_str(&text).map_err(|source| AppError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: IndexMap<String, RawFieldEntry>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(key, entry)| {
                let spec = match entry {
                    RawFieldEntry::Name(name) => FieldSpec {
                        name,
                        data_type: CustomFieldKind::String,
                        extra_data: None,
                        id: None,
                    },
                    RawFieldEntry::Spec {
                        name,
                        data_type,
                        extra_data,
                    } => FieldSpec {
                        name,
                        data_type,
                        extra_data,
                        id: None,
                    },
                };
                (key, spec)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches entries against the live custom fields by snake-casing
    /// both sides. Unmatched entries are logged and left without an id.
    pub async fn populate_ids(&mut self, client: &PaperlessClient) -> Result<(), AppError> {
        let live = client.custom_fields().await?;
        let by_snake_name: HashMap<String, &CustomField> = live
            .iter()
            .map(|field| (to_snake_case(&field.name), field))
            .collect();

        for (key, spec) in self.entries.iter_mut() {
            let wanted = to_snake_case(&spec.name);
            match by_snake_name.get(&wanted) {
                Some(field) => {
                    spec.id = Some(field.id);
                    log::debug!("Field mapping '{}' resolved to custom field {}", key, field.id);
                }
                None => {
                    log::warn!(
                        "No matching custom field found for key '{}' with name '{}'",
                        key,
                        wanted
                    );
                }
            }
        }
        Ok(())
    }

    /// Ensures every still-unresolved entry exists in the archive,
    /// creating fields as needed. Per-entry failures are logged and
    /// skipped so one bad mapping does not halt the run.
    pub async fn ensure_fields(&mut self, resolver: &Resolver<'_>) {
        for (key, spec) in self.entries.iter_mut() {
            if spec.id.is_some() {
                continue;
            }
            match resolver
                .ensure_custom_field(&spec.name, spec.data_type, spec.extra_data.clone())
                .await
            {
                Ok(field) => spec.id = Some(field.id),
                Err(err) => {
                    log::error!("Failed to ensure custom field for key '{}': {}", key, err);
                }
            }
        }

        let missing: Vec<&String> = self
            .entries
            .iter()
            .filter(|(_, spec)| spec.id.is_none())
            .map(|(key, _)| key)
            .collect();
        if !missing.is_empty() {
            log::warn!("The following keys are missing field ids: {:?}", missing);
        }
    }
}
