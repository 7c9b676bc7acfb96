// src/assign.rs
//! AI-assisted correspondent assignment.
//!
//! One document at a time: the model is shown the existing
//! correspondent names and a slice of OCR text and asked for a
//! status-tagged JSON decision. Matches and new suggestions go through
//! the idempotent resolver; a no-match leaves a marker tag so the bulk
//! sweep never revisits the document.

use crate::annotate::add_tag_to_document;
use crate::api::types::NamedResource;
use crate::api::PaperlessClient;
use crate::constants::{
    GPT_CORRESPONDENT_TAG, PROMPT_MAX_CORRESPONDENTS, PROMPT_MAX_OCR_CHARS,
    UNDETERMINED_CORRESPONDENT_TAG,
};
use crate::error::AppError;
use crate::openai::ChatClient;
use crate::resolve::{normalize_name, Resolver, ResourceKind};
use serde::Deserialize;

const SYSTEM_PROMPT: &str = "You're a document assistant for metadata extraction. The \
correspondent of a document is the person, institution, or company that a document \
originates from.";

/// The model's decision, parsed from its status-tagged JSON reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrespondentDecision {
    Match { correspondent: String },
    SuggestNew { correspondent: String },
    NoMatch {
        #[serde(default)]
        reason: String,
    },
}

/// Truncates to at most `max` characters without splitting a char.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn build_prompt(existing_names: &[String], ocr_text: &str) -> String {
    let shown: Vec<&str> = existing_names
        .iter()
        .take(PROMPT_MAX_CORRESPONDENTS)
        .map(String::as_str)
        .collect();

    format!(
        "You are a document assistant. Based on the OCR text below, determine the most \
likely correspondent name.\n\n\
The correspondent of a document is the person, institution, or company that a document \
originates from. Prefer company names or institution names over personal names when \
possible. The correspondent name should be a clear and identifiable name, not a generic \
term or phrase.\n\n\
There are three scenarios to consider:\n\
1. If there is an appropriate match in the list of already existing correspondents, \
return the following JSON:\n\
   {{\"status\": \"match\", \"correspondent\": \"<matched_correspondent_name>\"}}\n\
2. If there is no appropriate match but you can determine an appropriate new \
correspondent, return the following JSON:\n\
   {{\"status\": \"suggest_new\", \"correspondent\": \"<suggested_correspondent_name>\"}}\n\
3. If there is no appropriate match and you cannot determine one, return the following \
JSON:\n\
   {{\"status\": \"no_match\", \"reason\": \"Unable to determine a correspondent\"}}\n\n\
Existing correspondents:\n{}\n\n\
OCR Text:\n{}\n\n\
Return the result as specified above, but double check your response before you do.",
        shown.join(", "),
        truncate_chars(ocr_text, PROMPT_MAX_OCR_CHARS)
    )
}

/// Correspondent assignment over one Paperless instance.
pub struct CorrespondentAssigner<'a> {
    paperless: &'a PaperlessClient,
    chat: &'a ChatClient,
}

impl<'a> CorrespondentAssigner<'a> {
    pub fn new(paperless: &'a PaperlessClient, chat: &'a ChatClient) -> Self {
        Self { paperless, chat }
    }

    async fn determine(
        &self,
        ocr_text: &str,
        existing: &[NamedResource],
    ) -> Result<CorrespondentDecision, AppError> {
        let names: Vec<String> = existing.iter().map(|c| c.name.clone()).collect();
        let prompt = build_prompt(&names, ocr_text);

        let reply = self
            .chat
            .complete(SYSTEM_PROMPT, &prompt, Some(0.2))
            .await?;
        serde_json::from_str(reply.trim())
            .map_err(|e| AppError::UnexpectedAiResponse(format!("{}: {}", e, reply.trim())))
    }

    /// Determines and applies a correspondent for one document.
    ///
    /// A document without OCR content is a logged no-op.
    pub async fn assign(&self, document_id: u64) -> Result<(), AppError> {
        log::info!("Starting correspondent assignment for document {}", document_id);

        let document = self.paperless.document(document_id).await?;
        let current_tags = document.tag_ids();
        let ocr_text = document.content.trim();
        if ocr_text.is_empty() {
            log::warn!("No OCR content found for document {}", document_id);
            return Ok(());
        }

        let correspondents = self.paperless.correspondents().await?;
        let decision = self.determine(ocr_text, &correspondents).await?;
        let resolver = Resolver::new(self.paperless);

        let name = match decision {
            CorrespondentDecision::Match { correspondent }
            | CorrespondentDecision::SuggestNew { correspondent } => correspondent,
            CorrespondentDecision::NoMatch { reason } => {
                log::warn!(
                    "AI could not determine a correspondent for document {}: {}",
                    document_id,
                    reason
                );
                let tag_id = resolver
                    .resolve_or_create(ResourceKind::Tag, UNDETERMINED_CORRESPONDENT_TAG)
                    .await?;
                if !current_tags.contains(&tag_id) {
                    add_tag_to_document(self.paperless, document_id, tag_id).await?;
                }
                return Ok(());
            }
        };

        // Prefer the already-fetched collection; fall back to the
        // resolver (which creates on a miss and absorbs races).
        let wanted = normalize_name(&name);
        let correspondent_id = match correspondents
            .iter()
            .find(|c| normalize_name(&c.name) == wanted)
        {
            Some(existing) => existing.id,
            None => {
                log::info!("No matching correspondent for '{}', creating one", name);
                resolver
                    .resolve_or_create(ResourceKind::Correspondent, &name)
                    .await?
            }
        };

        if document.correspondent == Some(correspondent_id) {
            log::info!(
                "Document {} already has correspondent {}, no update needed",
                document_id,
                correspondent_id
            );
            return Ok(());
        }

        log::info!(
            "Updating document {} to correspondent {} ('{}')",
            document_id,
            correspondent_id,
            name
        );
        self.paperless
            .update_document(
                document_id,
                &serde_json::json!({ "correspondent": correspondent_id }),
            )
            .await?;

        let marker_id = resolver
            .resolve_or_create(ResourceKind::Tag, GPT_CORRESPONDENT_TAG)
            .await?;
        if !current_tags.contains(&marker_id) {
            add_tag_to_document(self.paperless, document_id, marker_id).await?;
        }

        log::info!("Document {} processed successfully", document_id);
        Ok(())
    }

    /// Runs assignment over every document not yet carrying the
    /// processed marker, strictly sequentially.
    pub async fn assign_all(&self) -> Result<(), AppError> {
        log::info!(
            "Starting assignment for all documents without the '{}' tag",
            GPT_CORRESPONDENT_TAG
        );

        let tags = self.paperless.tags().await?;
        let marker = normalize_name(GPT_CORRESPONDENT_TAG);
        let marker_id = tags
            .iter()
            .find(|t| normalize_name(&t.name) == marker)
            .map(|t| t.id)
            .ok_or_else(|| {
                AppError::MissingConfiguration(format!(
                    "The '{}' tag does not exist; create it first",
                    GPT_CORRESPONDENT_TAG
                ))
            })?;

        let documents = self.paperless.documents().await?;
        for document in documents {
            if document.tag_ids().contains(&marker_id) {
                log::info!(
                    "Skipping document {} (already has the '{}' tag)",
                    document.id,
                    GPT_CORRESPONDENT_TAG
                );
                continue;
            }
            log::info!("Processing document {}", document.id);
            self.assign(document.id).await?;
        }

        log::info!("Assignment completed for all documents");
        Ok(())
    }
}
