// src/extract.rs
//! Title generation and custom-field value extraction from OCR text.
//!
//! The model is asked for exactly the snake_case keys of the custom
//! fields that already exist in the archive; the reply's JSON object is
//! located inside whatever prose surrounds it, cleaned per field type,
//! and written back in one partial update.

use crate::annotate::clean_fields;
use crate::api::types::{CustomField, CustomFieldKind, CustomFieldValue};
use crate::api::PaperlessClient;
use crate::error::AppError;
use crate::openai::ChatClient;
use crate::resolve::to_snake_case;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

const SYSTEM_PROMPT: &str =
    "You're a document assistant for metadata extraction and title generation.";

/// The model's reply shape: a generated title and a key->value object
/// for whichever fields were present in the text.
#[derive(Debug, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    title: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Slices out the first-to-last-brace JSON object from raw completion
/// text, tolerating prose around it.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end >= start).then(|| &raw[start..=end])
}

fn build_prompt(field_keys: &[&str], content: &str) -> String {
    format!(
        "You are a document assistant. Based on the OCR text below, perform the following \
tasks:\n\n\
1. Generate a concise and descriptive title for the document.\n\
2. Extract the following metadata fields using the exact snake_case keys listed:\n\n\
{}\n\n\
Return a JSON object with the following structure:\n\
{{\n  \"title\": \"<generated_title>\",\n  \"fields\": {{\n    <field_key>: <field_value>,\n    ...\n  }}\n}}\n\n\
If a field is not present in the text, do not include it in the \"fields\" object.\n\n\
Text:\n{}",
        field_keys.join(", "),
        content
    )
}

/// Metadata extraction over one Paperless instance.
pub struct MetadataExtractor<'a> {
    paperless: &'a PaperlessClient,
    chat: &'a ChatClient,
}

impl<'a> MetadataExtractor<'a> {
    pub fn new(paperless: &'a PaperlessClient, chat: &'a ChatClient) -> Self {
        Self { paperless, chat }
    }

    /// Extracts and applies a title plus custom-field values for one
    /// document. Missing OCR content or an archive without custom
    /// fields are logged no-ops.
    pub async fn extract(&self, document_id: u64) -> Result<(), AppError> {
        log::info!("Starting metadata extraction for document {}", document_id);

        let document = self.paperless.document(document_id).await?;
        let content = document.content.trim();
        if content.is_empty() {
            log::warn!("No OCR content found for document {}", document_id);
            return Ok(());
        }

        let live_fields: HashMap<String, CustomField> = self
            .paperless
            .custom_fields()
            .await?
            .into_iter()
            .map(|field| (to_snake_case(&field.name), field))
            .collect();
        if live_fields.is_empty() {
            log::warn!("No custom fields found, nothing to extract");
            return Ok(());
        }

        let field_keys: Vec<&str> = live_fields.keys().map(String::as_str).collect();
        let prompt = build_prompt(&field_keys, content);

        let raw = self.chat.complete(SYSTEM_PROMPT, &prompt, Some(0.2)).await?;
        log::debug!("Raw model output: {:.300}", raw);

        let json_text = extract_json_object(&raw).ok_or_else(|| {
            AppError::UnexpectedAiResponse("could not find a JSON object in the output".into())
        })?;
        let reply: ExtractionReply = serde_json::from_str(json_text)
            .map_err(|e| AppError::UnexpectedAiResponse(e.to_string()))?;

        let field_meta: HashMap<String, CustomFieldKind> = live_fields
            .iter()
            .map(|(key, field)| (key.clone(), field.data_type))
            .collect();
        let cleaned = clean_fields(&reply.fields, &field_meta);

        let custom_fields: Vec<CustomFieldValue> = cleaned
            .iter()
            .filter_map(|(key, value)| {
                live_fields.get(key).map(|field| CustomFieldValue {
                    field: field.id,
                    value: Value::String(value.clone()),
                })
            })
            .collect();

        let field_count = custom_fields.len();
        self.paperless
            .update_document(
                document_id,
                &serde_json::json!({
                    "title": reply.title.trim(),
                    "custom_fields": custom_fields,
                }),
            )
            .await?;

        log::info!(
            "Updated document {} with title and {} custom fields",
            document_id,
            field_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_object_is_found_inside_prose() {
        let raw = "Sure, here is the result:\n{\"title\": \"Invoice\", \"fields\": {}}\nHope that helps!";
        assert_eq!(
            extract_json_object(raw),
            Some(r#"{"title": "Invoice", "fields": {}}"#)
        );
    }

    #[test]
    fn missing_object_yields_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn reply_defaults_missing_sections() {
        let reply: ExtractionReply = serde_json::from_str(r#"{"title": "X"}"#).unwrap();
        assert_eq!(reply.title, "X");
        assert!(reply.fields.is_empty());
    }
}
