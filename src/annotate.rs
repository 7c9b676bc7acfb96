// src/annotate.rs
//! Writing resolved metadata back onto documents.
//!
//! Covers the three write shapes the tool needs: tag attachment as a
//! set union, typed cleaning of extracted field values, and the
//! two-call application of classification output (structured fields,
//! then an appended note).

use crate::api::types::{CustomFieldKind, CustomFieldValue};
use crate::api::PaperlessClient;
use crate::constants::DATE_INPUT_FORMATS;
use crate::error::AppError;
use crate::resolve::FieldMapping;
use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Keys folded into the document note instead of custom fields.
const NOTE_KEYS: &[&str] = &["detected_services", "analysis"];

static MONETARY_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d,.-]").expect("monetary pattern is valid"));

/// The union of a document's current tags and one more id, in the
/// sorted array form the PATCH endpoint expects. Adding an id that is
/// already present yields the same set.
pub fn union_tags(current: &BTreeSet<u64>, tag_id: u64) -> Vec<u64> {
    let mut tags = current.clone();
    tags.insert(tag_id);
    tags.into_iter().collect()
}

/// Attaches a tag to a document, preserving its existing tags.
pub async fn add_tag_to_document(
    client: &PaperlessClient,
    document_id: u64,
    tag_id: u64,
) -> Result<(), AppError> {
    let document = client.document(document_id).await?;
    let tags = union_tags(&document.tag_ids(), tag_id);
    client
        .update_document(document_id, &serde_json::json!({ "tags": tags }))
        .await?;
    log::info!("Tag {} attached to document {}", tag_id, document_id);
    Ok(())
}

/// Normalizes a date string against the accepted input formats; first
/// match wins, re-emitted as `YYYY-MM-DD`.
fn clean_date(value: &str) -> Option<String> {
    DATE_INPUT_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .map(|date| date.format("%Y-%m-%d").to_string())
    })
}

/// Normalizes a monetary string: strip everything but digits, comma,
/// period and minus, decimal comma to period, parse, round to 2 places.
fn clean_monetary(value: &str) -> Option<String> {
    let stripped = MONETARY_NOISE.replace_all(value, "");
    let normalized = stripped.replace(',', ".");
    let amount: f64 = normalized.parse().ok()?;
    let rounded = (amount * 100.0).round() / 100.0;
    Some(rounded.to_string())
}

/// Cleans extracted field values against the live field metadata,
/// keyed by snake_case field name.
///
/// Unknown keys and values that fail their type's normalization are
/// dropped with a warning, never raised: one bad value should not cost
/// the rest of the extraction.
pub fn clean_fields(
    fields: &Map<String, Value>,
    field_meta: &HashMap<String, CustomFieldKind>,
) -> IndexMap<String, String> {
    let mut cleaned = IndexMap::new();

    for (key, raw) in fields {
        let value = match raw {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };

        let Some(kind) = field_meta.get(key) else {
            log::warn!("Skipping cleaning for unknown field: {}", key);
            continue;
        };

        let normalized = match kind {
            CustomFieldKind::Date => clean_date(&value),
            CustomFieldKind::Monetary => clean_monetary(&value),
            CustomFieldKind::String | CustomFieldKind::Other => Some(value.clone()),
        };

        match normalized {
            Some(v) => {
                cleaned.insert(key.clone(), v);
            }
            None => {
                log::warn!("Invalid format for '{}': {}, skipping", key, value);
            }
        }
    }

    cleaned
}

/// Pretty-prints nested values so they fit in a text field slot;
/// scalars pass through.
fn flatten_complex(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => Value::String(
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        ),
        other => other.clone(),
    }
}

/// Applies classification output to a document: one PATCH for the
/// mapped custom fields, one POST for the combined analysis note.
pub async fn apply_assessment(
    client: &PaperlessClient,
    mapping: &FieldMapping,
    document_id: u64,
    data: &Map<String, Value>,
) -> Result<(), AppError> {
    let processed: Map<String, Value> = data
        .iter()
        .map(|(key, value)| (key.clone(), flatten_complex(value)))
        .collect();

    let custom_fields: Vec<CustomFieldValue> = processed
        .iter()
        .filter(|(key, _)| !NOTE_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let id = mapping.get(key)?.id?;
            Some(CustomFieldValue {
                field: id,
                value: value.clone(),
            })
        })
        .collect();

    if !custom_fields.is_empty() {
        client
            .update_document(
                document_id,
                &serde_json::json!({ "custom_fields": custom_fields }),
            )
            .await?;
    }

    let analysis = processed
        .get("analysis")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let detected_services = processed
        .get("detected_services")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if !analysis.is_empty() || !detected_services.is_empty() {
        let note = format!("{}\n\nDetected Services:\n{}", analysis, detected_services);
        client.add_note(document_id, &note).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta(entries: &[(&str, CustomFieldKind)]) -> HashMap<String, CustomFieldKind> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn tag_union_is_idempotent() {
        let current = BTreeSet::from([2, 3]);
        assert_eq!(union_tags(&current, 5), vec![2, 3, 5]);

        let after = BTreeSet::from([2, 3, 5]);
        assert_eq!(union_tags(&after, 5), vec![2, 3, 5]);
    }

    #[test]
    fn date_values_normalize_to_iso() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"invoice_date": "01.02.2023"}"#).unwrap();
        let cleaned = clean_fields(&fields, &meta(&[("invoice_date", CustomFieldKind::Date)]));
        assert_eq!(cleaned.get("invoice_date").map(String::as_str), Some("2023-02-01"));
    }

    #[test]
    fn date_formats_are_tried_in_order() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"due": "15/03/2024", "paid": "02 Jan 24"}"#).unwrap();
        let cleaned = clean_fields(
            &fields,
            &meta(&[("due", CustomFieldKind::Date), ("paid", CustomFieldKind::Date)]),
        );
        assert_eq!(cleaned.get("due").map(String::as_str), Some("2024-03-15"));
        assert_eq!(cleaned.get("paid").map(String::as_str), Some("2024-01-02"));
    }

    #[test]
    fn invalid_dates_are_dropped_not_raised() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"invoice_date": "32/13/2023"}"#).unwrap();
        let cleaned = clean_fields(&fields, &meta(&[("invoice_date", CustomFieldKind::Date)]));
        assert!(cleaned.is_empty());
    }

    #[test]
    fn monetary_values_normalize_decimal_commas() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"amount": "1234,50"}"#).unwrap();
        let cleaned = clean_fields(&fields, &meta(&[("amount", CustomFieldKind::Monetary)]));
        assert_eq!(cleaned.get("amount").map(String::as_str), Some("1234.5"));
    }

    #[test]
    fn monetary_values_strip_currency_noise() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"amount": "EUR 89.99", "rounded": "12,345"}"#).unwrap();
        let cleaned = clean_fields(
            &fields,
            &meta(&[
                ("amount", CustomFieldKind::Monetary),
                ("rounded", CustomFieldKind::Monetary),
            ]),
        );
        assert_eq!(cleaned.get("amount").map(String::as_str), Some("89.99"));
        assert_eq!(cleaned.get("rounded").map(String::as_str), Some("12.35"));
    }

    #[test]
    fn unparseable_monetary_is_dropped() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"amount": "1.234,50"}"#).unwrap();
        // Thousands separator plus decimal comma yields two periods,
        // which does not parse; the field is dropped, not an error.
        let cleaned = clean_fields(&fields, &meta(&[("amount", CustomFieldKind::Monetary)]));
        assert!(cleaned.is_empty());
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let fields: Map<String, Value> =
            serde_json::from_str(r#"{"mystery": "value"}"#).unwrap();
        let cleaned = clean_fields(&fields, &meta(&[]));
        assert!(cleaned.is_empty());
    }

    #[test]
    fn complex_values_flatten_to_pretty_text() {
        let value: Value = serde_json::from_str(r#"[{"description": "Broadband"}]"#).unwrap();
        let flattened = flatten_complex(&value);
        let text = flattened.as_str().unwrap();
        assert!(text.contains("\"description\": \"Broadband\""));

        assert_eq!(flatten_complex(&Value::from(0.95)), Value::from(0.95));
    }
}
