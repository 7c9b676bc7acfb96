// src/tax.rs
//! Tax-relief classification of a document's OCR text.
//!
//! The interesting contract is the attempt loop in
//! [`TaxReliefAnalyzer::analyze`]: bounded retries where only
//! rate-limit responses consume an attempt, a structurally invalid
//! model response is terminal (tag the document and move on, repeating
//! the identical request will not fix it), and any other service error
//! aborts immediately.

use crate::annotate::{add_tag_to_document, apply_assessment};
use crate::api::PaperlessClient;
use crate::config::PromptSet;
use crate::constants::TAX_CHECK_FAILED_TAG;
use crate::error::{AppError, CompletionError};
use crate::openai::{ChatClient, RetryPolicy};
use crate::resolve::{FieldMapping, Resolver, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One structured finding in the classifier output.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DetectedService {
    pub description: String,
    pub category: String,
    pub allowable: bool,
    #[serde(default)]
    pub disallow_reason: String,
    pub amount: f64,
}

/// The classification result. The fixed schema is this type: unknown
/// fields are rejected and the confidence score must land in [0, 1].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaxReliefAssessment {
    pub detected_services: Vec<DetectedService>,
    pub total_amount_claimable: f64,
    pub covered_under: String,
    pub confidence_score: f64,
    pub analysis: String,
}

impl TaxReliefAssessment {
    /// Parses completion text and checks the invariants the serde
    /// model cannot express.
    pub fn parse_and_validate(text: &str) -> Result<Self, String> {
        let assessment: Self = serde_json::from_str(text).map_err(|e| e.to_string())?;
        if !(0.0..=1.0).contains(&assessment.confidence_score) {
            return Err(format!(
                "confidence_score {} outside [0, 1]",
                assessment.confidence_score
            ));
        }
        Ok(assessment)
    }

    /// The assessment as a JSON object map, the shape the annotator
    /// consumes.
    pub fn to_value_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Retrying classifier call plus the surrounding document flow.
pub struct TaxReliefAnalyzer<'a> {
    paperless: &'a PaperlessClient,
    chat: &'a ChatClient,
    prompts: &'a PromptSet,
    policy: RetryPolicy,
}

impl<'a> TaxReliefAnalyzer<'a> {
    pub fn new(
        paperless: &'a PaperlessClient,
        chat: &'a ChatClient,
        prompts: &'a PromptSet,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            paperless,
            chat,
            prompts,
            policy,
        }
    }

    /// Classifies OCR text, returning `None` on any terminal failure.
    ///
    /// At most `policy.max_retries` upstream calls. A schema-invalid
    /// response attaches the failure marker tag to the document as a
    /// side channel; errors from that tagging itself do propagate.
    pub async fn analyze(
        &self,
        ocr_text: &str,
        document_id: u64,
    ) -> Result<Option<TaxReliefAssessment>, AppError> {
        let user_prompt = format!("{}{}", self.prompts.user_prompt, ocr_text);

        for attempt in 0..self.policy.max_retries {
            match self
                .chat
                .complete(&self.prompts.system_prompt, &user_prompt, None)
                .await
            {
                Ok(text) => match TaxReliefAssessment::parse_and_validate(&text) {
                    Ok(assessment) => return Ok(Some(assessment)),
                    Err(reason) => {
                        log::error!("Validation error: {}", reason);
                        log::info!(
                            "Adding '{}' tag to document {}",
                            TAX_CHECK_FAILED_TAG,
                            document_id
                        );
                        let resolver = Resolver::new(self.paperless);
                        let tag_id = resolver
                            .resolve_or_create(ResourceKind::Tag, TAX_CHECK_FAILED_TAG)
                            .await?;
                        add_tag_to_document(self.paperless, document_id, tag_id).await?;
                        return Ok(None);
                    }
                },
                Err(CompletionError::RateLimited { retry_after }) => {
                    // No sleep after the final attempt; there is no
                    // retry left to wait for.
                    if attempt + 1 < self.policy.max_retries {
                        let delay = self.policy.delay(attempt, retry_after);
                        log::warn!(
                            "Rate limit exceeded (429 Too Many Requests), retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) if err.is_precondition_required() => {
                    log::error!(
                        "Precondition Required (428): the request itself is malformed, not retrying"
                    );
                    return Ok(None);
                }
                Err(err) => {
                    log::error!("Chat service error: {}", err);
                    return Ok(None);
                }
            }
        }

        log::error!(
            "Failed to classify document {} after {} attempts",
            document_id,
            self.policy.max_retries
        );
        Ok(None)
    }

    /// Full tax-check flow for one document: fetch OCR, classify,
    /// resolve the field mapping, write fields and note back.
    pub async fn run(
        &self,
        document_id: u64,
        mapping: &mut FieldMapping,
    ) -> Result<(), AppError> {
        log::info!("Fetching OCR data for document {}", document_id);
        let document = self.paperless.document(document_id).await?;
        let ocr_text = document.content.trim();
        if ocr_text.is_empty() {
            return Err(AppError::NoOcrContent(document_id));
        }

        log::info!("Analyzing OCR data for document {}", document_id);
        let Some(assessment) = self.analyze(ocr_text, document_id).await? else {
            return Err(AppError::ClassificationFailed(document_id));
        };

        mapping.populate_ids(self.paperless).await?;
        let resolver = Resolver::new(self.paperless);
        mapping.ensure_fields(&resolver).await;

        apply_assessment(
            self.paperless,
            mapping,
            document_id,
            &assessment.to_value_map(),
        )
        .await?;

        log::info!("Document {} updated successfully", document_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALID: &str = r#"{
        "detected_services": [
            {
                "description": "Broadband",
                "category": "Utilities",
                "allowable": true,
                "disallow_reason": "",
                "amount": 50.0
            }
        ],
        "total_amount_claimable": 50.0,
        "covered_under": "PAYE",
        "confidence_score": 0.95,
        "analysis": "Broadband is allowable under utilities."
    }"#;

    #[test]
    fn valid_payload_parses() {
        let assessment = TaxReliefAssessment::parse_and_validate(VALID).unwrap();
        assert_eq!(assessment.detected_services.len(), 1);
        assert_eq!(assessment.covered_under, "PAYE");
        assert_eq!(assessment.total_amount_claimable, 50.0);
    }

    #[test]
    fn unknown_fields_fail_validation() {
        let result =
            TaxReliefAssessment::parse_and_validate(r#"{"invalid_field": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_fields_fail_validation() {
        let result = TaxReliefAssessment::parse_and_validate(
            r#"{"detected_services": [], "total_amount_claimable": 0.0}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_confidence_fails_validation() {
        let text = VALID.replace("0.95", "1.5");
        let result = TaxReliefAssessment::parse_and_validate(&text);
        assert!(result.unwrap_err().contains("confidence_score"));
    }

    #[test]
    fn value_map_keeps_note_keys() {
        let assessment = TaxReliefAssessment::parse_and_validate(VALID).unwrap();
        let map = assessment.to_value_map();
        assert!(map.contains_key("analysis"));
        assert!(map.contains_key("detected_services"));
        assert!(map.contains_key("covered_under"));
    }
}
