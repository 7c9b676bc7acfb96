// src/constants.rs
//! Domain constants that define the operational boundaries of the tool.
//!
//! Each constant is named for the domain concept it constrains. Reading
//! these should tell you how the tool operates: how much it fetches per
//! round-trip, how often it retries the classifier, and which marker
//! tags it leaves behind.

// ---------------------------------------------------------------------------
// Paperless API boundaries
// ---------------------------------------------------------------------------

/// How many objects we ask Paperless to return per page of results.
/// 100 is the largest page size Paperless serves.
pub const PAPERLESS_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Classifier retry boundaries
// ---------------------------------------------------------------------------

/// Upper bound on chat-completion attempts per document.
///
/// Only rate-limit responses consume an attempt; any other failure is
/// terminal on the first occurrence.
pub const CLASSIFIER_MAX_RETRIES: u32 = 5;

/// Base of the exponential backoff between rate-limited attempts.
pub const CLASSIFIER_BACKOFF_FACTOR: f64 = 2.0;

/// Chat model used for every AI-backed subcommand.
pub const OPENAI_MODEL: &str = "gpt-4";

/// Default OpenAI-compatible API base.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Marker tags
// ---------------------------------------------------------------------------

/// Attached when the classifier's output fails schema validation.
pub const TAX_CHECK_FAILED_TAG: &str = "tax-check-failed";

/// Attached when a document's correspondent was set by the AI flow.
/// Also the "already processed" marker the bulk sweep skips on.
pub const GPT_CORRESPONDENT_TAG: &str = "gpt-correspondent";

/// Attached when the AI could not determine any correspondent.
pub const UNDETERMINED_CORRESPONDENT_TAG: &str = "gpt-correspondent-unable-to-determine";

// ---------------------------------------------------------------------------
// Prompt-building boundaries
// ---------------------------------------------------------------------------

/// Cap on the number of existing correspondent names included in the
/// correspondent-determination prompt.
pub const PROMPT_MAX_CORRESPONDENTS: usize = 50;

/// Cap on the OCR characters included in the correspondent prompt.
pub const PROMPT_MAX_OCR_CHARS: usize = 1000;

// ---------------------------------------------------------------------------
// Field-value normalization
// ---------------------------------------------------------------------------

/// Accepted input formats for `date` custom fields, tried in order;
/// the first match wins and is re-emitted as `%Y-%m-%d`.
pub const DATE_INPUT_FORMATS: &[&str] = &["%d.%m.%Y", "%d/%m/%Y", "%d %b %y"];
