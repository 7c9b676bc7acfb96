// src/error.rs
//! Application error types with structured error handling.
//!
//! Error variants form the vocabulary for failure modes in the system:
//! remote-API failures, resolution failures, and local configuration
//! problems each get their own shape so callers can recover by pattern
//! rather than by string matching.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Classification of a Paperless API rejection.
///
/// Instead of matching against response-body substrings at every call
/// site, the one stringly-typed decision — "is this a duplicate-name
/// conflict?" — is made once, here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperlessErrorKind {
    /// A 400-class rejection whose body signals a duplicate name
    /// ("already exists" or the owner/name unique constraint).
    UniqueConflict,
    /// Any other client-side rejection (4xx).
    Rejected,
    /// Server-side failure (5xx).
    ServerError,
}

impl PaperlessErrorKind {
    /// Classifies a non-success response by status and body text.
    pub fn classify(status: reqwest::StatusCode, body: &str) -> Self {
        if status.is_server_error() {
            return Self::ServerError;
        }
        let body = body.to_lowercase();
        if status == reqwest::StatusCode::BAD_REQUEST
            && (body.contains("already exists")
                || body.contains("violates owner / name unique constraint"))
        {
            Self::UniqueConflict
        } else {
            Self::Rejected
        }
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Paperless API returned {status} for {path}: {body}")]
    PaperlessService {
        status: reqwest::StatusCode,
        path: String,
        body: String,
        kind: PaperlessErrorKind,
    },

    #[error("Could not resolve {kind} '{name}' even after conflict recovery")]
    Resolution { kind: &'static str, name: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Document {0} has no OCR content")]
    NoOcrContent(u64),

    #[error("Classification gave up on document {0}")]
    ClassificationFailed(u64),

    #[error("Unexpected AI response: {0}")]
    UnexpectedAiResponse(String),

    #[error("Chat completion failed: {0}")]
    Completion(#[from] CompletionError),
}

impl AppError {
    /// Whether this error is the API telling us the name we tried to
    /// create already exists. The resolver's recovery re-fetch hinges
    /// on this single predicate.
    pub fn is_unique_conflict(&self) -> bool {
        matches!(
            self,
            AppError::PaperlessService {
                kind: PaperlessErrorKind::UniqueConflict,
                ..
            }
        )
    }
}

/// Failure modes of a single chat-completion call.
///
/// Only `RateLimited` is worth retrying; everything else indicates a
/// malformed request or a broken upstream and terminates the attempt
/// loop immediately.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Rate limit exceeded (429 Too Many Requests)")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Chat service returned {status}: {body}")]
    Service {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Chat transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Chat response had no choices")]
    EmptyResponse,
}

impl CompletionError {
    /// Precondition Required — the request itself is malformed, never
    /// worth repeating.
    pub fn is_precondition_required(&self) -> bool {
        matches!(
            self,
            CompletionError::Service { status, .. }
                if *status == reqwest::StatusCode::PRECONDITION_REQUIRED
        )
    }
}

/// Result type alias for convenience
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn classify_unique_conflict_variants() {
        let kind = PaperlessErrorKind::classify(
            StatusCode::BAD_REQUEST,
            r#"{"name":["tag with this name already exists."]}"#,
        );
        assert_eq!(kind, PaperlessErrorKind::UniqueConflict);

        let kind = PaperlessErrorKind::classify(
            StatusCode::BAD_REQUEST,
            "duplicate key value violates owner / name unique constraint",
        );
        assert_eq!(kind, PaperlessErrorKind::UniqueConflict);
    }

    #[test]
    fn classify_other_statuses() {
        assert_eq!(
            PaperlessErrorKind::classify(StatusCode::BAD_REQUEST, "field required"),
            PaperlessErrorKind::Rejected
        );
        assert_eq!(
            PaperlessErrorKind::classify(StatusCode::NOT_FOUND, "not found"),
            PaperlessErrorKind::Rejected
        );
        assert_eq!(
            PaperlessErrorKind::classify(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            PaperlessErrorKind::ServerError
        );
    }

    #[test]
    fn precondition_required_is_terminal() {
        let err = CompletionError::Service {
            status: StatusCode::PRECONDITION_REQUIRED,
            body: "precondition".into(),
        };
        assert!(err.is_precondition_required());

        let err = CompletionError::Service {
            status: StatusCode::BAD_GATEWAY,
            body: "bad".into(),
        };
        assert!(!err.is_precondition_required());
    }
}
