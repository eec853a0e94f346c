// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use thiserror::Error;

/// The single error type threaded through the domain, application, and
/// infrastructure layers of the semantic memory service.
///
/// Every variant is one of the categories described in the system's
/// error handling design: a validation failure caught before any I/O
/// happens, a transient infrastructure hiccup the caller should retry,
/// a non-retriable orchestration fault, a step handler's own business
/// error, a missing resource, or a cooperative cancellation.
#[derive(Debug, Error, Clone)]
pub enum MemoryError {
    /// A value failed domain validation (malformed id, reserved tag
    /// prefix, empty required field, ...). Never retriable - the caller
    /// must change the input.
    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// The requested resource does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    /// An infrastructure operation failed in a way that is expected to
    /// be transient (lock contention, a momentarily unreachable volume,
    /// a lost database connection). Callers - in particular the queue's
    /// retry loop - should treat this as retriable.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// An orchestration-level fault that is not safe to retry: a
    /// corrupted pipeline state document, an execution superseded out
    /// from under the caller, or an invariant violation in the pipeline
    /// state machine itself.
    #[error("orchestration error: {message}")]
    Orchestration { message: String },

    /// A step handler reported a business-logic failure while
    /// processing a pipeline (as opposed to an infrastructure fault).
    /// Carries the step name for diagnostics.
    #[error("step '{step}' failed: {message}")]
    HandlerFailed { step: String, message: String },

    /// The operation was cancelled cooperatively (graceful shutdown,
    /// execution superseded by a newer one).
    #[error("operation cancelled: {message}")]
    Cancelled { message: String },

    /// Filesystem I/O failure. Wrapped rather than `#[from]`'d directly
    /// so call sites can attach context before the conversion.
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization failure - malformed pipeline state,
    /// malformed queue message envelope, malformed custom data.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A storage-layer failure (SQLite, the Operations ledger). Kept as
    /// a string rather than depending on a concrete storage crate from
    /// the domain layer.
    #[error("storage error: {0}")]
    Storage(String),

    /// A persisted `DataPipeline` record could not be parsed. Always
    /// fatal for the pipeline it belongs to; the orchestrator preserves
    /// the document's artifacts so an operator can recover by hand
    /// rather than silently discarding them.
    #[error("invalid pipeline data for '{index}/{document_id}': {reason}")]
    InvalidPipelineData { index: String, document_id: String, reason: String },

    /// Configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catch-all for invariants this codebase cannot name more
    /// precisely. Kept deliberately small; new call sites should prefer
    /// a named variant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient { message: message.into() }
    }

    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration { message: message.into() }
    }

    pub fn handler_failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFailed {
            step: step.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled { message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn invalid_pipeline_data(index: impl Into<String>, document_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPipelineData {
            index: index.into(),
            document_id: document_id.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a queue worker should re-deliver the message that
    /// produced this error, rather than routing it straight to the
    /// poison queue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Io(_) | Self::Storage(_))
    }

    /// Coarse category, used for metrics labels and log fields.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Transient { .. } | Self::Io(_) | Self::Storage(_) => ErrorCategory::Transient,
            Self::Orchestration { .. } | Self::InvalidPipelineData { .. } => ErrorCategory::Orchestration,
            Self::HandlerFailed { .. } => ErrorCategory::Handler,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Serialization(_) | Self::Configuration(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Coarse error category for metrics and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Transient,
    Orchestration,
    Handler,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Transient => "transient",
            Self::Orchestration => "orchestration",
            Self::Handler => "handler",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl From<std::io::Error> for MemoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_recoverable() {
        assert!(MemoryError::transient("lock busy").is_recoverable());
        assert!(MemoryError::Io("disk full".into()).is_recoverable());
    }

    #[test]
    fn validation_errors_are_not_recoverable() {
        assert!(!MemoryError::validation("tag", "reserved prefix").is_recoverable());
        assert!(!MemoryError::orchestration("superseded").is_recoverable());
    }

    #[test]
    fn category_matches_variant() {
        assert_eq!(MemoryError::not_found("document", "abc").category(), ErrorCategory::NotFound);
        assert_eq!(
            MemoryError::handler_failed("embed", "model unavailable").category(),
            ErrorCategory::Handler
        );
    }

    #[test]
    fn category_display() {
        assert_eq!(ErrorCategory::Transient.to_string(), "transient");
    }
}
