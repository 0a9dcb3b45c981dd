//! Error types for docmap
//!
//! This module defines the error taxonomy shared by the diff engine and the
//! dereference scheduler. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.
//!
//! None of these errors are retried internally: they propagate synchronously
//! to the caller of the entry point that produced them. An empty update set
//! is never an error, it signals "nothing to persist".

use crate::path::PathError;
use thiserror::Error;

/// Result type alias for docmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for docmap
#[derive(Debug, Error)]
pub enum Error {
    /// A field filter rejected a value
    ///
    /// Aborts the current diff computation entirely; no partial update set
    /// is returned.
    #[error("Validation failed for field '{field}': {reason}")]
    Validation {
        /// Top-level field whose filter rejected the value
        field: String,
        /// Reason reported by the filter
        reason: String,
    },

    /// A nested field switched between array and document shape
    #[error("Structural conflict at '{path}': arrays and documents are not compatible")]
    StructuralConflict {
        /// Dotted path of the conflicting field
        path: String,
    },

    /// A batched lookup returned a different number of documents than requested
    #[error("Dereferencing error for '{target_type}': store replied {actual} documents, expected {expected}")]
    ReferenceIntegrity {
        /// Model type (or collection, for legacy references) being resolved
        target_type: String,
        /// Number of distinct ids requested
        expected: usize,
        /// Number of documents returned
        actual: usize,
    },

    /// The store connector does not expose a feature the operation needs
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// Programming defect (unknown model type, identity mismatch, ...)
    #[error("Misuse: {0}")]
    Misuse(String),

    /// Tree addressing failure
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// A lifecycle hook aborted the operation
    #[error("Hook '{event}' failed: {reason}")]
    Hook {
        /// Event name
        event: String,
        /// Reason reported by the hook
        reason: String,
    },

    /// Store layer error
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Build a validation error for `field`
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Build a structural conflict error for `path`
    pub fn structural_conflict(path: impl Into<String>) -> Self {
        Error::StructuralConflict { path: path.into() }
    }

    /// Build a misuse error
    pub fn misuse(msg: impl Into<String>) -> Self {
        Error::Misuse(msg.into())
    }

    /// True for errors caused by user data rather than programming defects
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::Hook { .. })
    }
}
