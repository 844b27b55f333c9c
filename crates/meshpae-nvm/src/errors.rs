//! Error types for NVM record decoding.

use thiserror::Error;

/// Result alias for record operations.
pub type Result<T> = std::result::Result<T, NvmError>;

/// Errors raised while decoding a persisted record.
///
/// Every variant means the stored bytes cannot be trusted. Callers fall back
/// to an empty or default value and log the event rather than aborting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NvmError {
    /// Stored length does not match the fixed payload size for the tag, or
    /// the buffer ends before the payload does.
    ///
    /// This is the usual signature of a partially written storage page.
    #[error("corrupt record (tag {tag}): expected {expected} payload bytes, found {actual}")]
    NvmCorrupt {
        /// Tag read from the envelope
        tag: u16,
        /// Fixed payload size for that tag
        expected: usize,
        /// Length claimed by the envelope or available in the buffer
        actual: usize,
    },

    /// Buffer too short to hold even the TLV envelope.
    #[error("record too short: need {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum size required
        expected: usize,
        /// Actual buffer size
        actual: usize,
    },

    /// Envelope carries a different tag than the record being decoded.
    #[error("unexpected record tag: expected {expected}, found {actual}")]
    UnexpectedTag {
        /// Tag of the requested record type
        expected: u16,
        /// Tag found in the envelope
        actual: u16,
    },

    /// A field holds a value no encoder would produce.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

impl NvmError {
    /// Shorthand for [`NvmError::InvalidField`].
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField { field, reason: reason.into() }
    }
}
