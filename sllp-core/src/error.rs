//! Core error types.

use thiserror::Error;

/// Errors from registry administration.
///
/// These are reported to the embedding application and never travel on the
/// wire as such; group creation maps them onto wire codes through
/// [`CoreError::error_code`].
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid parameter: {reason}")]
    InvalidParam { reason: String },

    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("{table} table full: {max} entries")]
    TableFull { table: &'static str, max: usize },

    #[error("variable not found: {id}")]
    VariableNotFound { id: u8 },

    #[error("variable {id} listed twice in group")]
    DuplicateMember { id: u8 },
}

impl CoreError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        CoreError::InvalidParam {
            reason: reason.into(),
        }
    }

    /// Returns an error code suitable for protocol responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidParam { .. } => "INVALID_VALUE",
            CoreError::OutOfRange { .. } => "INVALID_PAYLOAD_SIZE",
            CoreError::TableFull { .. } => "INSUFFICIENT_MEMORY",
            CoreError::VariableNotFound { .. } => "INVALID_ID",
            CoreError::DuplicateMember { .. } => "INVALID_ID",
        }
    }
}
