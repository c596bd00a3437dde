//! Server error types.

use crate::config::ConfigError;
use sllp_core::CoreError;
use sllp_protocol::ErrorCode;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry error: {0}")]
    Core(#[from] CoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("server shutting down")]
    ShuttingDown,
}

/// Maps a registry error onto the wire error code.
pub fn core_error_code(err: &CoreError) -> ErrorCode {
    match err.error_code() {
        "INVALID_ID" => ErrorCode::InvalidId,
        "INVALID_VALUE" => ErrorCode::InvalidValue,
        "INVALID_PAYLOAD_SIZE" => ErrorCode::InvalidPayloadSize,
        "INSUFFICIENT_MEMORY" => ErrorCode::InsufficientMemory,
        _ => ErrorCode::Internal,
    }
}
