/*!
 * Error Types
 * Closed outcome codes shared by every container operation, with thiserror,
 * miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::backend::BackendError;

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Numeric outcome code. Zero always means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum ErrorCode {
    None = 0,
    Unknown = 1,
    MoreDataAvailable = 2,
    OutOfBounds = 3,
    InvalidKey = 4,
}

impl ErrorCode {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == ErrorCode::None
    }

    /// Collapse any operation result into its code
    pub fn of<T>(result: &ContainerResult<T>) -> Self {
        match result {
            Ok(_) => ErrorCode::None,
            Err(e) => e.code(),
        }
    }
}

impl TryFrom<u32> for ErrorCode {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ErrorCode::None),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::MoreDataAvailable),
            3 => Ok(ErrorCode::OutOfBounds),
            4 => Ok(ErrorCode::InvalidKey),
            other => Err(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::None => "none",
            ErrorCode::Unknown => "unknown",
            ErrorCode::MoreDataAvailable => "more_data_available",
            ErrorCode::OutOfBounds => "out_of_bounds",
            ErrorCode::InvalidKey => "invalid_key",
        };
        f.write_str(name)
    }
}

/// Container operation errors
///
/// Every failure crossing the public boundary is one of these variants; the
/// payloads are diagnostic context only and never carry results.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ContainerError {
    #[error("Container operation failed: {0}")]
    #[diagnostic(
        code(container::unknown),
        help("The backend or the host rejected the request. Check the container logs.")
    )]
    Unknown(String),

    #[error("Output buffer too small: {required} entries required, {provided} provided")]
    #[diagnostic(
        code(container::more_data_available),
        help("Retry with a buffer of at least the required length.")
    )]
    MoreDataAvailable { required: usize, provided: usize },

    #[error("Index {index} out of bounds ({available} units available)")]
    #[diagnostic(
        code(container::out_of_bounds),
        help("Use -1 for the aggregate or an index below the available unit count.")
    )]
    OutOfBounds { index: i64, available: usize },

    #[error("Invalid key: {0}")]
    #[diagnostic(
        code(container::invalid_key),
        help("The handle was destroyed, or the key is not recognised.")
    )]
    InvalidKey(String),
}

impl ContainerError {
    pub fn unknown(msg: impl Into<String>) -> Self {
        ContainerError::Unknown(msg.into())
    }

    pub fn invalid_key(key: impl Into<String>) -> Self {
        ContainerError::InvalidKey(key.into())
    }

    /// Closed outcome code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            ContainerError::Unknown(_) => ErrorCode::Unknown,
            ContainerError::MoreDataAvailable { .. } => ErrorCode::MoreDataAvailable,
            ContainerError::OutOfBounds { .. } => ErrorCode::OutOfBounds,
            ContainerError::InvalidKey(_) => ErrorCode::InvalidKey,
        }
    }
}

impl From<BackendError> for ContainerError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NoSuchCore { index, available } => ContainerError::OutOfBounds {
                index: i64::from(index),
                available,
            },
            other => ContainerError::Unknown(other.to_string()),
        }
    }
}
