//! Error types for pdfstitch.
//!
//! Every fallible operation in the crate returns [`StitchError`]. The
//! variants follow the failure classes a caller has to tell apart:
//!
//! - **Validation**: the request is malformed and nothing was touched
//! - **NotFound**: a single-target reference does not exist
//! - **Codec**: a source could not be parsed or the output not serialized
//! - **Io**: blob storage failed
//! - **Unauthorized**: a session asked for something it does not own

use std::io;
use std::time::Duration;

/// Result type alias for pdfstitch operations.
pub type Result<T> = std::result::Result<T, StitchError>;

/// Coarse classification of a [`StitchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// PDF parse or serialize failure.
    Codec,
    /// Blob read/write failure.
    Io,
    /// Ownership check failed.
    Unauthorized,
    /// Job could not run to completion (worker panic, pool closed, timeout).
    Job,
    /// Configuration rejected at startup.
    Config,
}

/// Main error type for pdfstitch operations.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    /// The request was rejected before any I/O.
    #[error("Invalid request: {reason}")]
    Validation {
        /// Human readable reason.
        reason: String,
    },

    /// A referenced file, page or output does not exist.
    #[error("Not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The PDF library could not parse a source or write the output.
    #[error("Failed to process PDF: {reason}")]
    Codec {
        /// Reason reported by the codec.
        reason: String,
    },

    /// Blob storage failed.
    #[error("Storage I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// The requesting session does not own the resource.
    #[error("Permission denied: {reason}")]
    Unauthorized {
        /// Why access was refused.
        reason: String,
    },

    /// A merge job died before producing a result.
    #[error("Merge job failed: {reason}")]
    JobFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The caller stopped waiting for a merge result.
    #[error("Timed out after {waited:?} waiting for merge result")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },
}

impl From<lopdf::Error> for StitchError {
    fn from(err: lopdf::Error) -> Self {
        Self::codec(err.to_string())
    }
}

impl StitchError {
    /// Create a Validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a Codec error.
    pub fn codec(reason: impl Into<String>) -> Self {
        Self::Codec {
            reason: reason.into(),
        }
    }

    /// Create an Unauthorized error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a JobFailed error.
    pub fn job_failed(reason: impl Into<String>) -> Self {
        Self::JobFailed {
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Codec { .. } => ErrorKind::Codec,
            Self::Io { .. } => ErrorKind::Io,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::JobFailed { .. } | Self::Timeout { .. } => ErrorKind::Job,
            Self::InvalidConfig { .. } => ErrorKind::Config,
        }
    }

    /// Check if the caller is at fault (bad input or wrong session).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Unauthorized
        )
    }

    /// Status code a transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Timeout { .. } => 504,
            Self::Codec { .. }
            | Self::Io { .. }
            | Self::JobFailed { .. }
            | Self::InvalidConfig { .. } => 500,
        }
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 1,
            Self::InvalidConfig { .. } => 1,
            Self::NotFound { .. } => 2,
            Self::Codec { .. } => 3,
            Self::Unauthorized { .. } => 4,
            Self::Io { .. } => 5,
            Self::JobFailed { .. } => 6,
            Self::Timeout { .. } => 6,
        }
    }
}
