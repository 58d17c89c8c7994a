//! Error types for the public interface of this library.
//!
//! Internally, functions return `Res<T>` which is an `anyhow::Result`. Functions that are exposed
//! to the binary (commands) return `Result<T>`, which carries an `ErrorType` so that callers can
//! tell an invalid argument apart from a failed remote call or a half-finished apply.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies what went wrong.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// A required parameter was missing or malformed. Raised before any mutation.
    InvalidArgument,
    /// A spreadsheet could not be resolved or created, or something we needed was gone.
    NotFound,
    /// A call to the worksheet store failed.
    Remote,
    /// A call to the worksheet store did not complete in time.
    Timeout,
    /// An apply failed after the original worksheet had been deleted. The data survives in the
    /// backup worksheet named in the message.
    PartialApply,
    /// The configuration or home directory is missing or invalid.
    Config,
    /// Authentication with Google failed.
    Auth,
    /// Local file or stream IO failed.
    Io,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// The public error type. It wraps an `anyhow::Error` so that the full context chain is preserved.
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Display) -> Self {
        Self::new(ErrorType::InvalidArgument, anyhow::anyhow!("{message}"))
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// Re-classify the error, keeping its message and context chain.
    pub(crate) fn with_type(self, error_type: ErrorType) -> Self {
        Self {
            error_type,
            source: self.source,
        }
    }

    /// Add context to the error, keeping its classification.
    pub(crate) fn context(self, context: impl Display + Send + Sync + 'static) -> Self {
        Self {
            error_type: self.error_type,
            source: self.source.context(context),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:#}", self.error_type, self.source)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorType::Internal, e)
    }
}

/// Converts an internal `Res<T>` into a public `Result<T>` with the given classification.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}
