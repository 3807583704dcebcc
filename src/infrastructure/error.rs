//! Infrastructure-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;

/// Failure of the external address-creation capability.
///
/// A creator must report one of these instead of returning an empty address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreationError {
    #[error("service rejected the request: {message}")]
    Rejected { message: String },

    #[error("service returned no address")]
    NoAddress,

    #[error("service returned an unusable address: {0}")]
    InvalidAddress(String),

    #[error("service unreachable: {message}")]
    Unreachable { message: String },

    #[error("no response within {seconds}s")]
    Timeout { seconds: u64 },
}
