use std::error::Error as StdError;

use thiserror::Error;

/// Tierscribe's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Tierscribe's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't
/// forced to adopt `anyhow` in their own public APIs. The recognizer binary
/// matches on `MissingParam` to produce the `ERROR:` line ELAN expects.
#[derive(Debug, Error)]
pub enum Error {
    /// A required ELAN parameter was absent from (or empty in) the input
    /// protocol.
    #[error("missing parameter '{0}'")]
    MissingParam(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self::Other(Box::new(err))
    }
}
