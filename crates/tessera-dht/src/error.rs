//! DHT error types.

use tessera_protocols::{ResponseError, Status};
use thiserror::Error;

/// DHT error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("hash not found")]
    HashNotFound,

    #[error("hash deleted")]
    HashDeleted,

    #[error("hash modified")]
    HashModified,

    #[error("hash rejected")]
    HashRejected,

    #[error("link not found")]
    LinkNotFound,

    /// The validation rule refused the change; reason verbatim.
    #[error("{0}")]
    ValidationFailed(String),

    /// Package does not authenticate the entry it claims.
    #[error("bad validation package: {0}")]
    BadPackage(String),

    /// Structural failure in the gate (unknown entry type, missing nucleus).
    #[error(transparent)]
    Nucleus(tessera_nucleus::Error),

    #[error(transparent)]
    Protocol(#[from] tessera_protocols::Error),
}

impl Error {
    /// The error reported when a record exists with an unwanted status.
    pub fn for_status(status: Status) -> Self {
        match status {
            Status::Modified => Self::HashModified,
            Status::Deleted => Self::HashDeleted,
            Status::Rejected => Self::HashRejected,
            Status::Live => Self::HashNotFound,
        }
    }
}

impl From<tessera_nucleus::Error> for Error {
    fn from(err: tessera_nucleus::Error) -> Self {
        match err {
            tessera_nucleus::Error::ValidationFailed(reason) => Self::ValidationFailed(reason),
            other => Self::Nucleus(other),
        }
    }
}

impl From<&Error> for ResponseError {
    fn from(err: &Error) -> Self {
        match err {
            Error::HashNotFound => Self::HashNotFound,
            Error::HashDeleted => Self::HashDeleted,
            Error::HashModified => Self::HashModified,
            Error::HashRejected => Self::HashRejected,
            Error::LinkNotFound => Self::LinkNotFound,
            Error::ValidationFailed(reason) => Self::ValidationFailed(reason.clone()),
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<Error> for ResponseError {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

/// DHT result type.
pub type Result<T> = std::result::Result<T, Error>;
