//! Nucleus error types.

use thiserror::Error;

/// Nucleus error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unknown zome: {0}")]
    UnknownZome(String),

    #[error("unknown exposed function: {0}")]
    UnknownFunction(String),

    /// The function's exposure does not include the calling context.
    #[error("function not available")]
    FunctionNotExposed,

    /// The DNA names a zome that has no installed interpreter.
    #[error("no nucleus installed for zome: {0}")]
    NoNucleus(String),

    #[error("zome {zome} declares nucleus type {declared} but {installed} is installed")]
    NucleusTypeMismatch {
        zome: String,
        declared: String,
        installed: String,
    },

    #[error("unknown entry type: {0}")]
    UnknownEntryType(String),

    /// Rejection reason from the interpreter, verbatim.
    #[error("{0}")]
    ValidationFailed(String),

    /// Error returned by a zome function, verbatim.
    #[error("{0}")]
    CallFailed(String),
}

impl Error {
    /// True for rejections produced by validation rules.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ValidationFailed(_))
    }
}

/// Nucleus result type.
pub type Result<T> = std::result::Result<T, Error>;
