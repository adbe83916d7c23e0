//! Chain error types.

use std::io;

use thiserror::Error;

/// Chain error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No header or entry with that hash.
    #[error("hash not found")]
    NotFound,

    /// `top()` on a chain with no entries.
    #[error("chain has no entries")]
    EmptyChain,

    /// A header does not link to the current top.
    #[error("header does not link to the chain top")]
    MalformedLink,

    /// Stored entry content does not digest to its header's entry link.
    #[error("entry does not match header entry link")]
    EntryMismatch,

    /// Header signature did not verify.
    #[error("invalid signature")]
    BadSignature,

    /// DNA requires a newer protocol version.
    #[error("Chain requires version {0}")]
    VersionMismatch(u32),

    /// Key material could not be loaded.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// A persisted record exceeds the frame limit.
    #[error("chain record too large: {0} bytes")]
    RecordTooLarge(usize),

    /// The chain file ends inside a record.
    #[error("unexpected end of chain file")]
    UnexpectedEof,

    /// Hash configuration error.
    #[error(transparent)]
    Hash(#[from] tessera_hash::HashError),

    /// Binary encoding error.
    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    /// JSON document error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Chain result type.
pub type Result<T> = std::result::Result<T, Error>;
