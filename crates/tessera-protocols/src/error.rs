//! Error types for tessera-protocols.
//!
//! Two kinds live here. [`Error`] is local: framing and decoding failures
//! that never cross the network. [`ResponseError`] is what a handler reports
//! to a remote caller; it always travels as an [`ErrorResponse`] with a
//! stable [`ErrorCode`].

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::MAX_FRAME_SIZE;

/// Result type for local protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Local framing and decoding errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A message type code outside the known set.
    #[error("unknown message type: {0}")]
    UnknownMsgType(u8),

    /// A frame larger than the codec accepts.
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    /// The stream ended before a full frame arrived.
    #[error("stream closed")]
    Closed,

    /// Malformed message bytes.
    #[error("decode error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Stable numeric error codes carried in an ERROR_RESPONSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
#[repr(u8)]
pub enum ErrorCode {
    Unknown = 0,
    HashNotFound = 1,
    HashDeleted = 2,
    HashModified = 3,
    HashRejected = 4,
    LinkNotFound = 5,
    ValidationFailed = 6,
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        code as u8
    }
}

impl From<u8> for ErrorCode {
    /// Codes from newer peers collapse to `Unknown`.
    fn from(n: u8) -> Self {
        match n {
            1 => Self::HashNotFound,
            2 => Self::HashDeleted,
            3 => Self::HashModified,
            4 => Self::HashRejected,
            5 => Self::LinkNotFound,
            6 => Self::ValidationFailed,
            _ => Self::Unknown,
        }
    }
}

/// Body of an ERROR_RESPONSE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

/// Errors reported by a peer's handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
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

    /// The interpreter's rejection reason, verbatim.
    #[error("{0}")]
    ValidationFailed(String),

    #[error("message must have a source")]
    MissingSource,

    #[error("message type {msg_type} not in {protocol} protocol")]
    UnsupportedType { msg_type: u8, protocol: String },

    /// Anything else; the text is preserved.
    #[error("{0}")]
    Unknown(String),
}

impl ResponseError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::HashNotFound => ErrorCode::HashNotFound,
            Self::HashDeleted => ErrorCode::HashDeleted,
            Self::HashModified => ErrorCode::HashModified,
            Self::HashRejected => ErrorCode::HashRejected,
            Self::LinkNotFound => ErrorCode::LinkNotFound,
            Self::ValidationFailed(_) => ErrorCode::ValidationFailed,
            Self::MissingSource | Self::UnsupportedType { .. } | Self::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Encode for the wire.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

impl From<ErrorResponse> for ResponseError {
    fn from(resp: ErrorResponse) -> Self {
        match resp.code {
            ErrorCode::HashNotFound => Self::HashNotFound,
            ErrorCode::HashDeleted => Self::HashDeleted,
            ErrorCode::HashModified => Self::HashModified,
            ErrorCode::HashRejected => Self::HashRejected,
            ErrorCode::LinkNotFound => Self::LinkNotFound,
            ErrorCode::ValidationFailed => Self::ValidationFailed(resp.message),
            ErrorCode::Unknown => Self::Unknown(resp.message),
        }
    }
}
