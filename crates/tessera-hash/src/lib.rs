//! Tessera content addressing
//!
//! Every chain link, DHT key and message fingerprint in tessera is a
//! [`Hash`]: a self-describing multihash (`varint(code) || varint(len) || digest`)
//! whose canonical string form is base58 (bitcoin alphabet).
//!
//! # Design
//!
//! The digest algorithm is chosen once, when a [`HashSpec`] is built from the
//! application's configured hash-type name. An unknown name fails at that
//! point with [`HashError::UnknownHashType`]; summing data with a built spec
//! can never fail.
//!
//! The distinguished null hash (empty multihash, string `""`) marks "no
//! predecessor" and cannot collide with a real digest, which always carries a
//! code prefix.

mod hash;
mod spec;

pub use hash::Hash;
pub use spec::{HashSpec, HashType};

use thiserror::Error;

/// Errors from hash configuration and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// The configured algorithm name is not supported.
    #[error("Unknown hash type: {0}")]
    UnknownHashType(String),

    /// The string is not valid base58.
    #[error("invalid hash string: {0}")]
    InvalidEncoding(String),

    /// The bytes are not a well-formed multihash.
    #[error("malformed multihash")]
    Malformed,
}

/// Hash arbitrary bytes with the default (sha2-256) spec.
pub fn sum_default(data: &[u8]) -> Hash {
    HashSpec::default().sum(data)
}
