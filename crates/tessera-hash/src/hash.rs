//! The multihash value type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{HashError, HashType};

/// A self-describing digest.
///
/// Equality is byte equality of the multihash, i.e. digest and algorithm
/// must both match.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// The null hash: "no predecessor".
    pub const fn null() -> Self {
        Self(Vec::new())
    }

    /// True only for the null hash.
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from an algorithm code and raw digest bytes.
    pub(crate) fn from_parts(code: u64, digest: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(digest.len() + 4);
        put_uvarint(&mut bytes, code);
        put_uvarint(&mut bytes, digest.len() as u64);
        bytes.extend_from_slice(digest);
        Self(bytes)
    }

    /// Parse and validate multihash bytes.
    ///
    /// Empty input yields the null hash.
    pub fn from_multihash(bytes: Vec<u8>) -> Result<Self, HashError> {
        if bytes.is_empty() {
            return Ok(Self::null());
        }
        let (_, code_len) = read_uvarint(&bytes).ok_or(HashError::Malformed)?;
        let (len, len_len) = read_uvarint(&bytes[code_len..]).ok_or(HashError::Malformed)?;
        let header = code_len + len_len;
        if bytes.len() - header != len as usize {
            return Err(HashError::Malformed);
        }
        Ok(Self(bytes))
    }

    /// The multihash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The multihash algorithm code, `None` for the null hash.
    pub fn code(&self) -> Option<u64> {
        read_uvarint(&self.0).map(|(code, _)| code)
    }

    /// The algorithm, if it is one tessera knows.
    pub fn hash_type(&self) -> Option<HashType> {
        self.code().and_then(HashType::from_code)
    }

    /// The raw digest without the multihash prefix.
    pub fn digest(&self) -> &[u8] {
        let Some((_, code_len)) = read_uvarint(&self.0) else {
            return &[];
        };
        match read_uvarint(&self.0[code_len..]) {
            Some((_, len_len)) => &self.0[code_len + len_len..],
            None => &[],
        }
    }

    /// Short form for log lines.
    pub fn short(&self) -> String {
        let s = self.to_string();
        if s.len() > 10 {
            format!("{}...", &s[..10])
        } else {
            s
        }
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::null());
        }
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| HashError::InvalidEncoding(e.to_string()))?;
        Self::from_multihash(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn put_uvarint(buf: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        buf.push((n as u8 & 0x7f) | 0x80);
        n >>= 7;
    }
    buf.push(n as u8);
}

fn read_uvarint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut n = 0u64;
    for (i, b) in bytes.iter().enumerate().take(10) {
        n |= u64::from(b & 0x7f) << (7 * i);
        if b & 0x80 == 0 {
            return Some((n, i + 1));
        }
    }
    None
}
