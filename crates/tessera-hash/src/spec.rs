//! Digest algorithm selection.

use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::U32;
use blake2::Blake2b;
use sha2::Digest;

use crate::{Hash, HashError};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashType {
    /// SHA-1, 20 bytes. Fast and fixed-width; kept for compatibility.
    Sha1,
    /// SHA2-256, 32 bytes. The default.
    Sha2_256,
    /// BLAKE2b with a 256-bit output.
    Blake2b256,
    /// BLAKE3, 32 bytes.
    Blake3,
}

impl HashType {
    /// Multihash code for this algorithm.
    pub const fn code(self) -> u64 {
        match self {
            Self::Sha1 => 0x11,
            Self::Sha2_256 => 0x12,
            Self::Blake2b256 => 0xb220,
            Self::Blake3 => 0x1e,
        }
    }

    /// Configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha2_256 => "sha2-256",
            Self::Blake2b256 => "blake2b-256",
            Self::Blake3 => "blake3",
        }
    }

    /// Look up an algorithm by multihash code.
    pub fn from_code(code: u64) -> Option<Self> {
        [Self::Sha1, Self::Sha2_256, Self::Blake2b256, Self::Blake3]
            .into_iter()
            .find(|t| t.code() == code)
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashType {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(Self::Sha1),
            "sha2-256" => Ok(Self::Sha2_256),
            "blake2b-256" => Ok(Self::Blake2b256),
            "blake3" => Ok(Self::Blake3),
            other => Err(HashError::UnknownHashType(other.to_string())),
        }
    }
}

/// A validated algorithm choice, fixed for the lifetime of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSpec {
    hash_type: HashType,
}

impl HashSpec {
    /// Build a spec from a configured algorithm name.
    pub fn new(name: &str) -> Result<Self, HashError> {
        Ok(Self {
            hash_type: name.parse()?,
        })
    }

    /// Build a spec from a known algorithm.
    pub const fn with_type(hash_type: HashType) -> Self {
        Self { hash_type }
    }

    /// The configured algorithm.
    pub const fn hash_type(&self) -> HashType {
        self.hash_type
    }

    /// Digest `data`.
    pub fn sum(&self, data: &[u8]) -> Hash {
        let code = self.hash_type.code();
        match self.hash_type {
            HashType::Sha1 => Hash::from_parts(code, &sha1::Sha1::digest(data)),
            HashType::Sha2_256 => Hash::from_parts(code, &sha2::Sha256::digest(data)),
            HashType::Blake2b256 => Hash::from_parts(code, &Blake2b::<U32>::digest(data)),
            HashType::Blake3 => Hash::from_parts(code, blake3::hash(data).as_bytes()),
        }
    }
}

impl Default for HashSpec {
    fn default() -> Self {
        Self::with_type(HashType::Sha2_256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unknown_hash_type() {
        let err = HashSpec::new("bogus").unwrap_err();
        assert_eq!(err.to_string(), "Unknown hash type: bogus");
    }

    #[test]
    fn golden_fixed_width() {
        let spec = HashSpec::new("sha1").unwrap();
        let h = spec.sum(b"test data");
        assert_eq!(h.to_string(), "5duC28CW416wX42vses7TeTeRYwku9");
    }

    #[test]
    fn golden_variable_width() {
        let spec = HashSpec::new("blake2b-256").unwrap();
        let h = spec.sum(b"test data");
        assert_eq!(
            h.to_string(),
            "2DrjgbL49zKmX4P7UgdopSCC7MhfVUySNbRHBQzdDuXgaJSNEg"
        );
    }

    #[test]
    fn golden_default() {
        let h = HashSpec::default().sum(b"test data");
        assert_eq!(h.to_string(), "QmY8Mzg9F69e5P9AoQPYat655HEhc1TVGs11tmfNSzkqh2");
    }

    #[test]
    fn blake3_is_tagged() {
        let h = HashSpec::with_type(HashType::Blake3).sum(b"x");
        assert_eq!(h.hash_type(), Some(HashType::Blake3));
        assert_eq!(h.digest(), blake3::hash(b"x").as_bytes());
    }

    proptest! {
        #[test]
        fn sum_is_deterministic_and_parses_back(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            for t in [HashType::Sha1, HashType::Sha2_256, HashType::Blake2b256, HashType::Blake3] {
                let spec = HashSpec::with_type(t);
                let a = spec.sum(&data);
                prop_assert_eq!(&a, &spec.sum(&data));
                prop_assert!(!a.is_null());
                prop_assert_eq!(a.to_string().parse::<Hash>().unwrap(), a);
            }
        }

        #[test]
        fn algorithms_never_compare_equal(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let a = HashSpec::with_type(HashType::Sha2_256).sum(&data);
            let b = HashSpec::with_type(HashType::Blake3).sum(&data);
            // same width, different algorithm tag
            prop_assert_ne!(a, b);
        }
    }
}
