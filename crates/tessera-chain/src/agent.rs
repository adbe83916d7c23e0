//! Agent identity and key material.
//!
//! An [`Agent`] is an explicit value carried into every component that signs
//! or verifies. Its network address, the [`PeerId`], is derived from the
//! public key so that any receiver can check a claimed author.

use std::fmt;
use std::fs;
use std::path::Path;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use tessera_hash::HashSpec;
use tracing::info;

use crate::entry::Entry;
use crate::error::{Error, Result};

const KEY_FILE: &str = "agent.key";

/// Opaque peer address.
///
/// The canonical string of the sha2-256 multihash of the peer's ed25519
/// public key. The empty id means "no source".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Derive the id for a public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self(HashSpec::default().sum(public_key).to_string())
    }

    /// The empty id.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// True if this id carries no source.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Content of the `%agent` system entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentEntry {
    pub identity: String,
    /// Hex-encoded ed25519 public key.
    pub public_key: String,
}

/// A signing identity.
pub struct Agent {
    identity: String,
    key: SigningKey,
}

impl Agent {
    /// Generate a fresh keypair.
    pub fn generate(identity: impl Into<String>) -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            identity: identity.into(),
            key: SigningKey::generate(&mut rng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(identity: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            identity: identity.into(),
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Load the agent key from `dir/agent.key`, creating it on first use.
    pub fn load_or_create(dir: impl AsRef<Path>, identity: impl Into<String>) -> Result<Self> {
        let path = dir.as_ref().join(KEY_FILE);
        let identity = identity.into();

        if path.exists() {
            let data = fs::read(&path)?;
            let seed: [u8; 32] = data
                .as_slice()
                .try_into()
                .map_err(|_| Error::InvalidKey(format!("{} is not a 32-byte seed", path.display())))?;
            Ok(Self::from_seed(identity, seed))
        } else {
            fs::create_dir_all(dir.as_ref())?;
            let agent = Self::generate(identity);
            fs::write(&path, agent.key.as_bytes())?;
            info!(path = %path.display(), peer = %agent.peer_id(), "Created agent key");
            Ok(agent)
        }
    }

    /// Human identity string.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Raw public key bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    /// Network address derived from the public key.
    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public_key_bytes())
    }

    /// Sign arbitrary bytes.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.key.sign(data).to_bytes().to_vec()
    }

    /// The `%agent` system entry for this agent.
    pub fn entry(&self) -> Result<Entry> {
        let content = AgentEntry {
            identity: self.identity.clone(),
            public_key: hex::encode(self.public_key_bytes()),
        };
        Ok(Entry::Json(serde_json::to_string(&content)?))
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .field("peer_id", &self.peer_id())
            .finish_non_exhaustive()
    }
}

/// Parse public key bytes.
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidKey(format!("public key has {} bytes", bytes.len())))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Verify an ed25519 signature.
pub fn verify_signature(key: &VerifyingKey, data: &[u8], signature: &[u8]) -> Result<()> {
    let sig = Signature::from_slice(signature).map_err(|_| Error::BadSignature)?;
    key.verify(data, &sig).map_err(|_| Error::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn peer_id_is_stable_for_seed() {
        let a = Agent::from_seed("alice", [1u8; 32]);
        let b = Agent::from_seed("alice-again", [1u8; 32]);
        assert_eq!(a.peer_id(), b.peer_id());
        assert!(a.peer_id().as_str().starts_with("Qm"));
        assert_ne!(a.peer_id(), Agent::from_seed("bob", [2u8; 32]).peer_id());
    }

    #[test]
    fn sign_and_verify() {
        let agent = Agent::generate("alice");
        let sig = agent.sign(b"payload");
        assert!(verify_signature(&agent.verifying_key(), b"payload", &sig).is_ok());
        assert!(matches!(
            verify_signature(&agent.verifying_key(), b"other", &sig),
            Err(Error::BadSignature)
        ));
    }

    #[test]
    fn key_file_is_reused() {
        let dir = tempdir().unwrap();
        let first = Agent::load_or_create(dir.path(), "alice").unwrap();
        let second = Agent::load_or_create(dir.path(), "alice").unwrap();
        assert_eq!(first.public_key_bytes(), second.public_key_bytes());
    }

    #[test]
    fn agent_entry_shape() {
        let agent = Agent::from_seed("alice", [3u8; 32]);
        let Entry::Json(json) = agent.entry().unwrap() else {
            panic!("agent entry should be json");
        };
        let parsed: AgentEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.identity, "alice");
        assert_eq!(parsed.public_key, hex::encode(agent.public_key_bytes()));
        assert!(json.contains("\"Identity\""));
    }
}
