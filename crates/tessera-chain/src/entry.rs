//! Entry content and header records.

use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use tessera_hash::{Hash, HashSpec};

use crate::agent::{verify_signature, Agent};
use crate::error::Result;

/// Entry type of the DNA genesis entry.
pub const DNA_ENTRY_TYPE: &str = "%dna";
/// Entry type of the agent identity entry.
pub const AGENT_ENTRY_TYPE: &str = "%agent";
/// `LinkAction` value marking a link as deleted.
pub const DEL_LINK_ACTION: &str = "d";

/// True for the built-in `%`-prefixed entry types.
pub fn is_system_type(entry_type: &str) -> bool {
    entry_type == DNA_ENTRY_TYPE || entry_type == AGENT_ENTRY_TYPE
}

/// Unix time in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

/// How an entry type's content is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    String,
    Json,
    Links,
    Bytes,
}

/// Entry content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    /// Plain text.
    Text(String),
    /// A JSON document (also used for links entries).
    Json(String),
    /// Opaque bytes.
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl Entry {
    /// Canonical binary form; the digest input for the entry link.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Content digest.
    pub fn sum(&self, spec: &HashSpec) -> Result<Hash> {
        Ok(spec.sum(&self.marshal()?))
    }

    /// Text of a `Text` or `Json` entry.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Json(s) => Some(s),
            Self::Bytes(_) => None,
        }
    }

    /// Parse the entry as a links document.
    pub fn links(&self) -> Option<LinksEntry> {
        match self {
            Self::Json(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }

    /// True if the content fits the declared data format.
    pub fn matches_format(&self, format: DataFormat) -> bool {
        match (format, self) {
            (DataFormat::String, Self::Text(_)) => true,
            (DataFormat::Json, Self::Json(s)) => serde_json::from_str::<serde_json::Value>(s).is_ok(),
            (DataFormat::Links, Self::Json(_)) => self.links().is_some(),
            (DataFormat::Bytes, Self::Bytes(_)) => true,
            _ => false,
        }
    }
}

/// One `{Base, Link, Tag}` instruction to the DHT link index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Link {
    pub base: Hash,
    pub link: Hash,
    pub tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link_action: String,
}

impl Link {
    pub fn new(base: Hash, link: Hash, tag: impl Into<String>) -> Self {
        Self {
            base,
            link,
            tag: tag.into(),
            link_action: String::new(),
        }
    }

    /// A link that removes a previously added one.
    pub fn deletion(base: Hash, link: Hash, tag: impl Into<String>) -> Self {
        Self {
            link_action: DEL_LINK_ACTION.to_string(),
            ..Self::new(base, link, tag)
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.link_action == DEL_LINK_ACTION
    }
}

/// Content of a `links`-format entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinksEntry {
    pub links: Vec<Link>,
}

impl LinksEntry {
    pub fn to_entry(&self) -> Result<Entry> {
        Ok(Entry::Json(serde_json::to_string(self)?))
    }
}

/// A signed chain link.
///
/// The header's own identity is the digest of its marshalled bytes and is
/// not stored inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub entry_type: String,
    pub time: Timestamp,
    /// Previous header, null for genesis.
    pub header_link: Hash,
    /// Digest of the entry content.
    pub entry_link: Hash,
    /// Digest of the entry type's schema, if it has one.
    pub type_link: Option<Hash>,
    /// Signature over the entry link's multihash bytes.
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl Header {
    /// Build and sign a header for `entry`.
    pub fn new(
        spec: &HashSpec,
        agent: &Agent,
        time: Timestamp,
        entry_type: &str,
        entry: &Entry,
        header_link: Hash,
        type_link: Option<Hash>,
    ) -> Result<(Hash, Self)> {
        let entry_link = entry.sum(spec)?;
        let signature = agent.sign(entry_link.as_bytes());
        let header = Self {
            entry_type: entry_type.to_string(),
            time,
            header_link,
            entry_link,
            type_link,
            signature,
        };
        let hash = header.sum(spec)?;
        Ok((hash, header))
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// The header hash.
    pub fn sum(&self, spec: &HashSpec) -> Result<Hash> {
        Ok(spec.sum(&self.marshal()?))
    }

    /// Check the signature against the author's key.
    pub fn verify(&self, key: &VerifyingKey) -> Result<()> {
        verify_signature(key, self.entry_link.as_bytes(), &self.signature)
    }
}
