//! Request and response payloads.

use serde::{Deserialize, Serialize};
use tessera_chain::{verifying_key_from_bytes, Entry, Header, PeerId};
use tessera_hash::{Hash, HashSpec};

use crate::error::{ErrorResponse, ResponseError};
use crate::message::Message;
use crate::status::{Status, StatusMask};

/// PUT_REQUEST: store the entry with this hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutReq {
    pub hash: Hash,
}

/// DEL_REQUEST: mark `hash` deleted; `by` is the deleting entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelReq {
    pub hash: Hash,
    pub by: Hash,
}

/// MOD_REQUEST: `hash` is replaced by `new_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModReq {
    pub hash: Hash,
    pub new_hash: Hash,
}

/// GET_REQUEST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReq {
    pub hash: Hash,
    pub status_mask: StatusMask,
}

/// LINK_REQUEST: apply the links declared by entry `links` onto `base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReq {
    pub base: Hash,
    pub links: Hash,
}

/// GETLINK_REQUEST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkQuery {
    pub base: Hash,
    pub tag: String,
    pub status_mask: StatusMask,
}

/// VALIDATE_*_REQUEST: resupply validation inputs for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateQuery {
    pub hash: Hash,
}

/// GOSSIP_REQUEST: "send me your changes after `your_idx`; I am at `my_idx`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipReq {
    pub my_idx: u64,
    pub your_idx: u64,
}

/// One accepted change request in a peer's change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Put {
    pub idx: u64,
    pub msg: Message,
}

/// Gossip response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gossip {
    pub puts: Vec<Put>,
}

/// GET_REQUEST response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResp {
    pub entry: Entry,
    pub entry_type: String,
    pub status: Status,
    /// Forward pointer for modified records.
    pub replaced_by: Option<Hash>,
}

/// One link target and the peer that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedHash {
    pub hash: Hash,
    pub source: PeerId,
}

/// GETLINK_REQUEST response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkQueryResp {
    pub links: Vec<TaggedHash>,
}

/// Everything a receiver needs to validate an entry it did not author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPackage {
    pub entry_type: String,
    pub entry: Entry,
    pub header: Header,
    /// Author's ed25519 public key.
    #[serde(with = "serde_bytes")]
    pub author: Vec<u8>,
}

impl ValidationPackage {
    /// The author's peer id.
    pub fn author_id(&self) -> Result<PeerId, ResponseError> {
        let key: [u8; 32] = self
            .author
            .as_slice()
            .try_into()
            .map_err(|_| ResponseError::Unknown("malformed author key".into()))?;
        Ok(PeerId::from_public_key(&key))
    }

    /// Check the package is authentic for `hash`.
    ///
    /// The entry must digest to `hash`, the header must commit to it and be
    /// signed by the author, and when `source` is given the author must be
    /// that peer.
    pub fn verify(
        &self,
        spec: &HashSpec,
        hash: &Hash,
        source: Option<&PeerId>,
    ) -> Result<(), ResponseError> {
        let fail = |reason: &str| ResponseError::ValidationFailed(reason.to_string());

        if let Some(source) = source {
            if &self.author_id()? != source {
                return Err(fail("package author does not match source"));
            }
        }
        let digest = self
            .entry
            .sum(spec)
            .map_err(|e| ResponseError::Unknown(e.to_string()))?;
        if &digest != hash {
            return Err(fail("entry does not match requested hash"));
        }
        if &self.header.entry_link != hash {
            return Err(fail("header does not commit to entry"));
        }
        if self.header.entry_type != self.entry_type {
            return Err(fail("header entry type mismatch"));
        }
        let key = verifying_key_from_bytes(&self.author)
            .map_err(|e| ResponseError::Unknown(e.to_string()))?;
        self.header
            .verify(&key)
            .map_err(|_| fail("invalid header signature"))
    }
}

/// All message payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Empty,
    Text(String),
    Put(PutReq),
    Del(DelReq),
    Mod(ModReq),
    Get(GetReq),
    Link(LinkReq),
    GetLink(LinkQuery),
    Validate(ValidateQuery),
    Gossip(GossipReq),
    Error(ErrorResponse),
    Record(GetResp),
    Links(LinkQueryResp),
    Package(ValidationPackage),
    GossipPuts(Gossip),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_chain::{Agent, Timestamp};

    fn package(agent: &Agent) -> (Hash, ValidationPackage) {
        let spec = HashSpec::default();
        let entry = Entry::Text("2".into());
        let (_, header) =
            Header::new(&spec, agent, Timestamp(1), "evenNumbers", &entry, Hash::null(), None).unwrap();
        let hash = header.entry_link.clone();
        let pkg = ValidationPackage {
            entry_type: "evenNumbers".into(),
            entry,
            header,
            author: agent.public_key_bytes().to_vec(),
        };
        (hash, pkg)
    }

    #[test]
    fn authentic_package_verifies() {
        let agent = Agent::from_seed("a", [4u8; 32]);
        let (hash, pkg) = package(&agent);
        pkg.verify(&HashSpec::default(), &hash, Some(&agent.peer_id())).unwrap();
        pkg.verify(&HashSpec::default(), &hash, None).unwrap();
    }

    #[test]
    fn wrong_source_is_rejected() {
        let agent = Agent::from_seed("a", [4u8; 32]);
        let (hash, pkg) = package(&agent);
        let other = Agent::from_seed("b", [5u8; 32]).peer_id();
        assert_eq!(
            pkg.verify(&HashSpec::default(), &hash, Some(&other)),
            Err(ResponseError::ValidationFailed("package author does not match source".into()))
        );
    }

    #[test]
    fn tampered_entry_is_rejected() {
        let agent = Agent::from_seed("a", [4u8; 32]);
        let (hash, mut pkg) = package(&agent);
        pkg.entry = Entry::Text("4".into());
        assert!(pkg.verify(&HashSpec::default(), &hash, None).is_err());
    }

    #[test]
    fn forged_author_is_rejected() {
        let agent = Agent::from_seed("a", [4u8; 32]);
        let (hash, mut pkg) = package(&agent);
        let mallory = Agent::from_seed("m", [6u8; 32]);
        pkg.author = mallory.public_key_bytes().to_vec();
        assert_eq!(
            pkg.verify(&HashSpec::default(), &hash, None),
            Err(ResponseError::ValidationFailed("invalid header signature".into()))
        );
    }
}
