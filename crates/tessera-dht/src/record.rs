//! Stored records and link entries.

use tessera_chain::{Entry, Header, PeerId};
use tessera_hash::Hash;
use tessera_protocols::{GetResp, Status, ValidationPackage};

/// An entry held by this replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub entry_type: String,
    pub entry: Entry,
    pub header: Header,
    /// Author public key.
    pub author: Vec<u8>,
    pub status: Status,
    /// Set when the record was modified.
    pub replaced_by: Option<Hash>,
    /// Peers that have put this entry.
    pub sources: Vec<PeerId>,
}

impl Record {
    pub(crate) fn from_package(pkg: &ValidationPackage, status: Status, source: PeerId) -> Self {
        Self {
            entry_type: pkg.entry_type.clone(),
            entry: pkg.entry.clone(),
            header: pkg.header.clone(),
            author: pkg.author.clone(),
            status,
            replaced_by: None,
            sources: vec![source],
        }
    }

    pub(crate) fn add_source(&mut self, source: &PeerId) {
        if !source.is_empty() && !self.sources.contains(source) {
            self.sources.push(source.clone());
        }
    }

    /// Inputs another peer needs to validate this record.
    pub fn package(&self) -> ValidationPackage {
        ValidationPackage {
            entry_type: self.entry_type.clone(),
            entry: self.entry.clone(),
            header: self.header.clone(),
            author: self.author.clone(),
        }
    }

    /// GET response body.
    pub fn to_response(&self) -> GetResp {
        GetResp {
            entry: self.entry.clone(),
            entry_type: self.entry_type.clone(),
            status: self.status,
            replaced_by: self.replaced_by.clone(),
        }
    }
}

/// One target in the link index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub link: Hash,
    pub status: Status,
    pub source: PeerId,
}
