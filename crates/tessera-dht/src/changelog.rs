//! Change-request log.
//!
//! Every change request the store has processed, accepted or rejected, in
//! arrival order. Indices are global and start at 1; gossip partners ask
//! for "everything after index N".

use std::collections::HashMap;

use tessera_hash::Hash;
use tessera_protocols::{Message, Put};

#[derive(Debug, Default)]
pub struct ChangeLog {
    puts: Vec<Put>,
    /// fingerprint -> index
    seen: HashMap<Hash, u64>,
    /// key -> indices touching it
    by_key: HashMap<Hash, Vec<u64>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a change with this fingerprint was already processed.
    pub fn seen(&self, fingerprint: &Hash) -> bool {
        self.seen.contains_key(fingerprint)
    }

    /// Record a processed change, returning its index.
    pub fn append(&mut self, fingerprint: Hash, key: &Hash, msg: Message) -> u64 {
        self.append_keys(fingerprint, &[key], msg)
    }

    /// Record a change that touched several keys under one index.
    pub fn append_keys(&mut self, fingerprint: Hash, keys: &[&Hash], msg: Message) -> u64 {
        let idx = self.puts.len() as u64 + 1;
        self.puts.push(Put { idx, msg });
        self.seen.insert(fingerprint, idx);
        for key in keys {
            let indices = self.by_key.entry((*key).clone()).or_default();
            if indices.last() != Some(&idx) {
                indices.push(idx);
            }
        }
        idx
    }

    /// Index of the newest change, 0 when empty.
    pub fn current(&self) -> u64 {
        self.puts.len() as u64
    }

    /// Up to `limit` changes after index `idx`.
    pub fn since(&self, idx: u64, limit: usize) -> Vec<Put> {
        let start = (idx as usize).min(self.puts.len());
        self.puts[start..].iter().take(limit).cloned().collect()
    }

    /// Indices of changes that touched `key`.
    pub fn history(&self, key: &Hash) -> &[u64] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}
