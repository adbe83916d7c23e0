//! The source chain.
//!
//! An append-only sequence of (header, entry) pairs owned by one agent.
//! Each header links to the previous header's digest; the genesis header
//! links to the null hash.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use ed25519_dalek::VerifyingKey;
use tessera_hash::{Hash, HashSpec};
use tracing::{debug, info};

use crate::agent::Agent;
use crate::entry::{Entry, Header, Timestamp};
use crate::error::{Error, Result};
use crate::log::{ChainLog, LogRecord};

/// One link as seen by a traversal.
#[derive(Debug, Clone, Copy)]
pub struct ChainLink<'a> {
    pub hash: &'a Hash,
    pub header: &'a Header,
    pub entry: &'a Entry,
}

/// An agent's source chain.
#[derive(Debug)]
pub struct Chain {
    spec: HashSpec,
    hashes: Vec<Hash>,
    headers: Vec<Header>,
    entries: Vec<Entry>,
    /// header hash -> position
    by_header: HashMap<Hash, usize>,
    /// entry link -> position of the first header carrying it
    by_entry: HashMap<Hash, usize>,
    rejected: HashSet<Hash>,
    log: Option<ChainLog>,
}

impl Chain {
    /// Empty in-memory chain.
    pub fn new(spec: HashSpec) -> Self {
        Self {
            spec,
            hashes: Vec::new(),
            headers: Vec::new(),
            entries: Vec::new(),
            by_header: HashMap::new(),
            by_entry: HashMap::new(),
            rejected: HashSet::new(),
            log: None,
        }
    }

    /// Open a file-backed chain, replaying any existing records.
    pub fn open(path: impl Into<PathBuf>, spec: HashSpec) -> Result<Self> {
        let log = ChainLog::new(path);
        let mut chain = Self::new(spec);
        for record in log.read_all()? {
            match record {
                LogRecord::Append { header, entry } => {
                    let hash = header.sum(&spec)?;
                    chain.push(hash, header, entry)?;
                }
                LogRecord::Reject { header_hash } => {
                    chain.rejected.insert(header_hash);
                }
            }
        }
        info!(path = %log.path().display(), len = chain.len(), "Opened chain");
        chain.log = Some(log);
        Ok(chain)
    }

    pub fn spec(&self) -> &HashSpec {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Build and sign a header that links to the current top.
    pub fn prepare_header(
        &self,
        agent: &Agent,
        time: Timestamp,
        entry_type: &str,
        entry: &Entry,
        type_link: Option<Hash>,
    ) -> Result<(Hash, Header)> {
        let prev = self.hashes.last().cloned().unwrap_or_default();
        Header::new(&self.spec, agent, time, entry_type, entry, prev, type_link)
    }

    /// Append a prepared header and its entry.
    pub fn add_entry(&mut self, hash: Hash, header: Header, entry: Entry) -> Result<()> {
        if let Some(log) = &self.log {
            self.check_link(&header)?;
            log.append(&LogRecord::Append {
                header: header.clone(),
                entry: entry.clone(),
            })?;
        }
        self.push(hash, header, entry)
    }

    /// Prepare and append in one step.
    pub fn new_entry(
        &mut self,
        agent: &Agent,
        time: Timestamp,
        entry_type: &str,
        entry: Entry,
    ) -> Result<(Hash, Header)> {
        let (hash, header) = self.prepare_header(agent, time, entry_type, &entry, None)?;
        self.add_entry(hash.clone(), header.clone(), entry)?;
        Ok((hash, header))
    }

    fn check_link(&self, header: &Header) -> Result<()> {
        let top = self.hashes.last().cloned().unwrap_or_default();
        if header.header_link != top {
            return Err(Error::MalformedLink);
        }
        Ok(())
    }

    fn push(&mut self, hash: Hash, header: Header, entry: Entry) -> Result<()> {
        self.check_link(&header)?;
        let idx = self.headers.len();
        debug!(
            idx,
            entry_type = %header.entry_type,
            header = %hash.short(),
            "Chain append"
        );
        self.by_header.insert(hash.clone(), idx);
        self.by_entry.entry(header.entry_link.clone()).or_insert(idx);
        self.hashes.push(hash);
        self.headers.push(header);
        self.entries.push(entry);
        Ok(())
    }

    /// Header by its hash.
    pub fn get(&self, header_hash: &Hash) -> Result<&Header> {
        self.by_header
            .get(header_hash)
            .map(|&i| &self.headers[i])
            .ok_or(Error::NotFound)
    }

    /// Entry content and type name by entry link.
    pub fn get_entry(&self, entry_link: &Hash) -> Result<(&Entry, &str)> {
        let i = *self.by_entry.get(entry_link).ok_or(Error::NotFound)?;
        Ok((&self.entries[i], self.headers[i].entry_type.as_str()))
    }

    /// Header hash, header and entry for an entry link.
    pub fn get_entry_header(&self, entry_link: &Hash) -> Result<ChainLink<'_>> {
        let i = *self.by_entry.get(entry_link).ok_or(Error::NotFound)?;
        Ok(self.link_at(i))
    }

    /// Most recent header.
    pub fn top(&self) -> Result<(&Hash, &Header)> {
        match (self.hashes.last(), self.headers.last()) {
            (Some(h), Some(hdr)) => Ok((h, hdr)),
            _ => Err(Error::EmptyChain),
        }
    }

    /// Most recent header of a given entry type.
    pub fn top_type(&self, entry_type: &str) -> Option<(&Hash, &Header)> {
        self.hashes
            .iter()
            .zip(&self.headers)
            .rev()
            .find(|(_, h)| h.entry_type == entry_type)
    }

    fn link_at(&self, i: usize) -> ChainLink<'_> {
        ChainLink {
            hash: &self.hashes[i],
            header: &self.headers[i],
            entry: &self.entries[i],
        }
    }

    /// Lazy traversal from top to genesis along header links.
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            next: self.hashes.last().cloned(),
        }
    }

    /// Visit each link from top to genesis, stopping at the first error.
    pub fn walk<F, E>(&self, mut visitor: F, include_rejected: bool) -> std::result::Result<(), E>
    where
        F: FnMut(&Hash, &Header, &Entry) -> std::result::Result<(), E>,
    {
        for link in self.iter() {
            if !include_rejected && self.rejected.contains(link.hash) {
                continue;
            }
            visitor(link.hash, link.header, link.entry)?;
        }
        Ok(())
    }

    /// Mark a committed entry as rejected by the network.
    pub fn reject(&mut self, header_hash: &Hash) -> Result<()> {
        if !self.by_header.contains_key(header_hash) {
            return Err(Error::NotFound);
        }
        if let Some(log) = &self.log {
            log.append(&LogRecord::Reject {
                header_hash: header_hash.clone(),
            })?;
        }
        self.rejected.insert(header_hash.clone());
        Ok(())
    }

    pub fn is_rejected(&self, header_hash: &Hash) -> bool {
        self.rejected.contains(header_hash)
    }

    /// Re-verify every link, entry digest and signature.
    pub fn validate(&self, key: &VerifyingKey) -> Result<()> {
        let mut prev = Hash::null();
        for (i, header) in self.headers.iter().enumerate() {
            if header.header_link != prev {
                return Err(Error::MalformedLink);
            }
            if self.entries[i].sum(&self.spec)? != header.entry_link {
                return Err(Error::EntryMismatch);
            }
            header.verify(key)?;
            let hash = header.sum(&self.spec)?;
            if hash != self.hashes[i] {
                return Err(Error::MalformedLink);
            }
            prev = hash;
        }
        Ok(())
    }
}

/// Iterator returned by [`Chain::iter`].
pub struct ChainIter<'a> {
    chain: &'a Chain,
    next: Option<Hash>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = ChainLink<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        let i = *self.chain.by_header.get(&hash)?;
        let link = self.chain.link_at(i);
        if !link.header.header_link.is_null() {
            self.next = Some(link.header.header_link.clone());
        }
        Some(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn agent() -> Agent {
        Agent::from_seed("alice", [7u8; 32])
    }

    fn filled(agent: &Agent, n: usize) -> Chain {
        let mut chain = Chain::new(HashSpec::default());
        for i in 0..n {
            chain
                .new_entry(agent, Timestamp(i as u64), "note", Entry::Text(format!("entry {i}")))
                .unwrap();
        }
        chain
    }

    #[test]
    fn empty_chain_has_no_top() {
        let chain = Chain::new(HashSpec::default());
        assert!(matches!(chain.top(), Err(Error::EmptyChain)));
        assert_eq!(chain.iter().count(), 0);
    }

    #[test]
    fn links_and_signatures() {
        let agent = agent();
        let chain = filled(&agent, 3);
        let spec = HashSpec::default();

        let mut prev = Hash::null();
        for (i, header) in chain.headers.iter().enumerate() {
            assert_eq!(header.header_link, prev);
            let (entry, ty) = chain.get_entry(&header.entry_link).unwrap();
            assert_eq!(ty, "note");
            assert_eq!(entry.sum(&spec).unwrap(), header.entry_link);
            header.verify(&agent.verifying_key()).unwrap();
            prev = chain.hashes[i].clone();
        }
        chain.validate(&agent.verifying_key()).unwrap();
    }

    #[test]
    fn get_unknown_is_not_found() {
        let chain = filled(&agent(), 1);
        let missing = HashSpec::default().sum(b"nope");
        assert!(matches!(chain.get(&missing), Err(Error::NotFound)));
        assert!(matches!(chain.get_entry(&missing), Err(Error::NotFound)));
    }

    #[test]
    fn add_entry_rejects_stale_link() {
        let agent = agent();
        let mut chain = filled(&agent, 1);
        let entry = Entry::Text("x".into());
        let (hash, header) = chain
            .prepare_header(&agent, Timestamp(5), "note", &entry, None)
            .unwrap();
        chain
            .new_entry(&agent, Timestamp(6), "note", Entry::Text("y".into()))
            .unwrap();
        assert!(matches!(chain.add_entry(hash, header, entry), Err(Error::MalformedLink)));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn walk_visits_top_to_genesis() {
        let chain = filled(&agent(), 4);
        let mut seen = Vec::new();
        chain
            .walk(
                |_, _, entry| {
                    seen.push(entry.as_str().unwrap().to_string());
                    Ok::<_, ()>(())
                },
                false,
            )
            .unwrap();
        assert_eq!(seen, vec!["entry 3", "entry 2", "entry 1", "entry 0"]);

        // restartable
        assert_eq!(chain.iter().count(), 4);
    }

    #[test]
    fn walk_surfaces_first_error() {
        let chain = filled(&agent(), 4);
        let mut visited = 0;
        let err = chain
            .walk(
                |_, _, _| {
                    visited += 1;
                    if visited == 2 {
                        Err("stop")
                    } else {
                        Ok(())
                    }
                },
                true,
            )
            .unwrap_err();
        assert_eq!(err, "stop");
        assert_eq!(visited, 2);
    }

    #[test]
    fn rejected_links_are_skipped() {
        let chain_agent = agent();
        let mut chain = filled(&chain_agent, 3);
        let middle = chain.hashes[1].clone();
        chain.reject(&middle).unwrap();

        let mut count = 0;
        chain.walk(|_, _, _| Ok::<_, ()>(count += 1), false).unwrap();
        assert_eq!(count, 2);
        let mut all = 0;
        chain.walk(|_, _, _| Ok::<_, ()>(all += 1), true).unwrap();
        assert_eq!(all, 3);
    }

    #[test]
    fn top_type_finds_latest() {
        let agent = agent();
        let mut chain = filled(&agent, 2);
        chain
            .new_entry(&agent, Timestamp(10), "other", Entry::Text("o".into()))
            .unwrap();
        let (_, header) = chain.top_type("note").unwrap();
        assert_eq!(header.time, Timestamp(1));
        assert!(chain.top_type("missing").is_none());
    }

    #[test]
    fn file_backed_chain_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chain.log");
        let agent = agent();
        let top = {
            let mut chain = Chain::open(&path, HashSpec::default()).unwrap();
            for i in 0..3u64 {
                chain
                    .new_entry(&agent, Timestamp(i), "note", Entry::Text(i.to_string()))
                    .unwrap();
            }
            let first = chain.hashes[0].clone();
            chain.reject(&first).unwrap();
            chain.top().unwrap().0.clone()
        };

        let chain = Chain::open(&path, HashSpec::default()).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.top().unwrap().0, &top);
        assert!(chain.is_rejected(&chain.hashes[0]));
        chain.validate(&agent.verifying_key()).unwrap();
    }

    #[test]
    fn validate_detects_foreign_key() {
        let chain = filled(&agent(), 2);
        let other = Agent::from_seed("mallory", [8u8; 32]);
        assert!(matches!(chain.validate(&other.verifying_key()), Err(Error::BadSignature)));
    }

    proptest::proptest! {
        #[test]
        fn any_content_links_back_to_genesis(texts in proptest::collection::vec(".*", 1..12)) {
            let agent = agent();
            let mut chain = Chain::new(HashSpec::default());
            for (i, text) in texts.iter().enumerate() {
                chain
                    .new_entry(&agent, Timestamp(i as u64), "note", Entry::Text(text.clone()))
                    .unwrap();
            }
            let mut seen = Vec::new();
            chain
                .walk::<_, Error>(|_, _, entry| {
                    seen.push(entry.as_str().unwrap_or_default().to_string());
                    Ok(())
                }, false)
                .unwrap();
            seen.reverse();
            proptest::prop_assert_eq!(seen, texts);
            proptest::prop_assert!(chain.validate(&agent.verifying_key()).is_ok());
        }
    }
}
