//! The interpreter capability.
//!
//! The chain and the DHT never look at application code. They hand a
//! [`ValidationRequest`] to an [`Evaluator`], which answers accept or a
//! rejection reason.

use std::fmt;

use tessera_chain::{Entry, Header, Link, PeerId};
use tessera_hash::Hash;

/// What is being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Local commit to the source chain.
    Commit,
    /// Storing an entry in the DHT.
    Put,
    /// Adding (or removing) one link in the DHT link index.
    Link,
    /// Marking a DHT entry deleted.
    Del,
    /// Replacing a DHT entry with a newer one.
    Mod,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Commit => "commit",
            Self::Put => "put",
            Self::Link => "link",
            Self::Del => "del",
            Self::Mod => "mod",
        };
        f.write_str(name)
    }
}

/// Inputs to one validation rule.
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    pub action: Action,
    pub entry_type: &'a str,
    pub entry: &'a Entry,
    pub header: &'a Header,
    /// Peers that vouch for this entry (its authors).
    pub sources: &'a [PeerId],
    /// For [`Action::Link`], the link being applied.
    pub link: Option<&'a Link>,
}

impl<'a> ValidationRequest<'a> {
    pub fn new(
        action: Action,
        entry_type: &'a str,
        entry: &'a Entry,
        header: &'a Header,
        sources: &'a [PeerId],
    ) -> Self {
        Self {
            action,
            entry_type,
            entry,
            header,
            sources,
            link: None,
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: &'a Link) -> Self {
        self.link = Some(link);
        self
    }
}

/// Host services available to zome functions.
pub trait ZomeApi: Send + Sync {
    /// Commit an entry to the caller's chain, returning its entry hash.
    fn commit(&self, entry_type: &str, entry: Entry) -> Result<Hash, String>;

    /// Fetch live entry content by hash.
    fn get(&self, hash: &Hash) -> Result<Entry, String>;

    fn agent_identity(&self) -> String;

    fn dna_hash(&self) -> Hash;
}

/// A zome interpreter.
pub trait Evaluator: Send + Sync {
    /// Name matched against a zome's declared `nucleus_type`.
    fn nucleus_type(&self) -> &str;

    /// Run the validation rule for `req.entry_type`.
    fn validate(&self, req: &ValidationRequest<'_>) -> Result<(), String>;

    /// Run an exposed function.
    fn call(&self, api: &dyn ZomeApi, function: &str, args: &str) -> Result<String, String>;
}
