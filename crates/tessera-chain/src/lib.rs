//! Tessera source chain
//!
//! Each agent keeps a private, append-only chain of signed headers, each
//! pointing at an entry by content hash. The chain is the agent's record of
//! everything it has authored; a subset of entries is later published to
//! the DHT.
//!
//! # Components
//!
//! - [`Agent`] / [`PeerId`]: signing identity and its derived network address
//! - [`Entry`] / [`Header`]: content and the signed link that commits to it
//! - [`Chain`]: the append-only sequence, optionally file-backed
//! - [`Dna`]: the application document committed at genesis

pub mod agent;
pub mod chain;
pub mod dna;
pub mod entry;
pub mod error;
pub mod log;

pub use agent::{verify_signature, verifying_key_from_bytes, Agent, AgentEntry, PeerId};
pub use chain::{Chain, ChainIter, ChainLink};
pub use dna::{CallingType, DhtConfig, Dna, EntryDef, Exposure, FunctionDef, Sharing, Zome, VERSION};
pub use entry::{
    is_system_type, DataFormat, Entry, Header, Link, LinksEntry, Timestamp, AGENT_ENTRY_TYPE,
    DEL_LINK_ACTION, DNA_ENTRY_TYPE,
};
pub use error::{Error, Result};

pub use tessera_hash::{Hash, HashSpec};
