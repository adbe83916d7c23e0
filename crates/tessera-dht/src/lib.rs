//! Tessera DHT replica.
//!
//! Keyed storage of validated entries with a status lifecycle:
//!
//! ```text
//! (absent) --accepted PUT--> Live
//! Live --accepted DEL--> Deleted
//! Live --accepted MOD(new)--> Modified   (keeps a forward pointer to new)
//! (absent|Live) --failed validation--> Rejected
//! ```
//!
//! A link index maps `(base, tag)` to an ordered set of targets, populated
//! by accepted links entries. Every processed change request lands in a
//! change log that gossip partners read from.
//!
//! Every node holds a full replica; there is no neighbourhood sharding.

mod changelog;
pub mod error;
mod locks;
mod record;
mod store;

pub use changelog::ChangeLog;
pub use error::{Error, Result};
pub use locks::KeyLocks;
pub use record::{LinkRecord, Record};
pub use store::Dht;

pub use tessera_protocols::{Status, StatusMask};
