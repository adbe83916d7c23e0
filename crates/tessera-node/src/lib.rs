//! Tessera node
//!
//! Runs one application [`Cell`] on a peer-to-peer network: serves the
//! `tessera-dht`, `tessera-validate` and `tessera-gossip` protocols over a
//! pluggable [`Transport`], publishes local commits to peers and keeps the
//! replica converged through periodic gossip.
//!
//! # Architecture
//!
//! - **Transport**: byte streams to peers ([`MemoryTransport`], [`TcpTransport`])
//! - **Node**: framed request/response over streams, protocol dispatch
//! - **Replica**: DHT change processing shared by direct requests and gossip
//! - **Gossip**: change-log reconciliation with random peers
//! - **Cell**: source chain, commits, zome calls and the background tasks
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_chain::Agent;
//! use tessera_node::{sample, Cell, MemoryNetwork, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = Agent::generate("alice");
//!     let peer = agent.peer_id();
//!     let cell = Cell::new(agent, sample::dna(), sample::registry(), NodeConfig::default())?;
//!     cell.prepare()?;
//!     cell.gen_chain()?;
//!
//!     let network = MemoryNetwork::new();
//!     cell.start(Arc::new(network.join(peer).await))?;
//!     cell.close().await;
//!     Ok(())
//! }
//! ```

pub mod cell;
pub mod config;
pub mod error;
pub mod gossip;
pub mod memory;
pub mod node;
pub mod replica;
pub mod sample;
pub mod tcp;
pub mod transport;

pub use cell::Cell;
pub use config::{BootstrapPeer, ConfigError, NodeConfig};
pub use error::{Error, Result};
pub use gossip::{GossipHandler, Gossiper, DEFAULT_GOSSIP_BATCH};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use node::{Node, ProtocolHandler};
pub use replica::{DhtHandler, Replica, ValidateHandler};
pub use tcp::TcpTransport;
pub use transport::{BoxStream, IncomingStream, Stream, Transport};
