//! Node configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tessera_chain::PeerId;
use thiserror::Error;

use crate::gossip::DEFAULT_GOSSIP_BATCH;

/// Configuration errors; fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Invalid bootstrap peer '{0}', expected peer_id@host:port")]
    InvalidPeer(String),

    #[error("At least one peer mode must be set to true.")]
    NoPeerMode,
}

/// A peer to contact at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPeer {
    pub peer: PeerId,
    pub addr: SocketAddr,
}

impl FromStr for BootstrapPeer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (peer, addr) = s
            .split_once('@')
            .ok_or_else(|| ConfigError::InvalidPeer(s.to_string()))?;
        let addr = addr
            .parse()
            .map_err(|_| ConfigError::InvalidPeer(s.to_string()))?;
        if peer.is_empty() {
            return Err(ConfigError::InvalidPeer(s.to_string()));
        }
        Ok(Self {
            peer: PeerId::from(peer),
            addr,
        })
    }
}

/// Configuration for a tessera node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Chain log and agent key live here; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,

    /// Where the hash-stamped DNA document is written back, if anywhere
    pub dna_path: Option<PathBuf>,

    /// P2P listen address
    pub listen_addr: SocketAddr,

    /// Bootstrap peers
    pub bootstrap_peers: Vec<BootstrapPeer>,

    /// Agent identity string
    pub identity: String,

    pub gossip_interval: Duration,

    /// Changes per gossip response
    pub gossip_batch: usize,

    pub send_timeout: Duration,

    /// May commit entries
    pub peer_mode_author: bool,

    /// Serves DHT requests and gossips
    pub peer_mode_dht_node: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            dna_path: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 6283)),
            bootstrap_peers: Vec::new(),
            identity: "tessera-agent".to_string(),
            gossip_interval: Duration::from_secs(2),
            gossip_batch: DEFAULT_GOSSIP_BATCH,
            send_timeout: Duration::from_secs(10),
            peer_mode_author: true,
            peer_mode_dht_node: true,
        }
    }
}

impl NodeConfig {
    /// Create config from environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_dir = Some(PathBuf::from(
            lookup("TESSERA_DATA_DIR").unwrap_or_else(|| "./tessera-data".to_string()),
        ));
        let dna_path = lookup("TESSERA_DNA_PATH").map(PathBuf::from);
        let listen_addr = parse_var(&lookup, "TESSERA_LISTEN_ADDR")?.unwrap_or(defaults.listen_addr);

        let bootstrap_peers = lookup("TESSERA_BOOTSTRAP_PEERS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(BootstrapPeer::from_str)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let identity = lookup("TESSERA_IDENTITY").unwrap_or(defaults.identity);
        let gossip_interval = parse_var::<u64>(&lookup, "TESSERA_GOSSIP_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.gossip_interval);
        let gossip_batch =
            parse_var(&lookup, "TESSERA_GOSSIP_BATCH")?.unwrap_or(defaults.gossip_batch);
        let send_timeout = parse_var::<u64>(&lookup, "TESSERA_SEND_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.send_timeout);
        let peer_mode_author =
            parse_var(&lookup, "TESSERA_PEER_MODE_AUTHOR")?.unwrap_or(defaults.peer_mode_author);
        let peer_mode_dht_node = parse_var(&lookup, "TESSERA_PEER_MODE_DHT_NODE")?
            .unwrap_or(defaults.peer_mode_dht_node);

        Ok(Self {
            data_dir,
            dna_path,
            listen_addr,
            bootstrap_peers,
            identity,
            gossip_interval,
            gossip_batch,
            send_timeout,
            peer_mode_author,
            peer_mode_dht_node,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.peer_mode_author && !self.peer_mode_dht_node {
            return Err(ConfigError::NoPeerMode);
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
