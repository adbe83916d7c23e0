//! Helpers for multi-node tests over an in-memory network.

use std::sync::Arc;
use std::time::Duration;

use tessera_chain::{Agent, Dna};
use tessera_node::{sample, Cell, MemoryNetwork, NodeConfig};

/// Config for test cells: in memory, no gossip timer, short timeouts.
pub fn test_config() -> NodeConfig {
    NodeConfig {
        gossip_interval: Duration::ZERO,
        send_timeout: Duration::from_secs(2),
        ..NodeConfig::default()
    }
}

/// A cell with its genesis done, not yet started.
pub fn genesis_cell(name: &str, seed: u8, dna: Dna, config: NodeConfig) -> Cell {
    let cell = Cell::new(Agent::from_seed(name, [seed; 32]), dna, sample::registry(), config)
        .expect("cell");
    cell.prepare().expect("prepare");
    cell.gen_chain().expect("genesis");
    cell
}

/// Join `cell` to `network` and start it.
pub async fn start(cell: &Cell, network: &MemoryNetwork) {
    let transport = network.join(cell.peer_id()).await;
    cell.start(Arc::new(transport)).expect("start");
}

/// Started cells sharing one DNA on a fresh network.
pub async fn cluster(n: usize) -> (MemoryNetwork, Vec<Cell>) {
    let network = MemoryNetwork::new();
    let dna = sample::dna();
    let mut cells = Vec::with_capacity(n);
    for i in 0..n {
        let cell = genesis_cell(&format!("agent-{i}"), i as u8 + 1, dna.clone(), test_config());
        start(&cell, &network).await;
        cells.push(cell);
    }
    (network, cells)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
