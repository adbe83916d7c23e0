//! Tessera node binary
//!
//! Runs one agent's cell over TCP until interrupted.

use std::sync::Arc;

use tessera_chain::{Agent, Dna};
use tessera_node::{sample, Cell, NodeConfig, TcpTransport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera_node=info,tessera=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = NodeConfig::from_env()?;
    config.validate()?;

    let agent = match &config.data_dir {
        Some(dir) => Agent::load_or_create(dir, config.identity.clone())?,
        None => Agent::generate(config.identity.clone()),
    };
    let peer = agent.peer_id();
    tracing::info!(%peer, identity = agent.identity(), "Starting tessera node");

    let dna = match &config.dna_path {
        Some(path) if path.exists() => Dna::load(path)?,
        _ => sample::dna(),
    };

    let listen_addr = config.listen_addr;
    let bootstrap = config.bootstrap_peers.clone();
    let cell = Cell::new(agent, dna, sample::registry(), config)?;
    cell.prepare()?;
    if cell.dna_hash().is_null() {
        cell.gen_chain()?;
    }

    let transport = TcpTransport::bind(listen_addr, peer).await?;
    tracing::info!(addr = %transport.local_addr(), "Listening");
    for p in bootstrap {
        transport.add_peer(p.peer, p.addr).await;
    }

    cell.start(Arc::new(transport))?;
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    cell.close().await;
    Ok(())
}
