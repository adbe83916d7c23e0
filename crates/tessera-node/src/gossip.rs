//! Gossip engine.
//!
//! On every tick a random peer is asked for the changes it has processed
//! since the last index we saw from it. Each returned change is replayed
//! through [`Replica::apply`]; fingerprints make replays idempotent.
//! A peer that reports a newer index than we hold for it is gossiped with
//! right away instead of waiting for the next tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tessera_chain::PeerId;
use tessera_protocols::{Body, Gossip, GossipReq, Message, MsgType, Protocol, ResponseError};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::node::{closed, ProtocolHandler};
use crate::replica::Replica;

/// Default number of changes returned per gossip response.
pub const DEFAULT_GOSSIP_BATCH: usize = 256;

pub struct Gossiper {
    replica: Arc<Replica>,
    batch: usize,
    /// peer -> highest change index of theirs we have processed
    peer_idx: Mutex<HashMap<PeerId, u64>>,
    nudge: mpsc::UnboundedSender<PeerId>,
}

impl Gossiper {
    /// Returns the engine and the receiver of early-gossip nudges for
    /// [`run`](Self::run).
    pub fn new(replica: Arc<Replica>, batch: usize) -> (Self, mpsc::UnboundedReceiver<PeerId>) {
        let (nudge, nudges) = mpsc::unbounded_channel();
        let gossiper = Self {
            replica,
            batch: batch.max(1),
            peer_idx: Mutex::new(HashMap::new()),
            nudge,
        };
        (gossiper, nudges)
    }

    fn peer_idx(&self) -> MutexGuard<'_, HashMap<PeerId, u64>> {
        self.peer_idx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Highest change index of `peer` processed locally.
    pub fn known_idx(&self, peer: &PeerId) -> u64 {
        self.peer_idx().get(peer).copied().unwrap_or(0)
    }

    fn advance(&self, peer: &PeerId, idx: u64) {
        let mut table = self.peer_idx();
        let known = table.entry(peer.clone()).or_insert(0);
        *known = (*known).max(idx);
    }

    /// Answer a GOSSIP_REQUEST from `from`.
    pub fn serve(&self, from: &PeerId, req: GossipReq) -> Gossip {
        if req.my_idx > self.known_idx(from) {
            // the requester has changes we have not seen
            let _ = self.nudge.send(from.clone());
        }
        Gossip {
            puts: self.replica.dht().puts_since(req.your_idx, self.batch),
        }
    }

    /// One exchange with `peer`. Returns how many changes were replayed.
    ///
    /// Transport failures stop the batch so the remaining changes are asked
    /// for again next time; any other failure is the change's final outcome.
    pub async fn gossip_with(&self, peer: &PeerId) -> Result<usize> {
        let node = self.replica.node();
        let your_idx = self.known_idx(peer);
        let req = GossipReq {
            my_idx: self.replica.dht().current_idx(),
            your_idx,
        };
        let msg = node.new_message(MsgType::GossipRequest, Body::Gossip(req));
        let puts = match node.request(Protocol::Gossip, peer, &msg).await? {
            Body::GossipPuts(gossip) => gossip.puts,
            other => return Err(Error::UnexpectedReply(format!("{other:?}"))),
        };

        let mut replayed = 0;
        for put in puts {
            if put.idx <= your_idx {
                continue;
            }
            if put.msg.msg_type.is_change() {
                match self.replica.apply(put.msg, Some(peer)).await {
                    Ok(_) => replayed += 1,
                    Err(e @ (Error::Transport(_) | Error::Timeout(_) | Error::Closed)) => {
                        return Err(e);
                    }
                    Err(e) => debug!(idx = put.idx, %peer, error = %e, "Gossiped change refused"),
                }
            }
            self.advance(peer, put.idx);
        }
        trace!(%peer, replayed, idx = self.known_idx(peer), "Gossip exchange done");
        Ok(replayed)
    }

    /// Gossip with one randomly chosen peer, if any.
    pub async fn gossip_once(&self) -> Result<Option<(PeerId, usize)>> {
        let peers = self.replica.node().transport().list_peers().await;
        let peer = {
            let mut rng = rand::thread_rng();
            peers.choose(&mut rng).cloned()
        };
        match peer {
            Some(peer) => {
                let n = self.gossip_with(&peer).await?;
                Ok(Some((peer, n)))
            }
            None => Ok(None),
        }
    }

    /// Timer loop; ends when `shutdown` flips to `true`.
    pub async fn run(
        self: Arc<Self>,
        interval: Duration,
        mut nudges: mpsc::UnboundedReceiver<PeerId>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(?interval, "Gossip started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = closed(&mut shutdown) => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.gossip_once().await {
                        warn!(error = %e, "Gossip failed");
                    }
                }
                Some(peer) = nudges.recv() => {
                    if let Err(e) = self.gossip_with(&peer).await {
                        warn!(%peer, error = %e, "Gossip failed");
                    }
                }
            }
        }
        info!("Gossip stopped");
    }
}

impl std::fmt::Debug for Gossiper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gossiper")
            .field("batch", &self.batch)
            .field("peers", &self.peer_idx().len())
            .finish_non_exhaustive()
    }
}

/// Serves `tessera-gossip`.
#[derive(Debug)]
pub struct GossipHandler {
    gossiper: Arc<Gossiper>,
}

impl GossipHandler {
    pub fn new(gossiper: Arc<Gossiper>) -> Self {
        Self { gossiper }
    }
}

#[async_trait]
impl ProtocolHandler for GossipHandler {
    async fn handle(&self, msg: Message) -> std::result::Result<Body, ResponseError> {
        match msg.body {
            Body::Gossip(req) => Ok(Body::GossipPuts(self.gossiper.serve(&msg.from, req))),
            _ => Err(ResponseError::Unknown(format!(
                "unexpected body for {}",
                msg.msg_type
            ))),
        }
    }
}
