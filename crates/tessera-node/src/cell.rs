//! An application instance: one agent running one DNA.
//!
//! A `Cell` owns the agent's source chain and its DHT replica. Commits are
//! validated, appended to the chain and, for public entry types, applied to
//! the local replica at once; the same change requests are then announced to
//! every known peer by a background publisher once the cell is started.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tessera_chain::{
    Agent, Chain, DataFormat, Dna, Entry, Exposure, FunctionDef, Header, LinksEntry, PeerId, Sharing,
    is_system_type, Timestamp, Zome, AGENT_ENTRY_TYPE, DNA_ENTRY_TYPE,
};
use tessera_dht::{Dht, Status, StatusMask};
use tessera_hash::{Hash, HashSpec};
use tessera_nucleus::{
    Action, Evaluator, NucleusGate, NucleusRegistry, ValidationGate, ValidationRequest, ZomeApi,
};
use tessera_protocols::{Body, LinkReq, Message, MsgType, Protocol, PutReq, TaggedHash, ValidationPackage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::gossip::{GossipHandler, Gossiper};
use crate::node::Node;
use crate::replica::{DhtHandler, Replica, ValidateHandler};
use crate::transport::Transport;

/// File name of the chain log inside the data directory.
pub const CHAIN_FILE: &str = "chain.log";

struct Running {
    node: Arc<Node>,
    gossiper: Arc<Gossiper>,
    tasks: Vec<JoinHandle<()>>,
}

pub struct Cell {
    agent: Agent,
    spec: HashSpec,
    config: NodeConfig,
    dna: Arc<RwLock<Dna>>,
    gate: Arc<NucleusGate>,
    chain: Arc<Mutex<Chain>>,
    dht: Arc<Dht>,
    dna_hash: RwLock<Hash>,
    outbox: mpsc::UnboundedSender<Message>,
    outbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    running: Mutex<Option<Running>>,
}

impl Cell {
    /// Build a cell. With a data directory the chain is file-backed and an
    /// existing chain is reopened.
    pub fn new(agent: Agent, dna: Dna, registry: NucleusRegistry, config: NodeConfig) -> Result<Self> {
        let spec = dna.hash_spec()?;
        let chain = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Chain::open(dir.join(CHAIN_FILE), spec)?
            }
            None => Chain::new(spec),
        };
        let dna_hash = chain
            .top_type(DNA_ENTRY_TYPE)
            .map(|(_, header)| header.entry_link.clone())
            .unwrap_or_default();

        let dna = Arc::new(RwLock::new(dna));
        let gate = Arc::new(NucleusGate::new(Arc::clone(&dna), registry));
        let dht = Arc::new(Dht::new(spec, Arc::clone(&gate) as Arc<dyn ValidationGate>));
        let (outbox, outbox_rx) = mpsc::unbounded_channel();

        Ok(Self {
            agent,
            spec,
            config,
            dna,
            gate,
            chain: Arc::new(Mutex::new(chain)),
            dht,
            dna_hash: RwLock::new(dna_hash),
            outbox,
            outbox_rx: Mutex::new(Some(outbox_rx)),
            running: Mutex::new(None),
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn peer_id(&self) -> PeerId {
        self.agent.peer_id()
    }

    pub fn spec(&self) -> &HashSpec {
        &self.spec
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn dht(&self) -> &Arc<Dht> {
        &self.dht
    }

    fn dna(&self) -> RwLockReadGuard<'_, Dna> {
        self.dna.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn dna_mut(&self) -> RwLockWriteGuard<'_, Dna> {
        self.dna.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the DNA document.
    pub fn dna_document(&self) -> Dna {
        self.dna().clone()
    }

    // ---- genesis ----

    /// Check the DNA version and stamp its hashes.
    pub fn prepare(&self) -> Result<()> {
        self.dna().check_version()?;
        self.gen_dna_hashes()
    }

    /// Stamp code and schema digests into the DNA, writing it back to the
    /// configured DNA path.
    pub fn gen_dna_hashes(&self) -> Result<()> {
        let mut dna = self.dna_mut();
        dna.gen_hashes()?;
        if let Some(path) = &self.config.dna_path {
            dna.save(path)?;
            debug!(path = %path.display(), "DNA written");
        }
        Ok(())
    }

    /// Commit the DNA document and then the agent entry.
    ///
    /// Returns the DNA hash. Fails with [`Error::AlreadyGenerated`] on a
    /// chain that already has its genesis.
    pub fn gen_chain(&self) -> Result<Hash> {
        if !self.dna_hash().is_null() {
            return Err(Error::AlreadyGenerated);
        }
        let dna_entry = self.dna().entry()?;
        let (_, dna_header) = self.new_entry(DNA_ENTRY_TYPE, dna_entry)?;
        self.new_entry(AGENT_ENTRY_TYPE, self.agent.entry()?)?;

        let dna_hash = dna_header.entry_link;
        *self.dna_hash.write().unwrap_or_else(PoisonError::into_inner) = dna_hash.clone();
        info!(dna = %dna_hash, agent = self.agent.identity(), "Chain generated");
        Ok(dna_hash)
    }

    /// Digest of the DNA entry; null before genesis.
    pub fn dna_hash(&self) -> Hash {
        self.dna_hash
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Header hash and header at the top of the chain.
    pub fn top(&self) -> Result<(Hash, Header)> {
        let chain = self.chain();
        let (hash, header) = chain.top()?;
        Ok((hash.clone(), header.clone()))
    }

    // ---- chain ----

    /// Append an entry without validation or publication.
    ///
    /// The type must be a system `%` type or one the DNA defines.
    pub fn new_entry(&self, entry_type: &str, entry: Entry) -> Result<(Hash, Header)> {
        if !is_system_type(entry_type) && self.dna().find_entry_def(entry_type).is_none() {
            return Err(tessera_nucleus::Error::UnknownEntryType(entry_type.to_string()).into());
        }
        Ok(self
            .chain()
            .new_entry(&self.agent, Timestamp::now(), entry_type, entry)?)
    }

    /// Validate, append and publish an entry. Returns the entry hash.
    pub fn commit(&self, entry_type: &str, entry: Entry) -> Result<Hash> {
        if !self.config.peer_mode_author {
            return Err(Error::NotAuthor);
        }
        let (type_link, sharing, format) = {
            let dna = self.dna();
            let (_, def) = dna.find_entry_def(entry_type).ok_or_else(|| {
                tessera_nucleus::Error::UnknownEntryType(entry_type.to_string())
            })?;
            (def.type_link(), def.sharing, def.data_format)
        };

        let links = match format {
            DataFormat::Links => entry.links(),
            _ => None,
        };
        let (header_hash, header) = {
            let mut chain = self.chain();
            let (header_hash, header) = chain.prepare_header(
                &self.agent,
                Timestamp::now(),
                entry_type,
                &entry,
                type_link,
            )?;

            let sources = [self.agent.peer_id()];
            let req = ValidationRequest::new(Action::Commit, entry_type, &entry, &header, &sources);
            self.gate.validate(&req)?;
            for link in links.iter().flat_map(|l| &l.links) {
                self.gate.validate(&req.with_link(link))?;
            }

            chain.add_entry(header_hash.clone(), header.clone(), entry.clone())?;
            (header_hash, header)
        };

        let entry_hash = header.entry_link.clone();
        if sharing == Sharing::Public {
            let pkg = ValidationPackage {
                entry_type: entry_type.to_string(),
                entry,
                header,
                author: self.agent.public_key_bytes().to_vec(),
            };
            self.publish(&header_hash, &entry_hash, &pkg, links)?;
        }
        Ok(entry_hash)
    }

    /// Apply PUT and LINK to the local replica and queue them for peers.
    fn publish(
        &self,
        header_hash: &Hash,
        entry_hash: &Hash,
        pkg: &ValidationPackage,
        links: Option<LinksEntry>,
    ) -> Result<()> {
        let from = self.agent.peer_id();
        let put = Message::new(
            MsgType::PutRequest,
            from.clone(),
            Body::Put(PutReq {
                hash: entry_hash.clone(),
            }),
        );
        if let Err(e) = self.dht.put(&put, entry_hash, pkg) {
            warn!(hash = %entry_hash.short(), error = %e, "Local put refused");
            self.chain().reject(header_hash)?;
            return Err(e.into());
        }
        self.queue(put);

        let bases: BTreeSet<Hash> = links
            .map(|l| l.links.into_iter().map(|link| link.base).collect())
            .unwrap_or_default();
        for base in bases {
            let msg = Message::new(
                MsgType::LinkRequest,
                from.clone(),
                Body::Link(LinkReq {
                    base: base.clone(),
                    links: entry_hash.clone(),
                }),
            );
            match self.dht.put_links(&msg, &base, entry_hash, pkg) {
                Ok(applied) => debug!(base = %base.short(), applied, "Local links applied"),
                Err(e) => debug!(base = %base.short(), error = %e, "Local links not applied"),
            }
            self.queue(msg);
        }
        Ok(())
    }

    fn queue(&self, msg: Message) {
        if self.outbox.send(msg).is_err() {
            debug!("Publisher gone, change stays local");
        }
    }

    /// Visit the chain from top to genesis.
    pub fn walk<F>(&self, visitor: F, include_rejected: bool) -> Result<()>
    where
        F: FnMut(&Hash, &Header, &Entry) -> Result<()>,
    {
        self.chain().walk(visitor, include_rejected)
    }

    // ---- nucleus ----

    pub fn get_zome(&self, name: &str) -> Result<Zome> {
        self.dna()
            .zome(name)
            .cloned()
            .ok_or_else(|| tessera_nucleus::Error::UnknownZome(name.to_string()).into())
    }

    pub fn get_function_def(&self, zome: &str, function: &str) -> Result<FunctionDef> {
        Ok(self.gate.get_function_def(zome, function)?)
    }

    pub fn make_nucleus(&self, zome: &str) -> Result<Arc<dyn Evaluator>> {
        Ok(self.gate.make_nucleus(zome)?)
    }

    /// Call a zome function from `context`.
    pub fn call(&self, zome: &str, function: &str, args: &str, context: Exposure) -> Result<String> {
        Ok(self.gate.call(self, zome, function, args, context)?)
    }

    // ---- dht ----

    /// Entry content: a live replica record, else an entry of the own chain.
    pub fn get(&self, hash: &Hash) -> Result<Entry> {
        match self.dht.get(hash, StatusMask::LIVE) {
            Ok(record) => Ok(record.entry),
            Err(tessera_dht::Error::HashNotFound) => {
                let chain = self.chain();
                let link = chain
                    .get_entry_header(hash)
                    .map_err(|_| tessera_dht::Error::HashNotFound)?;
                if chain.is_rejected(link.hash) {
                    return Err(tessera_dht::Error::HashRejected.into());
                }
                Ok(link.entry.clone())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_links(&self, base: &Hash, tag: &str, mask: StatusMask) -> Result<Vec<TaggedHash>> {
        Ok(self.dht.get_links(base, tag, mask)?)
    }

    /// Follow modification pointers from `hash` to the newest live record.
    pub fn resolve_latest(&self, hash: &Hash) -> Result<Hash> {
        let mut current = hash.clone();
        for _ in 0..=self.dht.len() {
            let record = self.dht.get(&current, StatusMask::ANY)?;
            match (record.status, record.replaced_by) {
                (Status::Live, _) => return Ok(current),
                (Status::Modified, Some(next)) => current = next,
                (status, _) => return Err(tessera_dht::Error::for_status(status).into()),
            }
        }
        // more hops than records: the pointers form a cycle
        Err(tessera_dht::Error::HashModified.into())
    }

    // ---- network ----

    /// Attach to a transport and start serving, publishing and gossiping.
    pub fn start(&self, transport: Arc<dyn Transport>) -> Result<()> {
        let agent_peer = self.agent.peer_id();
        if transport.local_peer() != agent_peer {
            return Err(Error::PeerMismatch {
                transport: transport.local_peer().to_string(),
                agent: agent_peer.to_string(),
            });
        }
        let outbox_rx = self
            .outbox_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::AlreadyStarted)?;

        let node = Arc::new(Node::new(transport, self.config.send_timeout));
        let replica = Arc::new(Replica::new(
            Arc::clone(&self.dht),
            Arc::clone(&self.chain),
            self.agent.public_key_bytes().to_vec(),
            Arc::clone(&node),
        ));
        let (gossiper, nudges) = Gossiper::new(Arc::clone(&replica), self.config.gossip_batch);
        let gossiper = Arc::new(gossiper);

        node.set_handler(Protocol::Validate, Arc::new(ValidateHandler::new(Arc::clone(&replica))));
        if self.config.peer_mode_dht_node {
            node.set_handler(Protocol::Dht, Arc::new(DhtHandler::new(Arc::clone(&replica))));
            node.set_handler(Protocol::Gossip, Arc::new(GossipHandler::new(Arc::clone(&gossiper))));
        }

        let mut tasks = vec![node.start()];
        tasks.push(tokio::spawn(publish_loop(Arc::clone(&node), outbox_rx)));
        if self.config.peer_mode_dht_node && !self.config.gossip_interval.is_zero() {
            tasks.push(tokio::spawn(Arc::clone(&gossiper).run(
                self.config.gossip_interval,
                nudges,
                node.subscribe_shutdown(),
            )));
        }

        info!(peer = %agent_peer, dna = %self.dna_hash(), "Cell started");
        *self.running() = Some(Running {
            node,
            gossiper,
            tasks,
        });
        Ok(())
    }

    /// The running node, once started.
    pub fn node(&self) -> Option<Arc<Node>> {
        self.running().as_ref().map(|r| Arc::clone(&r.node))
    }

    fn gossiper(&self) -> Result<Arc<Gossiper>> {
        self.running()
            .as_ref()
            .map(|r| Arc::clone(&r.gossiper))
            .ok_or(Error::Closed)
    }

    /// Gossip with `peer` now. Returns how many changes were replayed.
    pub async fn gossip_with(&self, peer: &PeerId) -> Result<usize> {
        let gossiper = self.gossiper()?;
        gossiper.gossip_with(peer).await
    }

    /// One gossip round with a random peer.
    pub async fn gossip_once(&self) -> Result<Option<(PeerId, usize)>> {
        let gossiper = self.gossiper()?;
        gossiper.gossip_once().await
    }

    /// Stop the node and its background tasks.
    pub async fn close(&self) {
        let running = self.running().take();
        if let Some(running) = running {
            running.node.close().await;
            for task in running.tasks {
                task.abort();
            }
            info!(peer = %self.agent.peer_id(), "Cell closed");
        }
    }
}

async fn publish_loop(node: Arc<Node>, mut outbox: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = outbox.recv().await {
        let peers = node.transport().list_peers().await;
        let sends = peers
            .iter()
            .map(|peer| node.request(Protocol::Dht, peer, &msg));
        let results = futures::future::join_all(sends).await;
        for (peer, result) in peers.iter().zip(results) {
            if let Err(e) = result {
                warn!(%peer, msg_type = %msg.msg_type, error = %e, "Publish failed");
            }
        }
    }
}

impl ZomeApi for Cell {
    fn commit(&self, entry_type: &str, entry: Entry) -> std::result::Result<Hash, String> {
        Cell::commit(self, entry_type, entry).map_err(|e| format!("Error calling 'commit': {e}"))
    }

    fn get(&self, hash: &Hash) -> std::result::Result<Entry, String> {
        Cell::get(self, hash).map_err(|e| format!("Error calling 'get': {e}"))
    }

    fn agent_identity(&self) -> String {
        self.agent.identity().to_string()
    }

    fn dna_hash(&self) -> Hash {
        Cell::dna_hash(self)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("agent", &self.agent)
            .field("dna_hash", &self.dna_hash())
            .field("dht", &self.dht)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;
    use tessera_chain::Link;

    fn cell() -> Cell {
        let cell = Cell::new(
            Agent::from_seed("alice", [7u8; 32]),
            sample::dna(),
            sample::registry(),
            NodeConfig::default(),
        )
        .unwrap();
        cell.prepare().unwrap();
        cell
    }

    fn genesis() -> Cell {
        let cell = cell();
        cell.gen_chain().unwrap();
        cell
    }

    #[test]
    fn genesis_order() {
        let cell = cell();
        assert!(cell.dna_hash().is_null());

        let dna_hash = cell.gen_chain().unwrap();
        assert_eq!(cell.dna_hash(), dna_hash);

        let (_, top) = cell.top().unwrap();
        assert_eq!(top.entry_type, AGENT_ENTRY_TYPE);

        let mut types = Vec::new();
        cell.walk(
            |_, header, _| {
                types.push(header.entry_type.clone());
                Ok(())
            },
            false,
        )
        .unwrap();
        assert_eq!(types, vec![AGENT_ENTRY_TYPE.to_string(), DNA_ENTRY_TYPE.to_string()]);

        assert!(matches!(cell.gen_chain(), Err(Error::AlreadyGenerated)));
    }

    #[test]
    fn dna_hash_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..NodeConfig::default()
        };
        let dna = sample::dna();
        let agent = || Agent::from_seed("alice", [7u8; 32]);
        let first = Cell::new(agent(), dna.clone(), sample::registry(), config.clone()).unwrap();
        let dna_hash = first.gen_chain().unwrap();
        drop(first);

        let again = Cell::new(agent(), dna, sample::registry(), config).unwrap();
        assert_eq!(again.dna_hash(), dna_hash);
        assert!(matches!(again.gen_chain(), Err(Error::AlreadyGenerated)));
    }

    #[test]
    fn commit_puts_into_local_replica() {
        let cell = genesis();
        let hash = cell.commit("evenNumbers", Entry::Text("2".into())).unwrap();
        cell.dht().exists(&hash, StatusMask::LIVE).unwrap();
        assert_eq!(cell.get(&hash).unwrap(), Entry::Text("2".into()));

        let (_, top) = cell.top().unwrap();
        assert_eq!(top.entry_link, hash);
    }

    #[test]
    fn invalid_commit_leaves_chain_untouched() {
        let cell = genesis();
        let (before, _) = cell.top().unwrap();
        let err = cell.commit("evenNumbers", Entry::Text("41".into())).unwrap_err();
        assert_eq!(err.to_string(), "Invalid entry: 41");
        assert_eq!(cell.top().unwrap().0, before);
    }

    #[test]
    fn private_entries_stay_on_chain() {
        let cell = genesis();
        let hash = cell.commit("note", Entry::Text("secret".into())).unwrap();
        assert!(cell.dht().exists(&hash, StatusMask::ANY).is_err());
        assert_eq!(cell.get(&hash).unwrap(), Entry::Text("secret".into()));
    }

    #[test]
    fn links_are_indexed_without_duplicates() {
        let cell = genesis();
        let base = cell
            .commit("profile", Entry::Json(r#"{"firstName":"Ada"}"#.into()))
            .unwrap();
        let target = cell.commit("evenNumbers", Entry::Text("4".into())).unwrap();
        let links = LinksEntry {
            links: vec![
                Link::new(base.clone(), target.clone(), "4 stars"),
                Link::new(base.clone(), target.clone(), "4 stars"),
            ],
        };
        cell.commit("rating", links.to_entry().unwrap()).unwrap();

        let found = cell.get_links(&base, "4 stars", StatusMask::LIVE).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hash, target);
    }

    #[test]
    fn call_respects_exposure() {
        let cell = genesis();
        assert_eq!(
            cell.call(sample::SAMPLE_ZOME, "testStrFn1", "arg1 arg2", Exposure::Zome)
                .unwrap(),
            "result: arg1 arg2"
        );
        let err = cell
            .call(sample::SAMPLE_ZOME, "testStrFn1", "arg1 arg2", Exposure::Public)
            .unwrap_err();
        assert_eq!(err.to_string(), "function not available");

        let hash = cell
            .call(sample::SAMPLE_ZOME, "addEven", "42", Exposure::Zome)
            .unwrap();
        assert_eq!(hash, cell.top().unwrap().1.entry_link.to_string());

        let err = cell
            .call(sample::SAMPLE_ZOME, "addEven", "41", Exposure::Zome)
            .unwrap_err();
        assert_eq!(err.to_string(), "Error calling 'commit': Invalid entry: 41");
    }

    #[test]
    fn lookups_report_unknown_names() {
        let cell = genesis();
        assert_eq!(
            cell.get_zome("bogusZome").unwrap_err().to_string(),
            "unknown zome: bogusZome"
        );
        assert_eq!(
            cell.get_function_def(sample::SAMPLE_ZOME, "foo")
                .unwrap_err()
                .to_string(),
            "unknown exposed function: foo"
        );
        assert!(cell.make_nucleus(sample::SAMPLE_ZOME).is_ok());
    }

    #[test]
    fn resolve_latest_follows_modifications() {
        let cell = genesis();
        let a = cell.commit("evenNumbers", Entry::Text("2".into())).unwrap();
        let b = cell.commit("evenNumbers", Entry::Text("4".into())).unwrap();
        let c = cell.commit("evenNumbers", Entry::Text("6".into())).unwrap();

        let from = cell.peer_id();
        for (old, new) in [(&a, &b), (&b, &c)] {
            let pkg = cell.dht().package(new).unwrap();
            let msg = Message::new(
                MsgType::ModRequest,
                from.clone(),
                Body::Mod(tessera_protocols::ModReq {
                    hash: old.clone(),
                    new_hash: new.clone(),
                }),
            );
            cell.dht().modify(&msg, old, new, &pkg).unwrap();
        }

        assert_eq!(cell.resolve_latest(&a).unwrap(), c);
        assert_eq!(cell.resolve_latest(&c).unwrap(), c);
        assert!(matches!(
            cell.resolve_latest(&Hash::null()),
            Err(Error::Dht(tessera_dht::Error::HashNotFound))
        ));
    }

    #[test]
    fn non_author_cannot_commit() {
        let config = NodeConfig {
            peer_mode_author: false,
            ..NodeConfig::default()
        };
        let cell = Cell::new(
            Agent::from_seed("bob", [8u8; 32]),
            sample::dna(),
            sample::registry(),
            config,
        )
        .unwrap();
        assert!(matches!(
            cell.commit("evenNumbers", Entry::Text("2".into())),
            Err(Error::NotAuthor)
        ));
    }

    #[test]
    fn new_entry_requires_known_type() {
        let cell = genesis();
        let err = cell
            .new_entry("entryTypeFoo", Entry::Text("foo".into()))
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown entry type: entryTypeFoo");

        let (hash, header) = cell.new_entry("oddNumbers", Entry::Text("3".into())).unwrap();
        assert_eq!(header.entry_type, "oddNumbers");
        assert_eq!(cell.top().unwrap().0, hash);
        // appended unvalidated, so nothing reaches the replica
        assert!(cell.dht().exists(&header.entry_link, StatusMask::ANY).is_err());
    }

    #[tokio::test]
    async fn timed_gossip_runs_until_close() {
        let config = NodeConfig {
            gossip_interval: std::time::Duration::from_millis(10),
            ..NodeConfig::default()
        };
        let network = crate::memory::MemoryNetwork::new();
        let cells: Vec<Cell> = [("alice", 7u8), ("bob", 8u8)]
            .into_iter()
            .map(|(name, seed)| {
                let cell = Cell::new(
                    Agent::from_seed(name, [seed; 32]),
                    sample::dna(),
                    sample::registry(),
                    config.clone(),
                )
                .unwrap();
                cell.prepare().unwrap();
                cell.gen_chain().unwrap();
                cell
            })
            .collect();
        let hash = cells[0].commit("evenNumbers", Entry::Text("20".into())).unwrap();
        for cell in &cells {
            let transport = network.join(cell.peer_id()).await;
            cell.start(Arc::new(transport)).unwrap();
        }

        let bob = &cells[1];
        let mut caught_up = false;
        for _ in 0..200 {
            if bob.dht().exists(&hash, StatusMask::LIVE).is_ok() {
                caught_up = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(caught_up);

        for cell in &cells {
            cell.close().await;
        }
        assert!(matches!(bob.gossip_once().await, Err(Error::Closed)));
    }
}
