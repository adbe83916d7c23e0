//! The replica store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tessera_chain::{Link, PeerId};
use tessera_hash::{Hash, HashSpec};
use tessera_nucleus::{Action, ValidationGate, ValidationRequest};
use tessera_protocols::{Message, Put, Status, StatusMask, TaggedHash, ValidationPackage};
use tracing::{debug, trace, warn};

use crate::changelog::ChangeLog;
use crate::error::{Error, Result};
use crate::locks::KeyLocks;
use crate::record::{LinkRecord, Record};

type LinkIndex = HashMap<Hash, BTreeMap<String, Vec<LinkRecord>>>;

/// Outcome of the gate for one change.
enum Verdict {
    Accept,
    Reject(String),
}

/// A DHT replica.
///
/// All mutations enter through a change request (`put`, `del`, `modify`,
/// `put_links`) carrying the originating [`Message`]. A request whose
/// fingerprint was already processed is a no-op, which makes replay from
/// gossip idempotent.
pub struct Dht {
    spec: HashSpec,
    gate: Arc<dyn ValidationGate>,
    records: RwLock<HashMap<Hash, Record>>,
    links: RwLock<LinkIndex>,
    log: Mutex<ChangeLog>,
    locks: KeyLocks,
}

impl Dht {
    pub fn new(spec: HashSpec, gate: Arc<dyn ValidationGate>) -> Self {
        Self {
            spec,
            gate,
            records: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
            log: Mutex::new(ChangeLog::new()),
            locks: KeyLocks::new(),
        }
    }

    pub fn spec(&self) -> &HashSpec {
        &self.spec
    }

    fn records(&self) -> RwLockReadGuard<'_, HashMap<Hash, Record>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn records_mut(&self) -> RwLockWriteGuard<'_, HashMap<Hash, Record>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn links(&self) -> RwLockReadGuard<'_, LinkIndex> {
        self.links.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn links_mut(&self) -> RwLockWriteGuard<'_, LinkIndex> {
        self.links.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self) -> MutexGuard<'_, ChangeLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn judge(&self, req: &ValidationRequest<'_>) -> Result<Verdict> {
        match self.gate.validate(req) {
            Ok(()) => Ok(Verdict::Accept),
            Err(e) if e.is_rejection() => Ok(Verdict::Reject(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn check_package(&self, pkg: &ValidationPackage, hash: &Hash) -> Result<()> {
        pkg.verify(&self.spec, hash, None)
            .map_err(|e| Error::BadPackage(e.to_string()))
    }

    // ---- reads ----

    /// Fail unless `hash` is held with a status in `mask`.
    pub fn exists(&self, hash: &Hash, mask: StatusMask) -> Result<()> {
        match self.records().get(hash) {
            None => Err(Error::HashNotFound),
            Some(r) if mask.contains(r.status) => Ok(()),
            Some(r) => Err(Error::for_status(r.status)),
        }
    }

    /// The record for `hash` if its status is in `mask`.
    pub fn get(&self, hash: &Hash, mask: StatusMask) -> Result<Record> {
        match self.records().get(hash) {
            None => Err(Error::HashNotFound),
            Some(r) if mask.contains(r.status) => Ok(r.clone()),
            Some(r) => Err(Error::for_status(r.status)),
        }
    }

    /// Validation inputs for a held entry, whatever its status.
    ///
    /// Rejected entries are served too, so a peer replaying a rejected
    /// put can reach the same verdict without the author.
    pub fn package(&self, hash: &Hash) -> Option<ValidationPackage> {
        self.records().get(hash).map(Record::package)
    }

    /// Link targets under `(base, tag)` whose status is in `mask`.
    pub fn get_links(&self, base: &Hash, tag: &str, mask: StatusMask) -> Result<Vec<TaggedHash>> {
        if !self.records().contains_key(base) {
            return Err(Error::HashNotFound);
        }
        let links = self.links();
        let bucket = links
            .get(base)
            .and_then(|tags| tags.get(tag))
            .ok_or(Error::LinkNotFound)?;
        Ok(bucket
            .iter()
            .filter(|l| mask.contains(l.status))
            .map(|l| TaggedHash {
                hash: l.link.clone(),
                source: l.source.clone(),
            })
            .collect())
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    // ---- change log ----

    /// Index of the newest processed change.
    pub fn current_idx(&self) -> u64 {
        self.log().current()
    }

    /// Up to `limit` processed changes after `idx`.
    pub fn puts_since(&self, idx: u64, limit: usize) -> Vec<Put> {
        self.log().since(idx, limit)
    }

    /// Change indices that touched `hash`.
    pub fn history(&self, hash: &Hash) -> Vec<u64> {
        self.log().history(hash).to_vec()
    }

    /// True if a change with this fingerprint was processed.
    pub fn seen(&self, fingerprint: &Hash) -> bool {
        self.log().seen(fingerprint)
    }

    fn record_change(&self, fingerprint: Hash, key: &Hash, msg: &Message) -> u64 {
        self.log().append(fingerprint, key, msg.clone())
    }

    fn record_change_keys(&self, fingerprint: Hash, keys: &[&Hash], msg: &Message) -> u64 {
        self.log().append_keys(fingerprint, keys, msg.clone())
    }

    // ---- change requests ----

    /// Store the entry `hash`, validated through the gate.
    ///
    /// A rejected entry is kept as `Rejected` and the attempt is logged so
    /// peers learn the outcome.
    pub fn put(&self, msg: &Message, hash: &Hash, pkg: &ValidationPackage) -> Result<()> {
        let fp = msg.fingerprint()?;
        self.locks.with_key(hash, || {
            if self.seen(&fp) {
                trace!(hash = %hash.short(), "Duplicate put ignored");
                return Ok(());
            }
            self.check_package(pkg, hash)?;

            let existing = self.records().get(hash).map(|r| r.status);
            match existing {
                Some(Status::Rejected) => {
                    self.record_change(fp, hash, msg);
                    return Err(Error::HashRejected);
                }
                Some(Status::Deleted) | Some(Status::Modified) => {
                    if let Some(r) = self.records_mut().get_mut(hash) {
                        r.add_source(&msg.from);
                    }
                    self.record_change(fp, hash, msg);
                    return Ok(());
                }
                Some(Status::Live) | None => {}
            }

            let sources = [msg.from.clone()];
            let req = ValidationRequest::new(
                Action::Put,
                &pkg.entry_type,
                &pkg.entry,
                &pkg.header,
                &sources,
            );
            let verdict = self.judge(&req)?;

            let result = {
                let mut records = self.records_mut();
                match verdict {
                    Verdict::Accept => {
                        records
                            .entry(hash.clone())
                            .and_modify(|r| r.add_source(&msg.from))
                            .or_insert_with(|| Record::from_package(pkg, Status::Live, msg.from.clone()));
                        Ok(())
                    }
                    Verdict::Reject(reason) => {
                        records
                            .entry(hash.clone())
                            .and_modify(|r| r.status = Status::Rejected)
                            .or_insert_with(|| {
                                Record::from_package(pkg, Status::Rejected, msg.from.clone())
                            });
                        Err(Error::ValidationFailed(reason))
                    }
                }
            };
            let idx = self.record_change(fp, hash, msg);
            match &result {
                Ok(()) => {
                    debug!(idx, hash = %hash.short(), entry_type = %pkg.entry_type, "Put accepted")
                }
                Err(e) => warn!(idx, hash = %hash.short(), error = %e, "Put rejected"),
            }
            result
        })
    }

    /// Mark a live entry deleted.
    pub fn del(&self, msg: &Message, hash: &Hash) -> Result<()> {
        let fp = msg.fingerprint()?;
        self.locks.with_key(hash, || {
            if self.seen(&fp) {
                return Ok(());
            }
            let record = self.get(hash, StatusMask::LIVE)?;
            let sources = [msg.from.clone()];
            let req = ValidationRequest::new(
                Action::Del,
                &record.entry_type,
                &record.entry,
                &record.header,
                &sources,
            );
            let result = match self.judge(&req)? {
                Verdict::Accept => {
                    if let Some(r) = self.records_mut().get_mut(hash) {
                        r.status = Status::Deleted;
                    }
                    Ok(())
                }
                Verdict::Reject(reason) => Err(Error::ValidationFailed(reason)),
            };
            let idx = self.record_change(fp, hash, msg);
            debug!(idx, hash = %hash.short(), ok = result.is_ok(), "Del processed");
            result
        })
    }

    /// Replace live entry `old` with `new_hash`.
    ///
    /// The old record keeps a forward pointer; the new entry is stored live.
    /// A new entry this replica already rejected is refused. The change is
    /// logged under both hashes.
    pub fn modify(
        &self,
        msg: &Message,
        old: &Hash,
        new_hash: &Hash,
        pkg: &ValidationPackage,
    ) -> Result<()> {
        let fp = msg.fingerprint()?;
        self.locks.with_keys(&[old, new_hash], || {
            if self.seen(&fp) {
                return Ok(());
            }
            self.check_package(pkg, new_hash)?;
            self.exists(old, StatusMask::LIVE)?;
            if self.records().get(new_hash).map(|r| r.status) == Some(Status::Rejected) {
                return Err(Error::HashRejected);
            }

            let sources = [msg.from.clone()];
            let req = ValidationRequest::new(
                Action::Mod,
                &pkg.entry_type,
                &pkg.entry,
                &pkg.header,
                &sources,
            );
            let result = match self.judge(&req)? {
                Verdict::Accept => {
                    let mut records = self.records_mut();
                    if let Some(r) = records.get_mut(old) {
                        r.status = Status::Modified;
                        r.replaced_by = Some(new_hash.clone());
                    }
                    records
                        .entry(new_hash.clone())
                        .and_modify(|r| r.add_source(&msg.from))
                        .or_insert_with(|| Record::from_package(pkg, Status::Live, msg.from.clone()));
                    Ok(())
                }
                Verdict::Reject(reason) => Err(Error::ValidationFailed(reason)),
            };
            let idx = self.record_change_keys(fp, &[old, new_hash], msg);
            debug!(
                idx,
                old = %old.short(),
                new = %new_hash.short(),
                ok = result.is_ok(),
                "Mod processed"
            );
            result
        })
    }

    /// Apply the links that entry `links_hash` declares on `base`.
    ///
    /// The links entry itself must be held live. Each link is validated on
    /// its own; a rejected link does not stop the others. Returns how many
    /// links changed the index.
    pub fn put_links(
        &self,
        msg: &Message,
        base: &Hash,
        links_hash: &Hash,
        pkg: &ValidationPackage,
    ) -> Result<usize> {
        let fp = msg.fingerprint()?;
        self.locks.with_key(base, || {
            if self.seen(&fp) {
                trace!(base = %base.short(), "Duplicate link ignored");
                return Ok(0);
            }
            self.check_package(pkg, links_hash)?;
            let declared = pkg
                .entry
                .links()
                .ok_or_else(|| Error::BadPackage("not a links entry".into()))?;
            self.exists(base, StatusMask::LIVE)?;
            self.exists(links_hash, StatusMask::LIVE)?;

            let sources = [msg.from.clone()];
            let mut applied = 0;
            let mut rejection = None;
            for link in declared.links.iter().filter(|l| &l.base == base) {
                let req = ValidationRequest::new(
                    Action::Link,
                    &pkg.entry_type,
                    &pkg.entry,
                    &pkg.header,
                    &sources,
                )
                .with_link(link);
                match self.judge(&req)? {
                    Verdict::Accept => {
                        if self.index_link(base, link, &msg.from) {
                            applied += 1;
                        }
                    }
                    Verdict::Reject(reason) => {
                        warn!(
                            base = %base.short(),
                            tag = %link.tag,
                            reason = reason.as_str(),
                            "Link rejected"
                        );
                        rejection.get_or_insert(reason);
                    }
                }
            }

            let idx = self.record_change(fp, base, msg);
            debug!(idx, base = %base.short(), applied, "Links processed");
            match rejection {
                Some(reason) if applied == 0 => Err(Error::ValidationFailed(reason)),
                _ => Ok(applied),
            }
        })
    }

    fn index_link(&self, base: &Hash, link: &Link, source: &PeerId) -> bool {
        let mut index = self.links_mut();
        let bucket = index
            .entry(base.clone())
            .or_default()
            .entry(link.tag.clone())
            .or_default();

        match bucket.iter_mut().find(|l| l.link == link.link) {
            Some(existing) if link.is_deletion() => {
                let changed = existing.status == Status::Live;
                existing.status = Status::Deleted;
                changed
            }
            Some(existing) => {
                let changed = existing.status != Status::Live;
                existing.status = Status::Live;
                changed
            }
            None if link.is_deletion() => false,
            None => {
                bucket.push(LinkRecord {
                    link: link.link.clone(),
                    status: Status::Live,
                    source: source.clone(),
                });
                true
            }
        }
    }
}

impl std::fmt::Debug for Dht {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dht")
            .field("spec", &self.spec)
            .field("records", &self.len())
            .field("changes", &self.current_idx())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tessera_chain::{
        Agent, DataFormat, Dna, Entry, EntryDef, Header, LinksEntry, Timestamp, Zome,
    };
    use tessera_nucleus::{NativeNucleus, NucleusGate, NucleusRegistry, NATIVE_NUCLEUS};
    use tessera_protocols::{Body, LinkReq, MsgType, PutReq};

    fn gate() -> Arc<dyn ValidationGate> {
        let mut dna = Dna::new("dht-test");
        dna.zomes.push(Zome {
            name: "z".into(),
            description: String::new(),
            nucleus_type: NATIVE_NUCLEUS.into(),
            code: String::new(),
            code_hash: Hash::null(),
            entries: vec![
                EntryDef::new("evenNumbers", DataFormat::String),
                EntryDef::new("rating", DataFormat::Links),
            ],
            functions: vec![],
        });
        let nucleus = NativeNucleus::new()
            .validator("evenNumbers", |req| {
                let n: i64 = req.entry.as_str().and_then(|s| s.parse().ok()).unwrap_or(1);
                if n % 2 == 0 {
                    Ok(())
                } else {
                    Err(format!("Invalid entry: {n}"))
                }
            })
            .validator("rating", |req| match req.link {
                Some(link) if link.tag == "spam" => Err("no spam".into()),
                Some(_) => Ok(()),
                None => {
                    let banned = req
                        .entry
                        .links()
                        .is_some_and(|l| l.links.iter().any(|link| link.tag == "banned"));
                    if banned {
                        Err("rating entry refused".into())
                    } else {
                        Ok(())
                    }
                }
            });
        Arc::new(NucleusGate::new(
            Arc::new(RwLock::new(dna)),
            NucleusRegistry::new().with("z", nucleus),
        ))
    }

    struct Fixture {
        dht: Dht,
        agent: Agent,
        time: u64,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dht: Dht::new(HashSpec::default(), gate()),
                agent: Agent::from_seed("alice", [1u8; 32]),
                time: 0,
            }
        }

        fn package(&mut self, entry_type: &str, entry: Entry) -> (Hash, ValidationPackage) {
            self.time += 1;
            let (_, header) = Header::new(
                self.dht.spec(),
                &self.agent,
                Timestamp(self.time),
                entry_type,
                &entry,
                Hash::null(),
                None,
            )
            .unwrap();
            let hash = header.entry_link.clone();
            let pkg = ValidationPackage {
                entry_type: entry_type.into(),
                entry,
                header,
                author: self.agent.public_key_bytes().to_vec(),
            };
            (hash, pkg)
        }

        fn msg(&mut self, msg_type: MsgType, body: Body) -> Message {
            self.time += 1;
            Message {
                msg_type,
                time: Timestamp(self.time),
                from: self.agent.peer_id(),
                body,
            }
        }

        fn put(&mut self, entry_type: &str, entry: Entry) -> (Hash, Result<()>) {
            let (hash, pkg) = self.package(entry_type, entry);
            let msg = self.msg(MsgType::PutRequest, Body::Put(PutReq { hash: hash.clone() }));
            let result = self.dht.put(&msg, &hash, &pkg);
            (hash, result)
        }
    }

    #[test]
    fn put_then_exists() {
        let mut fx = Fixture::new();
        let (hash, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        fx.dht.exists(&hash, StatusMask::LIVE).unwrap();

        let unknown = HashSpec::default().sum(b"nothing");
        assert!(matches!(fx.dht.exists(&unknown, StatusMask::LIVE), Err(Error::HashNotFound)));
    }

    #[test]
    fn rejected_put_is_kept_and_logged() {
        let mut fx = Fixture::new();
        let (hash, result) = fx.put("evenNumbers", Entry::Text("41".into()));
        match result {
            Err(Error::ValidationFailed(reason)) => assert_eq!(reason, "Invalid entry: 41"),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(matches!(fx.dht.exists(&hash, StatusMask::LIVE), Err(Error::HashRejected)));
        assert_eq!(fx.dht.current_idx(), 1);
        assert_eq!(fx.dht.history(&hash), vec![1]);

        // still served, so replicas replaying the put reach the same verdict
        let pkg = fx.dht.package(&hash).unwrap();
        assert_eq!(pkg.entry, Entry::Text("41".into()));
        let replica = Dht::new(HashSpec::default(), gate());
        let msg = fx.dht.puts_since(0, 1).remove(0).msg;
        assert!(matches!(replica.put(&msg, &hash, &pkg), Err(Error::ValidationFailed(_))));
        assert!(matches!(replica.exists(&hash, StatusMask::LIVE), Err(Error::HashRejected)));
        assert_eq!(replica.current_idx(), 1);
    }

    #[test]
    fn duplicate_fingerprint_is_noop() {
        let mut fx = Fixture::new();
        let (hash, pkg) = fx.package("evenNumbers", Entry::Text("4".into()));
        let msg = fx.msg(MsgType::PutRequest, Body::Put(PutReq { hash: hash.clone() }));
        fx.dht.put(&msg, &hash, &pkg).unwrap();

        // relayed by another peer: same fingerprint
        let mut relayed = msg.clone();
        relayed.from = Agent::from_seed("bob", [2u8; 32]).peer_id();
        fx.dht.put(&relayed, &hash, &pkg).unwrap();

        assert_eq!(fx.dht.current_idx(), 1);
        assert_eq!(fx.dht.get(&hash, StatusMask::LIVE).unwrap().sources.len(), 1);
    }

    #[test]
    fn package_must_match_hash() {
        let mut fx = Fixture::new();
        let (hash, _) = fx.package("evenNumbers", Entry::Text("2".into()));
        let (_, other_pkg) = fx.package("evenNumbers", Entry::Text("6".into()));
        let msg = fx.msg(MsgType::PutRequest, Body::Put(PutReq { hash: hash.clone() }));
        assert!(matches!(fx.dht.put(&msg, &hash, &other_pkg), Err(Error::BadPackage(_))));
        assert!(!fx.dht.seen(&msg.fingerprint().unwrap()));
    }

    #[test]
    fn delete_lifecycle() {
        let mut fx = Fixture::new();
        let (hash, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();

        let del = fx.msg(
            MsgType::DelRequest,
            Body::Del(tessera_protocols::DelReq { hash: hash.clone(), by: Hash::null() }),
        );
        fx.dht.del(&del, &hash).unwrap();
        assert!(matches!(fx.dht.exists(&hash, StatusMask::LIVE), Err(Error::HashDeleted)));
        assert_eq!(fx.dht.get(&hash, StatusMask::DELETED).unwrap().status, Status::Deleted);

        // deleting again is a status mismatch
        let again = fx.msg(
            MsgType::DelRequest,
            Body::Del(tessera_protocols::DelReq { hash: hash.clone(), by: Hash::null() }),
        );
        assert!(matches!(fx.dht.del(&again, &hash), Err(Error::HashDeleted)));
    }

    #[test]
    fn modify_keeps_forward_pointer() {
        let mut fx = Fixture::new();
        let (old, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        let (new, pkg) = fx.package("evenNumbers", Entry::Text("8".into()));
        let msg = fx.msg(
            MsgType::ModRequest,
            Body::Mod(tessera_protocols::ModReq { hash: old.clone(), new_hash: new.clone() }),
        );
        fx.dht.modify(&msg, &old, &new, &pkg).unwrap();

        assert!(matches!(fx.dht.exists(&old, StatusMask::LIVE), Err(Error::HashModified)));
        let record = fx.dht.get(&old, StatusMask::ANY).unwrap();
        assert_eq!(record.replaced_by, Some(new.clone()));
        fx.dht.exists(&new, StatusMask::LIVE).unwrap();
    }

    #[test]
    fn modify_to_invalid_entry_is_refused() {
        let mut fx = Fixture::new();
        let (old, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        let (new, pkg) = fx.package("evenNumbers", Entry::Text("3".into()));
        let msg = fx.msg(
            MsgType::ModRequest,
            Body::Mod(tessera_protocols::ModReq { hash: old.clone(), new_hash: new.clone() }),
        );
        assert!(matches!(fx.dht.modify(&msg, &old, &new, &pkg), Err(Error::ValidationFailed(_))));
        fx.dht.exists(&old, StatusMask::LIVE).unwrap();
    }

    #[test]
    fn modify_is_logged_under_both_hashes() {
        let mut fx = Fixture::new();
        let (old, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        let (new, pkg) = fx.package("evenNumbers", Entry::Text("10".into()));
        let msg = fx.msg(
            MsgType::ModRequest,
            Body::Mod(tessera_protocols::ModReq { hash: old.clone(), new_hash: new.clone() }),
        );
        fx.dht.modify(&msg, &old, &new, &pkg).unwrap();
        assert_eq!(fx.dht.history(&old), vec![1, 2]);
        assert_eq!(fx.dht.history(&new), vec![2]);
    }

    #[test]
    fn modify_to_rejected_entry_is_refused() {
        let mut fx = Fixture::new();
        let (old, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        let (new, pkg) = fx.package("evenNumbers", Entry::Text("5".into()));
        let put = fx.msg(MsgType::PutRequest, Body::Put(PutReq { hash: new.clone() }));
        assert!(fx.dht.put(&put, &new, &pkg).is_err());

        let msg = fx.msg(
            MsgType::ModRequest,
            Body::Mod(tessera_protocols::ModReq { hash: old.clone(), new_hash: new.clone() }),
        );
        assert!(matches!(fx.dht.modify(&msg, &old, &new, &pkg), Err(Error::HashRejected)));
        fx.dht.exists(&old, StatusMask::LIVE).unwrap();
        assert_eq!(fx.dht.get(&old, StatusMask::ANY).unwrap().replaced_by, None);
        assert!(!fx.dht.seen(&msg.fingerprint().unwrap()));
    }

    fn link_setup(fx: &mut Fixture, tags: &[&str]) -> (Hash, Hash, ValidationPackage) {
        let (base, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        let (target, result) = fx.put("evenNumbers", Entry::Text("4".into()));
        result.unwrap();
        let links = LinksEntry {
            links: tags
                .iter()
                .map(|t| Link::new(base.clone(), target.clone(), *t))
                .collect(),
        };
        let (links_hash, pkg) = fx.package("rating", links.to_entry().unwrap());
        let put = fx.msg(MsgType::PutRequest, Body::Put(PutReq { hash: links_hash.clone() }));
        fx.dht.put(&put, &links_hash, &pkg).unwrap();
        (base, links_hash, pkg)
    }

    #[test]
    fn links_of_rejected_entry_are_not_indexed() {
        let mut fx = Fixture::new();
        let (base, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        let (target, result) = fx.put("evenNumbers", Entry::Text("4".into()));
        result.unwrap();
        let links = LinksEntry {
            links: vec![Link::new(base.clone(), target, "banned")],
        };
        let (links_hash, result) = fx.put("rating", links.to_entry().unwrap());
        assert!(matches!(result, Err(Error::ValidationFailed(_))));
        let pkg = fx.dht.package(&links_hash).unwrap();

        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        assert!(matches!(
            fx.dht.put_links(&msg, &base, &links_hash, &pkg),
            Err(Error::HashRejected)
        ));
        assert!(matches!(
            fx.dht.get_links(&base, "banned", StatusMask::ANY),
            Err(Error::LinkNotFound)
        ));
        assert!(!fx.dht.seen(&msg.fingerprint().unwrap()));
    }

    #[test]
    fn links_entry_must_be_held() {
        let mut fx = Fixture::new();
        let (base, result) = fx.put("evenNumbers", Entry::Text("2".into()));
        result.unwrap();
        let links = LinksEntry {
            links: vec![Link::new(base.clone(), base.clone(), "self")],
        };
        let (links_hash, pkg) = fx.package("rating", links.to_entry().unwrap());
        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        assert!(matches!(
            fx.dht.put_links(&msg, &base, &links_hash, &pkg),
            Err(Error::HashNotFound)
        ));
    }

    #[test]
    fn links_dedup_on_replay() {
        let mut fx = Fixture::new();
        let (base, links_hash, pkg) = link_setup(&mut fx, &["4 stars"]);
        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        assert_eq!(fx.dht.put_links(&msg, &base, &links_hash, &pkg).unwrap(), 1);
        assert_eq!(fx.dht.put_links(&msg, &base, &links_hash, &pkg).unwrap(), 0);

        // a second, distinct request for the same link
        let msg2 = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        assert_eq!(fx.dht.put_links(&msg2, &base, &links_hash, &pkg).unwrap(), 0);

        let found = fx.dht.get_links(&base, "4 stars", StatusMask::LIVE).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, fx.agent.peer_id());
    }

    #[test]
    fn link_lookup_errors() {
        let mut fx = Fixture::new();
        let (base, links_hash, pkg) = link_setup(&mut fx, &["4 stars"]);
        let unknown = HashSpec::default().sum(b"nope");
        assert!(matches!(
            fx.dht.get_links(&unknown, "4 stars", StatusMask::LIVE),
            Err(Error::HashNotFound)
        ));
        assert!(matches!(
            fx.dht.get_links(&base, "4 stars", StatusMask::LIVE),
            Err(Error::LinkNotFound)
        ));

        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        fx.dht.put_links(&msg, &base, &links_hash, &pkg).unwrap();
        assert!(fx.dht.get_links(&base, "other", StatusMask::LIVE).is_err());
    }

    #[test]
    fn missing_base_is_not_logged() {
        let mut fx = Fixture::new();
        let base = HashSpec::default().sum(b"absent");
        let links = LinksEntry {
            links: vec![Link::new(base.clone(), base.clone(), "t")],
        };
        let (links_hash, pkg) = fx.package("rating", links.to_entry().unwrap());
        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        assert!(matches!(
            fx.dht.put_links(&msg, &base, &links_hash, &pkg),
            Err(Error::HashNotFound)
        ));
        assert!(!fx.dht.seen(&msg.fingerprint().unwrap()));
    }

    #[test]
    fn one_bad_link_does_not_block_others() {
        let mut fx = Fixture::new();
        let (base, links_hash, pkg) = link_setup(&mut fx, &["spam", "4 stars"]);
        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        assert_eq!(fx.dht.put_links(&msg, &base, &links_hash, &pkg).unwrap(), 1);
        assert_eq!(fx.dht.get_links(&base, "4 stars", StatusMask::LIVE).unwrap().len(), 1);
        assert!(matches!(
            fx.dht.get_links(&base, "spam", StatusMask::ANY),
            Err(Error::LinkNotFound)
        ));
    }

    #[test]
    fn deletion_link_hides_target() {
        let mut fx = Fixture::new();
        let (base, links_hash, pkg) = link_setup(&mut fx, &["4 stars"]);
        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
        );
        fx.dht.put_links(&msg, &base, &links_hash, &pkg).unwrap();

        let target = pkg.entry.links().unwrap().links[0].link.clone();
        let del = LinksEntry {
            links: vec![Link::deletion(base.clone(), target.clone(), "4 stars")],
        };
        let (del_hash, del_pkg) = fx.package("rating", del.to_entry().unwrap());
        let put = fx.msg(MsgType::PutRequest, Body::Put(PutReq { hash: del_hash.clone() }));
        fx.dht.put(&put, &del_hash, &del_pkg).unwrap();
        let msg = fx.msg(
            MsgType::LinkRequest,
            Body::Link(LinkReq { base: base.clone(), links: del_hash.clone() }),
        );
        assert_eq!(fx.dht.put_links(&msg, &base, &del_hash, &del_pkg).unwrap(), 1);

        assert!(fx.dht.get_links(&base, "4 stars", StatusMask::LIVE).unwrap().is_empty());
        let deleted = fx.dht.get_links(&base, "4 stars", StatusMask::DELETED).unwrap();
        assert_eq!(deleted[0].hash, target);
    }

    #[test]
    fn distinct_keys_mutate_concurrently() {
        let mut fx = Fixture::new();
        let work: Vec<_> = (0..8)
            .map(|i| {
                let (hash, pkg) = fx.package("evenNumbers", Entry::Text((i * 2).to_string()));
                let msg = fx.msg(MsgType::PutRequest, Body::Put(PutReq { hash: hash.clone() }));
                (hash, pkg, msg)
            })
            .collect();
        let dht = Arc::new(Dht::new(HashSpec::default(), gate()));
        let handles: Vec<_> = work
            .into_iter()
            .map(|(hash, pkg, msg)| {
                let dht = dht.clone();
                std::thread::spawn(move || dht.put(&msg, &hash, &pkg))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(dht.len(), 8);
        assert_eq!(dht.current_idx(), 8);
    }

    proptest! {
        #[test]
        fn replay_order_does_not_matter(order in proptest::collection::vec(0usize..3, 1..12)) {
            let mut fx = Fixture::new();
            let (base, links_hash, pkg) = link_setup(&mut fx, &["a", "b", "c"]);
            let msgs: Vec<Message> = (0..3)
                .map(|_| fx.msg(
                    MsgType::LinkRequest,
                    Body::Link(LinkReq { base: base.clone(), links: links_hash.clone() }),
                ))
                .collect();
            for i in order {
                fx.dht.put_links(&msgs[i], &base, &links_hash, &pkg).unwrap();
            }
            for tag in ["a", "b", "c"] {
                prop_assert_eq!(fx.dht.get_links(&base, tag, StatusMask::LIVE).unwrap().len(), 1);
            }
        }
    }
}
