//! Per-key mutation locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tessera_hash::Hash;

/// Map from key to a small mutex.
///
/// Mutations of one key run one at a time; distinct keys proceed
/// independently. Entries are dropped once no holder remains.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<Hash, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Hash, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` holding the locks for every key in `keys`.
    ///
    /// Keys are locked in sorted order so overlapping multi-key callers
    /// cannot deadlock.
    pub fn with_keys<T>(&self, keys: &[&Hash], f: impl FnOnce() -> T) -> T {
        let mut sorted: Vec<&Hash> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let cells: Vec<(Hash, Arc<Mutex<()>>)> = {
            let mut table = self.table();
            sorted
                .iter()
                .map(|k| {
                    let cell = table.entry((*k).clone()).or_default().clone();
                    ((*k).clone(), cell)
                })
                .collect()
        };

        let out = {
            let _guards: Vec<MutexGuard<'_, ()>> = cells
                .iter()
                .map(|(_, cell)| cell.lock().unwrap_or_else(PoisonError::into_inner))
                .collect();
            f()
        };

        let mut table = self.table();
        for (key, cell) in cells {
            // one reference in the table, one here
            if Arc::strong_count(&cell) == 2 {
                table.remove(&key);
            }
        }
        out
    }

    pub fn with_key<T>(&self, key: &Hash, f: impl FnOnce() -> T) -> T {
        self.with_keys(&[key], f)
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
