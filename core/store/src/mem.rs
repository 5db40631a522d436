use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::batch::apply_to_btreemap;
use crate::{Database, Iter, StoreError, WriteBatch};

/// In-memory, ordered `Database` backed by a `BTreeMap`. Used by unit tests
/// throughout `chain-migrate` so the codec, probe, migrator, and verifier
/// can be exercised without touching disk.
#[derive(Default)]
pub struct MemDatabase {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Database for MemDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.map.read().unwrap().get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        apply_to_btreemap(&batch, &mut self.map.write().unwrap());
        Ok(())
    }

    fn iter(&self) -> Box<dyn Iter + '_> {
        // Snapshot the ordered contents up front: `BTreeMap` iteration
        // can't safely outlive a held `RwLockReadGuard` across calls from a
        // trait object, and the stores this tool migrates are small enough
        // that this is the simplest correct choice.
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .map
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(MemIter {
            entries: snapshot,
            pos: None,
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct MemIter {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    /// `None` means "before the first / after the last"; `Some(i)` is the
    /// current index into `entries`.
    pos: Option<usize>,
}

impl Iter for MemIter {
    fn seek_to_first(&mut self) {
        self.pos = if self.entries.is_empty() { None } else { Some(0) };
    }

    fn seek_to_last(&mut self) {
        self.pos = if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.len() - 1)
        };
    }

    fn seek(&mut self, key: &[u8]) {
        self.pos = self
            .entries
            .iter()
            .position(|(k, _)| k.as_slice() >= key);
    }

    fn next(&mut self) {
        self.pos = match self.pos {
            Some(i) if i + 1 < self.entries.len() => Some(i + 1),
            _ => None,
        };
    }

    fn prev(&mut self) {
        self.pos = match self.pos {
            Some(i) if i > 0 => Some(i - 1),
            _ => None,
        };
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> Option<&[u8]> {
        self.pos.map(|i| self.entries[i].0.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.pos.map(|i| self.entries[i].1.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_lands_on_first_key_at_or_after_target() {
        let db = MemDatabase::new();
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"c".to_vec(), b"3".to_vec());
        db.write(batch).unwrap();

        let mut it = db.iter();
        it.seek(b"b");
        assert!(it.valid());
        assert_eq!(it.key(), Some(b"c".as_slice()));
    }
}
