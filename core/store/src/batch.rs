/// A single staged mutation in a [`WriteBatch`].
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// An ordered set of put/delete operations applied atomically by
/// [`crate::Database::write`].
///
/// Callers accumulate operations and hand the whole batch to the store in
/// one `write` call, rather than issuing one `put`/`delete` per key.
#[derive(Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &BatchOp> {
        self.ops.iter()
    }
}

pub(crate) fn apply_to_rocksdb(
    batch: &WriteBatch,
    raw: &mut rocksdb::WriteBatch,
) {
    for op in batch.iter() {
        match op {
            BatchOp::Put(k, v) => raw.put(k, v),
            BatchOp::Delete(k) => raw.delete(k),
        }
    }
}

pub(crate) fn apply_to_btreemap(
    batch: &WriteBatch,
    map: &mut std::collections::BTreeMap<Vec<u8>, Vec<u8>>,
) {
    for op in batch.iter() {
        match op {
            BatchOp::Put(k, v) => {
                map.insert(k.clone(), v.clone());
            }
            BatchOp::Delete(k) => {
                map.remove(k.as_slice());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_op_count() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.put(vec![1], vec![2]);
        batch.delete(vec![3]);
        assert_eq!(batch.len(), 2);
    }
}
