//! KV Store Adapter: an ordered, byte-keyed store abstraction with a
//! RocksDB-backed implementation and an in-memory implementation for tests.

pub mod batch;
pub mod error;
pub mod iter;
pub mod mem;
pub mod rocks;

pub use batch::WriteBatch;
pub use error::StoreError;
pub use iter::Iter;
pub use mem::MemDatabase;
pub use rocks::RocksDbDatabase;

/// Ordered, byte-keyed key-value store. Every on-disk layout this pipeline
/// reads or writes (`Namespaced`, `EvmPrefixed`, `Bare`) lives in a single
/// flat keyspace per store — there is no column-family split, since none of
/// the source or target layouts this tool handles need one.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Applies `batch` atomically.
    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// A cursor positioned before the first key; call `seek_to_first` (or
    /// `seek`) before reading.
    fn iter(&self) -> Box<dyn Iter + '_>;

    fn flush(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(db: &dyn Database) {
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.put(b"c".to_vec(), b"3".to_vec());
        db.write(batch).unwrap();

        assert_eq!(db.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert!(db.has(b"a").unwrap());
        assert!(!db.has(b"z").unwrap());

        let mut it = db.iter();
        it.seek_to_first();
        let mut seen = Vec::new();
        while it.valid() {
            seen.push((it.key().unwrap().to_vec(), it.value().unwrap().to_vec()));
            it.next();
        }
        assert_eq!(
            seen,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"c".to_vec(), b"3".to_vec()),
            ]
        );

        let mut delete = WriteBatch::new();
        delete.delete(b"b".to_vec());
        db.write(delete).unwrap();
        assert_eq!(db.get(b"b").unwrap(), None);
    }

    #[test]
    fn mem_database_behaves_like_an_ordered_store() {
        let db = MemDatabase::new();
        exercise(&db);
    }

    #[test]
    fn rocksdb_database_behaves_like_an_ordered_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = RocksDbDatabase::open(dir.path()).unwrap();
        exercise(&db);
    }
}
