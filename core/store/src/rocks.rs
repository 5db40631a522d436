use std::path::{Path, PathBuf};

use rocksdb::{Options, DB};

use crate::batch::apply_to_rocksdb;
use crate::{Database, Iter, StoreError, WriteBatch};

/// RocksDB-backed `Database`. The on-disk layouts this tool reads and
/// writes are all flat keyspaces, so one column family (RocksDB's default)
/// is enough; there's no need to split the keyspace across column families.
pub struct RocksDbDatabase {
    db: DB,
    path: PathBuf,
}

impl RocksDbDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let db = DB::open(&opts, &path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(RocksDbDatabase { db, path })
    }

    /// Opens an existing store read-only-ish but creating nothing; used by
    /// commands (`probe`, `verify`) that should fail loudly if pointed at a
    /// path that isn't already a store, rather than silently creating one.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let opts = Options::default();
        let db = DB::open(&opts, &path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(RocksDbDatabase { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Database for RocksDbDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut raw = rocksdb::WriteBatch::default();
        apply_to_rocksdb(&batch, &mut raw);
        self.db.write(raw).map_err(StoreError::BatchWrite)
    }

    fn iter(&self) -> Box<dyn Iter + '_> {
        Box::new(RocksIter {
            inner: self.db.raw_iterator(),
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(self.db.flush()?)
    }
}

struct RocksIter<'a> {
    inner: rocksdb::DBRawIterator<'a>,
}

impl Iter for RocksIter<'_> {
    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
    }

    fn seek(&mut self, key: &[u8]) {
        self.inner.seek(key);
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn prev(&mut self) {
        self.inner.prev();
    }

    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn key(&self) -> Option<&[u8]> {
        self.inner.key()
    }

    fn value(&self) -> Option<&[u8]> {
        self.inner.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_directory_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store");
        {
            let db = RocksDbDatabase::open(&path).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(b"k".to_vec(), b"v".to_vec());
            db.write(batch).unwrap();
        }
        let db = RocksDbDatabase::open_existing(&path).unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
