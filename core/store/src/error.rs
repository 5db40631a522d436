use std::path::PathBuf;

/// Errors raised by the KV Store Adapter.
///
/// Every variant carries enough context — the store path, the key involved —
/// to reproduce the failure without re-running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rocksdb::Error,
    },
    #[error("I/O error on store: {0}")]
    Io(#[from] rocksdb::Error),
    #[error("write batch could not be applied: {0}")]
    BatchWrite(rocksdb::Error),
}
