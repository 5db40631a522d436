//! Head-pointer Writer: installs the well-known head keys
//! consistent with the reconstructed tip, in one atomic batch.

use chain_primitives::{canonical_key, Hash, Height, Layout};
use chain_store::{Database, WriteBatch};
use tracing::info;

use crate::error::MigrateError;

const HEAD_POINTER_NAMES: &[&str] = &["LastBlock", "LastHeader", "LastFast", "LastPivot"];

#[derive(Debug, Clone)]
pub struct HeadOptions {
    pub layout: Layout,
    pub height: Height,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HeadReport {
    pub tip: Height,
    pub tip_hash: Hash,
}

/// Sets `LastBlock`/`LastHeader`/`LastFast`/`LastPivot`/`Height`/`lastAccepted`
/// to the tip at `options.height`, reading the tip hash from the
/// `Canonical` index, and deletes any surviving defective 10-byte
/// `Canonical` entry at that height in the same batch.
pub fn set_head(store: &dyn Database, options: &HeadOptions) -> Result<HeadReport, MigrateError> {
    let tip_key = canonical_key(options.height, options.layout);
    let tip_hash_bytes = store
        .get(&tip_key)?
        .ok_or_else(|| MigrateError::BrokenChain {
            height: options.height,
            reason: "no canonical entry at the requested tip height".to_string(),
        })?;
    let tip_hash = Hash::try_from(tip_hash_bytes.as_slice()).map_err(|_| MigrateError::BrokenChain {
        height: options.height,
        reason: format!("canonical value has length {}, expected 32", tip_hash_bytes.len()),
    })?;

    let mut batch = WriteBatch::new();
    for name in HEAD_POINTER_NAMES {
        batch.put(name.as_bytes().to_vec(), tip_hash.to_vec());
    }
    batch.put(b"Height".to_vec(), options.height.to_be_bytes().to_vec());
    batch.put(b"lastAccepted".to_vec(), {
        // `replay_consensus` already wrote `last_accepted`'s deterministic
        // snowmanId; Head-pointer installation mirrors it under the
        // well-known meta name so readers that only know the head-pointer
        // surface can find it without knowing the state-prefix scheme.
        chain_primitives::AcceptedBlock::snowman_id(options.height, tip_hash).to_vec()
    });

    // Delete any surviving legacy 10-byte defect at the tip height.
    let defective = {
        let mut k = vec![0x68u8];
        k.extend_from_slice(&options.height.to_be_bytes());
        k.push(0x6e);
        k
    };
    if store.has(&defective)? {
        batch.delete(defective);
    }

    store.write(batch)?;
    info!(height = options.height, %tip_hash, "head pointers installed");

    Ok(HeadReport {
        tip: options.height,
        tip_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_store::MemDatabase;

    #[test]
    fn installs_all_head_pointers() {
        let db = MemDatabase::new();
        let mut batch = WriteBatch::new();
        batch.put(canonical_key(10, Layout::Bare), vec![5u8; 32]);
        db.write(batch).unwrap();

        let report = set_head(&db, &HeadOptions { layout: Layout::Bare, height: 10 }).unwrap();
        assert_eq!(report.tip, 10);
        assert_eq!(db.get(b"Height").unwrap(), Some(10u64.to_be_bytes().to_vec()));
        for name in HEAD_POINTER_NAMES {
            assert_eq!(db.get(name.as_bytes()).unwrap(), Some(vec![5u8; 32]));
        }
        assert!(db.has(b"lastAccepted").unwrap());
    }

    #[test]
    fn deletes_surviving_defective_canonical_at_tip() {
        let db = MemDatabase::new();
        let mut batch = WriteBatch::new();
        batch.put(canonical_key(7, Layout::Bare), vec![9u8; 32]);
        let defective = vec![0x68, 0, 0, 0, 0, 0, 0, 0, 7, 0x6e];
        batch.put(defective.clone(), vec![1, 2, 3]);
        db.write(batch).unwrap();

        set_head(&db, &HeadOptions { layout: Layout::Bare, height: 7 }).unwrap();
        assert_eq!(db.get(&defective).unwrap(), None);
    }
}
