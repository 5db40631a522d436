//! Canonical Rebuilder: reconstructs `Canonical` and
//! `HashToNum` entries by walking parent-hash pointers back from the tip
//! header, using a proper RLP length decoder rather than a fixed offset.

use chain_primitives::{
    canonical_key, classify_layout, encode, hash_to_num_key, parent_hash_of, Hash, Height,
    KeyFamily, Layout, LogicalKey,
};
use chain_store::{Database, WriteBatch};
use tracing::info;

use crate::error::MigrateError;

#[derive(Debug, Clone)]
pub struct RebuildOptions {
    pub layout: Layout,
    pub batch_size: usize,
    /// Heights above this are ignored when searching for the tip header.
    pub max_height: Option<Height>,
    /// Skip tip auto-detection and start the walk from this `(height, hash)`.
    pub from_tip: Option<(Height, Hash)>,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        RebuildOptions {
            layout: Layout::Bare,
            batch_size: 10_000,
            max_height: None,
            from_tip: None,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CanonicalReport {
    pub heights_written: u64,
    pub tip: Option<Height>,
}

fn header_key(number: Height, hash: Hash, layout: Layout) -> Vec<u8> {
    let logical = LogicalKey {
        family: KeyFamily::Header,
        number: Some(number),
        hash: Some(hash),
        tail: None,
        revision: None,
        defective_bare_canonical: false,
    };
    encode(&logical, layout, None, None).expect("Header encode with number+hash set never fails")
}

fn find_tip_header(
    store: &dyn Database,
    layout: Layout,
    max_height: Option<Height>,
) -> Option<(Height, Hash)> {
    let mut it = store.iter();
    it.seek_to_first();
    let mut best: Option<(Height, Hash)> = None;
    while it.valid() {
        let key = it.key().unwrap();
        let (found_layout, logical) = classify_layout(key, None);
        if found_layout == layout && logical.family == KeyFamily::Header {
            if let (Some(number), Some(hash)) = (logical.number, logical.hash) {
                if max_height.map_or(true, |m| number <= m)
                    && best.map_or(true, |(best_number, _)| number > best_number)
                {
                    best = Some((number, hash));
                }
            }
        }
        it.next();
    }
    best
}

/// Walks parent pointers from the tip header down to height 0, writing
/// `Canonical`/`HashToNum` entries into `store` as it goes. Aborts with
/// `BrokenChain` on the first missing header or malformed RLP payload,
/// leaving everything committed so far in place.
pub fn rebuild_canonical(
    store: &dyn Database,
    options: &RebuildOptions,
) -> Result<CanonicalReport, MigrateError> {
    let (mut number, mut hash) = match options.from_tip {
        Some(pair) => pair,
        None => find_tip_header(store, options.layout, options.max_height).ok_or_else(|| {
            MigrateError::BrokenChain {
                height: 0,
                reason: "no Header entries found to locate a tip".to_string(),
            }
        })?,
    };
    let tip = number;
    info!(tip, "canonical rebuilder: walking back from tip");

    let mut batch = WriteBatch::new();
    let mut pending = 0usize;
    let mut written = 0u64;

    loop {
        batch.put(canonical_key(number, options.layout), hash.to_vec());
        batch.put(
            hash_to_num_key(hash, options.layout),
            number.to_be_bytes().to_vec(),
        );
        written += 1;
        pending += 2;

        if pending >= options.batch_size {
            store.write(std::mem::take(&mut batch))?;
            pending = 0;
        }

        if number == 0 {
            break;
        }

        let key = header_key(number, hash, options.layout);
        let value = store.get(&key)?.ok_or_else(|| MigrateError::BrokenChain {
            height: number,
            reason: "missing header entry".to_string(),
        })?;
        let parent = parent_hash_of(&value).map_err(|e| MigrateError::BrokenChain {
            height: number,
            reason: e.to_string(),
        })?;

        number -= 1;
        hash = parent;
    }

    if pending > 0 {
        store.write(batch)?;
    }

    Ok(CanonicalReport {
        heights_written: written,
        tip: Some(tip),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_primitives::sha256;
    use chain_store::MemDatabase;

    fn rlp_header(parent: Hash) -> Vec<u8> {
        let mut stream = rlp::RlpStream::new_list(1);
        stream.append(&parent.as_bytes().as_slice());
        stream.out().to_vec()
    }

    fn write_chain(db: &MemDatabase, len: u64) -> Hash {
        let mut batch = WriteBatch::new();
        let mut parent = Hash::ZERO;
        let mut tip_hash = Hash::ZERO;
        for h in 0..len {
            let hash = sha256(&[&h.to_be_bytes()]);
            batch.put(header_key(h, hash, Layout::Bare), rlp_header(parent));
            parent = hash;
            tip_hash = hash;
        }
        db.write(batch).unwrap();
        tip_hash
    }

    #[test]
    fn walks_back_to_genesis_and_writes_all_heights() {
        let db = MemDatabase::new();
        write_chain(&db, 5);
        let report = rebuild_canonical(&db, &RebuildOptions::default()).unwrap();
        assert_eq!(report.tip, Some(4));
        assert_eq!(report.heights_written, 5);
        for h in 0..5u64 {
            assert!(db.has(&canonical_key(h, Layout::Bare)).unwrap());
        }
    }

    #[test]
    fn missing_header_aborts_with_broken_chain() {
        let db = MemDatabase::new();
        let tip_hash = write_chain(&db, 3);
        // Delete the height-1 header so the walk breaks before genesis.
        let mut batch = WriteBatch::new();
        let h1_hash = sha256(&[&1u64.to_be_bytes()]);
        batch.delete(header_key(1, h1_hash, Layout::Bare));
        db.write(batch).unwrap();

        let err = rebuild_canonical(
            &db,
            &RebuildOptions {
                from_tip: Some((2, tip_hash)),
                ..RebuildOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::BrokenChain { height: 1, .. }));
    }
}
