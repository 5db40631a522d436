//! Verifier: read-only cross-check of the invariants a
//! successful pipeline run must establish.

use chain_primitives::{
    canonical_key, encode, hash_to_num_key, parent_hash_of, AcceptedBlock, Hash, Height, KeyFamily,
    Layout, LogicalKey,
};
use chain_store::Database;

use crate::error::MigrateError;

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

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct VerifyReport {
    pub checks: Vec<CheckResult>,
}

impl VerifyReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub layout: Layout,
    pub tip: Height,
    pub sample: usize,
    pub prefix: Vec<u8>,
    pub revision: u64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            layout: Layout::Bare,
            tip: 0,
            sample: 100,
            prefix: b"state".to_vec(),
            revision: 1,
        }
    }
}

/// Heights `{0, 1, 10, 100, ...}` up to and including `tip`, the sampled
/// grid a successful pipeline run is checked against.
fn sample_grid(tip: Height) -> Vec<Height> {
    let mut grid = vec![0u64];
    let mut step = 1u64;
    while step < tip {
        grid.push(step);
        step *= 10;
    }
    grid.push(tip);
    grid.sort_unstable();
    grid.dedup();
    grid
}

fn check_i1(store: &dyn Database, layout: Layout, tip: Height) -> CheckResult {
    for height in sample_grid(tip) {
        let hash_bytes = match store.get(&canonical_key(height, layout)) {
            Ok(Some(v)) => v,
            Ok(None) => {
                return CheckResult {
                    name: "I1".to_string(),
                    passed: false,
                    detail: Some(format!("missing Canonical entry at height {height}")),
                }
            }
            Err(e) => {
                return CheckResult {
                    name: "I1".to_string(),
                    passed: false,
                    detail: Some(e.to_string()),
                }
            }
        };
        let hash = match Hash::try_from(hash_bytes.as_slice()) {
            Ok(h) => h,
            Err(_) => {
                return CheckResult {
                    name: "I1".to_string(),
                    passed: false,
                    detail: Some(format!("malformed canonical hash at height {height}")),
                }
            }
        };
        match store.get(&hash_to_num_key(hash, layout)) {
            Ok(Some(back)) if back == height.to_be_bytes() => {}
            _ => {
                return CheckResult {
                    name: "I1".to_string(),
                    passed: false,
                    detail: Some(format!("HashToNum disagrees with Canonical at height {height}")),
                }
            }
        }

        let header_value = match store.get(&header_key(height, hash, layout)) {
            Ok(Some(v)) => v,
            _ => {
                return CheckResult {
                    name: "I1".to_string(),
                    passed: false,
                    detail: Some(format!("missing Header entry at height {height}")),
                }
            }
        };
        if height > 0 {
            let parent = match parent_hash_of(&header_value) {
                Ok(h) => h,
                Err(e) => {
                    return CheckResult {
                        name: "I1".to_string(),
                        passed: false,
                        detail: Some(format!("header at height {height} has malformed parent hash: {e}")),
                    }
                }
            };
            let expected_parent = match store.get(&canonical_key(height - 1, layout)) {
                Ok(Some(v)) => v,
                _ => {
                    return CheckResult {
                        name: "I1".to_string(),
                        passed: false,
                        detail: Some(format!("missing Canonical entry at height {}", height - 1)),
                    }
                }
            };
            if parent.as_bytes().as_slice() != expected_parent.as_slice() {
                return CheckResult {
                    name: "I1".to_string(),
                    passed: false,
                    detail: Some(format!(
                        "header at height {height} does not chain to the canonical hash at height {}",
                        height - 1
                    )),
                };
            }
        }
    }
    CheckResult {
        name: "I1".to_string(),
        passed: true,
        detail: None,
    }
}

fn check_i3(store: &dyn Database, tip: Height) -> CheckResult {
    let height_ok = matches!(store.get(b"Height"), Ok(Some(v)) if v == tip.to_be_bytes());
    if !height_ok {
        return CheckResult {
            name: "I3".to_string(),
            passed: false,
            detail: Some("Height pointer does not equal tip".to_string()),
        };
    }
    CheckResult {
        name: "I3".to_string(),
        passed: true,
        detail: None,
    }
}

fn check_i4(
    store: &dyn Database,
    layout: Layout,
    tip: Height,
    sample: usize,
    prefix: &[u8],
    revision: u64,
) -> CheckResult {
    let grid = sample_grid(tip);
    let grid = grid.into_iter().take(sample.max(1));
    for height in grid {
        let eth_hash_bytes = match store.get(&canonical_key(height, layout)) {
            Ok(Some(v)) => v,
            _ => {
                return CheckResult {
                    name: "I4".to_string(),
                    passed: false,
                    detail: Some(format!("missing canonical hash at height {height}")),
                }
            }
        };
        let eth_hash = match Hash::try_from(eth_hash_bytes.as_slice()) {
            Ok(h) => h,
            Err(_) => {
                return CheckResult {
                    name: "I4".to_string(),
                    passed: false,
                    detail: Some(format!("malformed canonical hash at height {height}")),
                }
            }
        };
        let expected = AcceptedBlock::snowman_id(height, eth_hash);
        let key = crate::consensus::state_key(
            prefix,
            &crate::consensus::prefixed(0x00, expected.as_bytes()),
            revision,
        );
        match store.get(&key) {
            Ok(Some(raw)) => match AcceptedBlock::decode(&raw) {
                Ok(block) if block.snowman_id == expected => {}
                _ => {
                    return CheckResult {
                        name: "I4".to_string(),
                        passed: false,
                        detail: Some(format!("AcceptedBlock record mismatch at height {height}")),
                    }
                }
            },
            _ => {
                return CheckResult {
                    name: "I4".to_string(),
                    passed: false,
                    detail: Some(format!("missing AcceptedBlock record at height {height}")),
                }
            }
        }
    }
    CheckResult {
        name: "I4".to_string(),
        passed: true,
        detail: None,
    }
}

fn check_head_pointers(store: &dyn Database, layout: Layout, tip: Height) -> CheckResult {
    let tip_hash = match store.get(&canonical_key(tip, layout)) {
        Ok(Some(v)) => v,
        _ => {
            return CheckResult {
                name: "head-pointers".to_string(),
                passed: false,
                detail: Some("no canonical entry at tip".to_string()),
            }
        }
    };
    for name in ["LastBlock", "LastHeader", "LastFast"] {
        match store.get(name.as_bytes()) {
            Ok(Some(v)) if v == tip_hash => {}
            _ => {
                return CheckResult {
                    name: "head-pointers".to_string(),
                    passed: false,
                    detail: Some(format!("{name} disagrees with the canonical tip hash")),
                }
            }
        }
    }
    CheckResult {
        name: "head-pointers".to_string(),
        passed: true,
        detail: None,
    }
}

/// Runs every check and returns a report; never mutates `store`. The CLI
/// maps `!report.all_passed()` onto `InvariantViolation` (exit code 1).
pub fn verify(store: &dyn Database, options: &VerifyOptions) -> Result<VerifyReport, MigrateError> {
    let checks = vec![
        check_i1(store, options.layout, options.tip),
        check_i3(store, options.tip),
        check_i4(
            store,
            options.layout,
            options.tip,
            options.sample,
            &options.prefix,
            options.revision,
        ),
        check_head_pointers(store, options.layout, options.tip),
    ];
    Ok(VerifyReport { checks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{canonical::{rebuild_canonical, RebuildOptions}, consensus::{replay_consensus, ConsensusOptions}, head::{set_head, HeadOptions}};
    use chain_primitives::sha256;
    use chain_store::{MemDatabase, RocksDbDatabase, WriteBatch};

    fn rlp_header(parent: Hash) -> Vec<u8> {
        let mut stream = rlp::RlpStream::new_list(1);
        stream.append(&parent.as_bytes().as_slice());
        stream.out().to_vec()
    }

    fn seed_full_pipeline(db: &dyn Database, len: u64) -> Height {
        let mut batch = WriteBatch::new();
        let mut parent = Hash::ZERO;
        for h in 0..=len {
            let hash = sha256(&[&h.to_be_bytes()]);
            batch.put(header_key(h, hash, Layout::Bare), rlp_header(parent));
            parent = hash;
        }
        db.write(batch).unwrap();
        rebuild_canonical(db, &RebuildOptions::default()).unwrap();
        replay_consensus(db, &ConsensusOptions { tip: len, ..ConsensusOptions::default() }).unwrap();
        set_head(db, &HeadOptions { layout: Layout::Bare, height: len }).unwrap();
        len
    }

    fn build_full_pipeline_store(len: u64) -> (MemDatabase, Height) {
        let db = MemDatabase::new();
        let tip = seed_full_pipeline(&db, len);
        (db, tip)
    }

    #[test]
    fn full_pipeline_passes_every_check() {
        let (db, tip) = build_full_pipeline_store(5);
        let report = verify(&db, &VerifyOptions { layout: Layout::Bare, tip, sample: 100, ..VerifyOptions::default() }).unwrap();
        assert!(report.all_passed(), "{:?}", report.checks);
    }

    #[test]
    fn corrupted_parent_hash_fails_i4_or_i1() {
        let (db, tip) = build_full_pipeline_store(3);
        // Corrupt the canonical hash at height 1, desynchronizing I1/I4
        // from the consensus records written against the original chain.
        let mut batch = WriteBatch::new();
        batch.put(canonical_key(1, Layout::Bare), vec![0xff; 32]);
        db.write(batch).unwrap();

        let report = verify(&db, &VerifyOptions { layout: Layout::Bare, tip, sample: 100, ..VerifyOptions::default() }).unwrap();
        assert!(!report.all_passed());
    }

    #[test]
    fn corrupted_tip_header_parent_hash_fails_i1() {
        let (db, tip) = build_full_pipeline_store(3);
        let tip_hash = Hash::try_from(db.get(&canonical_key(tip, Layout::Bare)).unwrap().unwrap().as_slice()).unwrap();
        // Corrupt the tip header's own RLP payload so its parent-hash field
        // no longer points at height tip-1's canonical hash, without
        // touching any Canonical/HashToNum/consensus entry.
        let mut batch = WriteBatch::new();
        batch.put(header_key(tip, tip_hash, Layout::Bare), rlp_header(Hash::from_slice(&[0xee; 32])));
        db.write(batch).unwrap();

        let report = verify(&db, &VerifyOptions { layout: Layout::Bare, tip, sample: 100, ..VerifyOptions::default() }).unwrap();
        assert!(!report.all_passed());
        let i1 = report.checks.iter().find(|c| c.name == "I1").unwrap();
        assert!(!i1.passed);
    }

    #[test]
    fn full_pipeline_passes_every_check_against_rocksdb() {
        let dir = tempfile::tempdir().unwrap();
        let db = RocksDbDatabase::open(dir.path()).unwrap();
        let tip = seed_full_pipeline(&db, 5);
        let report = verify(&db, &VerifyOptions { layout: Layout::Bare, tip, sample: 100, ..VerifyOptions::default() }).unwrap();
        assert!(report.all_passed(), "{:?}", report.checks);
    }
}
