//! Schema Probe: infers layout, namespace, tip height, and
//! live key families from a source store without mutating it.

use std::collections::BTreeMap;

use chain_primitives::{classify_layout, Height, KeyFamily, Layout, Namespace};
use chain_store::Database;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, serde::Serialize)]
pub enum Defect {
    TruncatedCanonical { count: u64 },
    WrongLengthCanonical { count: u64 },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeReport {
    pub layout: Layout,
    pub namespace: Option<Namespace>,
    pub tip: Option<Height>,
    pub sampled: usize,
    pub families: BTreeMap<String, u64>,
    pub defects: Vec<Defect>,
}

impl ProbeReport {
    pub fn has_truncated_canonical(&self) -> bool {
        self.defects
            .iter()
            .any(|d| matches!(d, Defect::TruncatedCanonical { count } if *count > 0))
    }
}

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub sample: usize,
    pub max_sane_height: Height,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            sample: 100_000,
            max_sane_height: 10_000_000,
        }
    }
}

pub fn family_name(family: &KeyFamily) -> String {
    match family {
        KeyFamily::Header => "Header".to_string(),
        KeyFamily::Body => "Body".to_string(),
        KeyFamily::Receipts => "Receipts".to_string(),
        KeyFamily::Canonical => "Canonical".to_string(),
        KeyFamily::HashToNum => "HashToNum".to_string(),
        KeyFamily::TotalDifficulty => "TotalDifficulty".to_string(),
        KeyFamily::TxLookup => "TxLookup".to_string(),
        KeyFamily::Code => "Code".to_string(),
        KeyFamily::Preimage => "Preimage".to_string(),
        KeyFamily::TrieNode => "TrieNode".to_string(),
        KeyFamily::Meta(name) => format!("Meta({name})"),
        KeyFamily::Unknown => "Unknown".to_string(),
    }
}

/// Opens-and-scans `store` twice: a bounded sample pass (deterministic, the
/// store's natural iteration order) to vote on namespace/layout and tally
/// families, and an unbounded pass over the `Canonical` family to find the
/// tip height and count defects precisely. `Probe` never writes.
pub fn probe(store: &dyn Database, options: &ProbeOptions) -> ProbeReport {
    let mut sample_keys = Vec::new();
    {
        let mut it = store.iter();
        it.seek_to_first();
        while it.valid() && sample_keys.len() < options.sample {
            sample_keys.push(it.key().unwrap().to_vec());
            it.next();
        }
    }

    let mut namespace_votes: BTreeMap<Namespace, u64> = BTreeMap::new();
    for key in &sample_keys {
        if key.len() >= 41 {
            let mut ns = [0u8; 32];
            ns.copy_from_slice(&key[0..32]);
            *namespace_votes.entry(ns).or_insert(0) += 1;
        }
    }
    let namespace = namespace_votes
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(ns, _)| ns);

    let mut layout_votes: BTreeMap<Layout, u64> = BTreeMap::new();
    // Seed every known unit-variant family with a zero count so the report
    // shows the full schema even when a family has no live keys; `Meta`/
    // `Unknown` are keyed by their actual content instead, so they're left
    // for the sample loop below to populate.
    let mut families: BTreeMap<String, u64> = KeyFamily::iter()
        .filter(|f| !matches!(f, KeyFamily::Meta(_) | KeyFamily::Unknown))
        .map(|f| (family_name(&f), 0u64))
        .collect();
    for key in &sample_keys {
        let (layout, logical) = classify_layout(key, namespace.as_ref());
        *layout_votes.entry(layout).or_insert(0) += 1;
        *families.entry(family_name(&logical.family)).or_insert(0) += 1;
    }
    let layout = layout_votes
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(layout, _)| layout)
        .unwrap_or(Layout::Bare);

    let mut tip: Option<Height> = None;
    let mut truncated_canonical = 0u64;
    let mut wrong_length_canonical = 0u64;
    {
        let mut it = store.iter();
        it.seek_to_first();
        while it.valid() {
            let key = it.key().unwrap();
            let (_, logical) = classify_layout(key, namespace.as_ref());
            if logical.family == KeyFamily::Canonical {
                match logical.number {
                    Some(h) if h < options.max_sane_height => {
                        tip = Some(tip.map_or(h, |t| t.max(h)));
                    }
                    Some(_) => {
                        // sanity-capped height, treated like a malformed entry
                        wrong_length_canonical += 1;
                    }
                    None if logical.defective_bare_canonical => {
                        wrong_length_canonical += 1;
                    }
                    None => {
                        truncated_canonical += 1;
                    }
                }
            }
            it.next();
        }
    }

    let mut defects = Vec::new();
    if truncated_canonical > 0 {
        defects.push(Defect::TruncatedCanonical {
            count: truncated_canonical,
        });
    }
    if wrong_length_canonical > 0 {
        defects.push(Defect::WrongLengthCanonical {
            count: wrong_length_canonical,
        });
    }

    ProbeReport {
        layout,
        namespace,
        tip,
        sampled: sample_keys.len(),
        families,
        defects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_primitives::canonical_key;
    use chain_store::{MemDatabase, WriteBatch};

    #[test]
    fn detects_bare_layout_and_tip() {
        let db = MemDatabase::new();
        let mut batch = WriteBatch::new();
        for h in [0u64, 1, 2, 100] {
            batch.put(canonical_key(h, Layout::Bare), vec![h as u8; 32]);
        }
        db.write(batch).unwrap();

        let report = probe(&db, &ProbeOptions::default());
        assert_eq!(report.layout, Layout::Bare);
        assert_eq!(report.tip, Some(100));
        assert!(!report.has_truncated_canonical());
    }

    #[test]
    fn counts_truncated_canonical_defect() {
        let db = MemDatabase::new();
        let mut batch = WriteBatch::new();
        batch.put(canonical_key(5, Layout::Bare), vec![1; 32]);
        batch.put(vec![0x6e, 1, 2, 3], vec![2; 32]); // truncated: 3-byte body
        db.write(batch).unwrap();

        let report = probe(&db, &ProbeOptions::default());
        assert!(report.has_truncated_canonical());
    }

    #[test]
    fn two_probes_of_same_source_agree() {
        let db = MemDatabase::new();
        let mut batch = WriteBatch::new();
        for h in [0u64, 5, 9] {
            batch.put(canonical_key(h, Layout::Bare), vec![h as u8; 32]);
        }
        db.write(batch).unwrap();

        let a = probe(&db, &ProbeOptions::default());
        let b = probe(&db, &ProbeOptions::default());
        assert_eq!(a.tip, b.tip);
        assert_eq!(a.layout, b.layout);
        assert_eq!(a.families, b.families);
    }
}
