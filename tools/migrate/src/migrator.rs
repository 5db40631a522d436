//! Migrator: streams source into target applying the Key
//! Codec, resolving truncated/defective `Canonical` entries via a
//! hash→height index built in a first pass.

use std::collections::{BTreeMap, HashMap};

use chain_primitives::{classify_layout, encode, Height, KeyFamily, Layout, Namespace};
use chain_store::{Database, WriteBatch};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::MigrateError;
use crate::probe::{family_name, ProbeReport};

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub output_layout: Layout,
    pub batch_size: usize,
    /// `None` means every family passes; otherwise only families whose
    /// name (per [`family_name`]) appears here are migrated.
    pub family_filter: Option<Vec<String>>,
    pub strict: bool,
    /// Forces pass 1 (hash→height index) even when the probe reports no
    /// `TruncatedCanonical` defect, for "blockchain-only" migration runs.
    pub blockchain_only: bool,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        MigrateOptions {
            output_layout: Layout::Bare,
            batch_size: 10_000,
            family_filter: None,
            strict: false,
            blockchain_only: false,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MigrateReport {
    pub families: BTreeMap<String, u64>,
    pub defect_recoveries: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Builds the in-memory `hash -> height` index from `HashToNum` entries,
/// used to resolve truncated `Canonical` bodies.
fn build_hash_index(source: &dyn Database, namespace: Option<&chain_primitives::Namespace>) -> HashMap<[u8; 32], Height> {
    let mut index = HashMap::new();
    let mut it = source.iter();
    it.seek_to_first();
    while it.valid() {
        let key = it.key().unwrap();
        let (_, logical) = classify_layout(key, namespace);
        if logical.family == KeyFamily::HashToNum {
            if let (Some(hash), Some(value)) = (logical.hash, it.value()) {
                if value.len() == 8 {
                    let height = u64::from_be_bytes(value.try_into().unwrap());
                    index.insert(*hash.as_bytes(), height);
                }
            }
        }
        it.next();
    }
    index
}

enum ItemOutcome {
    Written { name: String, key: Vec<u8>, value: Vec<u8> },
    Skipped,
    UnresolvedDefect { truncated: Vec<u8> },
    EncodeFailure { detail: String },
}

/// Classifies, resolves Canonical defects against `hash_to_height`, and
/// re-encodes a single source entry. Pure and side-effect free so chunks of
/// these can be mapped over in parallel across a worker pool.
fn process_one(
    key: &[u8],
    value: &[u8],
    namespace: Option<&Namespace>,
    hash_to_height: &HashMap<[u8; 32], Height>,
    family_filter: &Option<Vec<String>>,
    output_layout: Layout,
) -> ItemOutcome {
    let (_, mut logical) = classify_layout(key, namespace);
    let name = family_name(&logical.family);

    if let Some(filter) = family_filter {
        if !filter.iter().any(|f| f == &name) {
            return ItemOutcome::Skipped;
        }
    }

    if logical.family == KeyFamily::Canonical && !logical.defective_bare_canonical && logical.number.is_none() {
        let truncated = logical.tail.clone().unwrap_or_default();
        let resolved = hash_to_height
            .iter()
            .find(|(hash_bytes, _)| hash_bytes.starts_with(truncated.as_slice()))
            .map(|(_, height)| *height);
        match resolved {
            Some(height) => logical.number = Some(height),
            None => return ItemOutcome::UnresolvedDefect { truncated },
        }
    }

    match encode(&logical, output_layout, namespace, logical.revision) {
        Ok(new_key) => ItemOutcome::Written {
            name,
            key: new_key,
            value: value.to_vec(),
        },
        Err(e) => ItemOutcome::EncodeFailure { detail: e.to_string() },
    }
}

pub fn migrate(
    source: &dyn Database,
    target: &dyn Database,
    probe_report: &ProbeReport,
    options: &MigrateOptions,
) -> Result<MigrateReport, MigrateError> {
    let namespace = probe_report.namespace;

    let hash_to_height = if probe_report.has_truncated_canonical() || options.blockchain_only {
        info!("migrator: building hash->height index (pass 1)");
        build_hash_index(source, namespace.as_ref())
    } else {
        HashMap::new()
    };

    let mut report = MigrateReport::default();
    let mut it = source.iter();
    it.seek_to_first();

    loop {
        let mut chunk = Vec::with_capacity(options.batch_size);
        while it.valid() && chunk.len() < options.batch_size {
            chunk.push((it.key().unwrap().to_vec(), it.value().unwrap().to_vec()));
            it.next();
        }
        if chunk.is_empty() {
            break;
        }

        let outcomes: Vec<ItemOutcome> = chunk
            .par_iter()
            .map(|(key, value)| {
                process_one(key, value, namespace.as_ref(), &hash_to_height, &options.family_filter, options.output_layout)
            })
            .collect();

        let mut batch = WriteBatch::new();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                ItemOutcome::Written { name, key, value } => {
                    // `chunk[i]`'s logical defect, if any, was already recovered by
                    // `process_one`; a defective entry that reaches here was fixed.
                    let (_, logical) = classify_layout(&chunk[i].0, namespace.as_ref());
                    if logical.family == KeyFamily::Canonical
                        && (logical.defective_bare_canonical || logical.number.is_none())
                    {
                        report.defect_recoveries += 1;
                    }
                    batch.put(key, value);
                    *report.families.entry(name).or_insert(0) += 1;
                }
                ItemOutcome::Skipped => report.skipped += 1,
                ItemOutcome::UnresolvedDefect { truncated } => {
                    report.errors += 1;
                    if options.strict {
                        return Err(MigrateError::Defect {
                            kind: "TruncatedCanonical",
                            detail: format!("no hash in the index matches truncated body {truncated:02x?}"),
                        });
                    }
                    debug!(?truncated, "dropping unresolvable truncated canonical key");
                }
                ItemOutcome::EncodeFailure { detail } => {
                    report.errors += 1;
                    if options.strict {
                        return Err(MigrateError::Defect { kind: "EncodeFailure", detail });
                    }
                }
            }
        }
        if !batch.is_empty() {
            target.write(batch)?;
        }
    }

    Ok(report)
}
