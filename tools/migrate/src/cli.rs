//! Command-line surface: one subcommand per pipeline stage, each
//! runnable independently against a store so a failed run can be resumed
//! from whichever stage it stopped at.

use std::path::PathBuf;

use chain_primitives::Layout;
use chain_store::RocksDbDatabase;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::MigrateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    Bare,
    Evm,
    Namespaced,
}

impl std::fmt::Display for LayoutArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_possible_value()
            .expect("LayoutArg has no skipped variants")
            .get_name()
            .fmt(f)
    }
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Layout {
        match arg {
            LayoutArg::Bare => Layout::Bare,
            LayoutArg::Evm => Layout::EvmPrefixed,
            LayoutArg::Namespaced => Layout::Namespaced,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "chain-migrate", about = "Offline Subnet-EVM -> C-Chain store migration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit DEBUG-level spans in addition to INFO.
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sample a source store and report its layout, namespace, tip, and defects.
    Probe(ProbeCmd),
    /// Stream a source store into a fresh target store under the Key Codec.
    Migrate(MigrateCmd),
    /// Reconstruct Canonical/HashToNum by walking parent pointers from the tip.
    #[command(name = "rebuild-canonical")]
    RebuildCanonical(RebuildCanonicalCmd),
    /// Derive the deterministic Snowman accepted-block log.
    #[command(name = "replay-consensus")]
    ReplayConsensus(ReplayConsensusCmd),
    /// Install the well-known head pointers at a given height.
    #[command(name = "set-head")]
    SetHead(SetHeadCmd),
    /// Re-check the invariants a successful pipeline run must establish.
    Verify(VerifyCmd),
}

fn open_rocksdb(path: &PathBuf) -> Result<RocksDbDatabase, MigrateError> {
    RocksDbDatabase::open(path).map_err(MigrateError::from)
}

/// Opens a store that must already exist, for read-only commands (`probe`,
/// `verify`) that should fail loudly on a mistyped path rather than
/// silently creating an empty store there.
fn open_rocksdb_existing(path: &PathBuf) -> Result<RocksDbDatabase, MigrateError> {
    RocksDbDatabase::open_existing(path).map_err(MigrateError::from)
}

#[derive(Debug, Args)]
pub struct ProbeCmd {
    /// Path to the source RocksDB directory.
    pub src: PathBuf,
    /// Number of keys to sample when voting on layout/namespace.
    #[arg(long, default_value_t = 100_000)]
    pub sample: usize,
    /// Emit the report as JSON instead of a human-readable summary.
    #[arg(long)]
    pub json: bool,
}

impl ProbeCmd {
    pub fn run(&self) -> Result<(), MigrateError> {
        let store = open_rocksdb_existing(&self.src)?;
        let options = crate::probe::ProbeOptions {
            sample: self.sample,
            ..crate::probe::ProbeOptions::default()
        };
        let report = crate::probe::probe(&store, &options);
        print_report(&report, self.json);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct MigrateCmd {
    /// Path to the source RocksDB directory.
    #[arg(long)]
    pub src: PathBuf,
    /// Path to the target RocksDB directory; created if missing.
    #[arg(long)]
    pub dst: PathBuf,
    /// Key layout to emit into `dst`.
    #[arg(long, value_enum, default_value_t = LayoutArg::Bare)]
    pub layout: LayoutArg,
    /// Restrict migration to these families (by probe's family names); omit to migrate all.
    #[arg(long, value_delimiter = ',')]
    pub families: Option<Vec<String>>,
    /// Commit writes in batches of this many key/value pairs.
    #[arg(long, default_value_t = 10_000)]
    pub batch: usize,
    /// Abort on the first unresolvable defect instead of dropping the key.
    #[arg(long)]
    pub strict: bool,
    /// Build the hash->height index even when the probe found no truncated Canonical defect.
    #[arg(long)]
    pub blockchain_only: bool,
}

impl MigrateCmd {
    pub fn run(&self) -> Result<(), MigrateError> {
        let source = open_rocksdb(&self.src)?;
        let target = open_rocksdb(&self.dst)?;
        let probe_report = crate::probe::probe(&source, &crate::probe::ProbeOptions::default());
        let options = crate::migrator::MigrateOptions {
            output_layout: self.layout.into(),
            batch_size: self.batch,
            family_filter: self.families.clone(),
            strict: self.strict,
            blockchain_only: self.blockchain_only,
        };
        let report = crate::migrator::migrate(&source, &target, &probe_report, &options)?;
        println!("{}", serde_json::to_string_pretty(&report).expect("MigrateReport serializes"));
        if report.errors > 0 && self.strict {
            return Err(MigrateError::Defect {
                kind: "UnresolvedDefects",
                detail: format!("{} keys could not be migrated", report.errors),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct RebuildCanonicalCmd {
    /// Path to the RocksDB directory to rebuild in place.
    #[arg(long)]
    pub db: PathBuf,
    /// Key layout already in use in `db`.
    #[arg(long, value_enum, default_value_t = LayoutArg::Bare)]
    pub layout: LayoutArg,
    /// Skip tip auto-detection and start from this height (requires `--tip-hash`).
    #[arg(long)]
    pub from_tip: Option<u64>,
    /// 32-byte hex hash paired with `--from-tip`.
    #[arg(long)]
    pub tip_hash: Option<String>,
    /// Ignore any Header entry above this height when locating the tip.
    #[arg(long)]
    pub max_height: Option<u64>,
    #[arg(long, default_value_t = 10_000)]
    pub batch: usize,
}

impl RebuildCanonicalCmd {
    pub fn run(&self) -> Result<(), MigrateError> {
        let store = open_rocksdb(&self.db)?;
        let from_tip = match (self.from_tip, &self.tip_hash) {
            (Some(height), Some(hex_hash)) => {
                let bytes = hex::decode(hex_hash).map_err(|e| MigrateError::Usage(e.to_string()))?;
                let hash = chain_primitives::Hash::try_from(bytes.as_slice())
                    .map_err(|_| MigrateError::Usage("--tip-hash must be 32 bytes".to_string()))?;
                Some((height, hash))
            }
            (None, None) => None,
            _ => return Err(MigrateError::Usage("--from-tip and --tip-hash must be given together".to_string())),
        };
        let options = crate::canonical::RebuildOptions {
            layout: self.layout.into(),
            batch_size: self.batch,
            max_height: self.max_height,
            from_tip,
        };
        let report = crate::canonical::rebuild_canonical(&store, &options)?;
        println!("{}", serde_json::to_string_pretty(&report).expect("CanonicalReport serializes"));
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ReplayConsensusCmd {
    /// Path to the RocksDB directory holding the rebuilt canonical chain.
    #[arg(long = "evm")]
    pub db: PathBuf,
    /// ASCII prefix every emitted consensus key is written under.
    #[arg(long, default_value = "state")]
    pub prefix: String,
    /// Tip height to replay consensus up to (inclusive).
    #[arg(long)]
    pub tip: u64,
    /// Revision suffix appended to every emitted key.
    #[arg(long, default_value_t = 1)]
    pub revision: u64,
    #[arg(long, default_value_t = 10_000)]
    pub batch: usize,
    /// Lift real header timestamps instead of the synthetic `12 * h` default.
    #[arg(long)]
    pub use_header_timestamps: bool,
    #[arg(long, value_enum, default_value_t = LayoutArg::Bare)]
    pub layout: LayoutArg,
}

impl ReplayConsensusCmd {
    pub fn run(&self) -> Result<(), MigrateError> {
        let store = open_rocksdb(&self.db)?;
        let options = crate::consensus::ConsensusOptions {
            layout: self.layout.into(),
            tip: self.tip,
            revision: self.revision,
            prefix: self.prefix.clone().into_bytes(),
            batch_size: self.batch,
            use_header_timestamps: self.use_header_timestamps,
        };
        let report = crate::consensus::replay_consensus(&store, &options)?;
        println!("{}", serde_json::to_string_pretty(&report).expect("ConsensusReport serializes"));
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct SetHeadCmd {
    /// Path to the RocksDB directory to install head pointers into.
    #[arg(long)]
    pub db: PathBuf,
    /// Height whose canonical hash becomes the new head.
    #[arg(long)]
    pub height: u64,
    #[arg(long, value_enum, default_value_t = LayoutArg::Bare)]
    pub layout: LayoutArg,
}

impl SetHeadCmd {
    pub fn run(&self) -> Result<(), MigrateError> {
        let store = open_rocksdb(&self.db)?;
        let options = crate::head::HeadOptions {
            layout: self.layout.into(),
            height: self.height,
        };
        let report = crate::head::set_head(&store, &options)?;
        println!("{}", serde_json::to_string_pretty(&report).expect("HeadReport serializes"));
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct VerifyCmd {
    /// Path to the RocksDB directory to verify.
    #[arg(long)]
    pub db: PathBuf,
    /// Tip height the pipeline was run against.
    #[arg(long)]
    pub tip: u64,
    /// Number of heights from the sample grid to check against the consensus log (I4).
    #[arg(long, default_value_t = 100)]
    pub sample: usize,
    #[arg(long, default_value = "state")]
    pub prefix: String,
    #[arg(long, default_value_t = 1)]
    pub revision: u64,
    #[arg(long, value_enum, default_value_t = LayoutArg::Bare)]
    pub layout: LayoutArg,
    /// Emit the report as JSON instead of a human-readable summary.
    #[arg(long)]
    pub json: bool,
}

impl VerifyCmd {
    pub fn run(&self) -> Result<(), MigrateError> {
        let store = open_rocksdb_existing(&self.db)?;
        let options = crate::verify::VerifyOptions {
            layout: self.layout.into(),
            tip: self.tip,
            sample: self.sample,
            prefix: self.prefix.clone().into_bytes(),
            revision: self.revision,
        };
        let report = crate::verify::verify(&store, &options)?;
        print_report(&report, self.json);
        if !report.all_passed() {
            return Err(MigrateError::InvariantViolation {
                id: "verify",
                detail: "one or more checks failed; see report".to_string(),
            });
        }
        Ok(())
    }
}

fn print_report<T: std::fmt::Debug + serde::Serialize>(report: &T, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(report).expect("report serializes"));
    } else {
        println!("{report:#?}");
    }
}
