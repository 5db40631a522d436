use chain_primitives::{Height, Layout};

/// Stage-level error taxonomy. `StoreError` folds in via `#[from]`; the
/// remaining variants name failures specific to a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error(transparent)]
    Store(#[from] chain_store::StoreError),

    #[error("probed layout {probed:?} disagrees with the assumed layout {assumed:?}")]
    LayoutMismatch { probed: Layout, assumed: Layout },

    #[error("canonical rebuild broke at height {height}: {reason}")]
    BrokenChain { height: Height, reason: String },

    #[error("invariant {id} violated: {detail}")]
    InvariantViolation { id: &'static str, detail: String },

    #[error("schema defect {kind} encountered under --strict: {detail}")]
    Defect { kind: &'static str, detail: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Maps this error onto the process exit-code taxonomy.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Usage(_) => 64,
            MigrateError::Store(_) => 2,
            MigrateError::LayoutMismatch { .. } => 1,
            MigrateError::BrokenChain { .. } => 1,
            MigrateError::InvariantViolation { .. } => 1,
            MigrateError::Defect { .. } => 3,
            MigrateError::Cancelled => 1,
        }
    }
}
