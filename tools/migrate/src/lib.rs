pub mod canonical;
pub mod cli;
pub mod consensus;
pub mod error;
pub mod head;
pub mod migrator;
pub mod probe;
pub mod verify;

pub use error::MigrateError;
