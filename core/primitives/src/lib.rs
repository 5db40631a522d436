//! Key schema, codec, and consensus-record primitives shared by
//! `chain-store` and `chain-migrate`.

pub mod accepted_block;
pub mod codec;
pub mod error;
pub mod hash;
pub mod rlp_header;

pub use accepted_block::AcceptedBlock;
pub use codec::{classify_layout, canonical_key, encode, hash_to_num_key, KeyFamily, Layout, LogicalKey, Namespace};
pub use error::{AcceptedBlockError, CodecError, HeaderError};
pub use hash::{sha256, Hash, HASH_LEN};
pub use rlp_header::parent_hash_of;

/// Block height. Subnet-EVM and the C-Chain both use a plain `u64` counter.
pub type Height = u64;
