//! Deterministic Snowman-style consensus record.

use crate::error::AcceptedBlockError;
use crate::hash::{sha256, Hash};
use crate::Height;

/// `AcceptedBlock { snowmanId, parentId, height, timestamp, ethHash }`,
/// encoded as the fixed-width concatenation
/// `parentId ‖ height(be64) ‖ timestamp(be64) ‖ ethHash ‖ snowmanId`.
///
/// Note: the encoded width is 112 bytes (32 + 8 + 8 + 32 + 32), not the
/// 120 the prose description states elsewhere — that count doesn't match
/// its own field list and is treated as a documentation slip (see
/// DESIGN.md); this implementation follows the unambiguous field
/// concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedBlock {
    pub snowman_id: Hash,
    pub parent_id: Hash,
    pub height: Height,
    pub timestamp: u64,
    pub eth_hash: Hash,
}

impl AcceptedBlock {
    pub const ENCODED_LEN: usize = 32 + 8 + 8 + 32 + 32;

    /// `snowmanId(h) = SHA-256(be64(h) ‖ ethHash)`.
    pub fn snowman_id(height: Height, eth_hash: Hash) -> Hash {
        sha256(&[&height.to_be_bytes(), eth_hash.as_bytes()])
    }

    /// Builds the record for `height`, deriving `snowman_id` from `height`
    /// and `eth_hash`, and `parent_id` as `Hash::ZERO` at height 0 or the
    /// previous height's `snowman_id` otherwise.
    pub fn new(height: Height, eth_hash: Hash, timestamp: u64, parent_id: Hash) -> Self {
        AcceptedBlock {
            snowman_id: Self::snowman_id(height, eth_hash),
            parent_id,
            height,
            timestamp,
            eth_hash,
        }
    }

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        let mut offset = 0;
        buf[offset..offset + 32].copy_from_slice(self.parent_id.as_bytes());
        offset += 32;
        buf[offset..offset + 8].copy_from_slice(&self.height.to_be_bytes());
        offset += 8;
        buf[offset..offset + 8].copy_from_slice(&self.timestamp.to_be_bytes());
        offset += 8;
        buf[offset..offset + 32].copy_from_slice(self.eth_hash.as_bytes());
        offset += 32;
        buf[offset..offset + 32].copy_from_slice(self.snowman_id.as_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AcceptedBlockError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(AcceptedBlockError::WrongLength {
                actual: bytes.len(),
                expected: Self::ENCODED_LEN,
            });
        }
        let parent_id = Hash::from_slice(&bytes[0..32]);
        let height = u64::from_be_bytes(bytes[32..40].try_into().unwrap());
        let timestamp = u64::from_be_bytes(bytes[40..48].try_into().unwrap());
        let eth_hash = Hash::from_slice(&bytes[48..80]);
        let snowman_id = Hash::from_slice(&bytes[80..112]);
        Ok(AcceptedBlock {
            snowman_id,
            parent_id,
            height,
            timestamp,
            eth_hash,
        })
    }
}
