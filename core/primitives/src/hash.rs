use std::fmt;

use sha2::{Digest, Sha256};

/// Width in bytes of every content-addressed identifier this crate deals with:
/// EVM block hashes, Snowman ids, and namespace-scoped hashes are all 32 bytes.
pub const HASH_LEN: usize = 32;

/// A 32-byte content-addressed identifier.
///
/// Deliberately opaque: the codec and consensus layers never need to know
/// whether a given `Hash` names an EVM block, a Snowman id, or a trie node,
/// only that it round-trips through 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    /// Builds a `Hash` from a 32-byte slice.
    ///
    /// Panics if `bytes.len() != HASH_LEN`; callers are expected to have
    /// already validated the length (classify/decode paths check this before
    /// calling in).
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; HASH_LEN];
        buf.copy_from_slice(bytes);
        Hash(buf)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Hash(bytes.try_into()?))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl serde::Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// sha256 of the concatenation of `parts`, used for `snowmanId = SHA-256(be64(h) ‖ ethHash)`
/// and anywhere else the pipeline needs a deterministic digest over several
/// byte slices without an intermediate allocation.
pub fn sha256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash::from_slice(hasher.finalize().as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_all_zero_bytes() {
        assert_eq!(Hash::ZERO.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn sha256_is_deterministic() {
        let a = sha256(&[&1u64.to_be_bytes(), &[1, 2, 3]]);
        let b = sha256(&[&1u64.to_be_bytes(), &[1, 2, 3]]);
        assert_eq!(a, b);
    }

    #[test]
    fn display_is_0x_prefixed_hex() {
        let h = Hash::from_slice(&[0xab; 32]);
        assert_eq!(h.to_string(), format!("0x{}", "ab".repeat(32)));
    }
}
