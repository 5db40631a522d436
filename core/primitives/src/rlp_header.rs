//! Parent-hash extraction from an RLP-encoded block header.
//!
//! A block header is an RLP list whose first field is the parent hash.
//! Earlier tooling assumed the list length prefix was always exactly three
//! bytes (`0xf9 len_hi len_lo`) and sliced the parent hash out at a fixed
//! offset; that breaks the moment a header is small enough to use a
//! one-byte length prefix. This decodes the list generically instead of
//! assuming a prefix width, so it keeps working regardless of how many
//! bytes the length prefix occupies.

use crate::error::HeaderError;
use crate::hash::Hash;

/// Extracts the parent hash (the header's first RLP field) from a raw,
/// RLP-encoded header.
pub fn parent_hash_of(header_rlp: &[u8]) -> Result<Hash, HeaderError> {
    if header_rlp.is_empty() || header_rlp[0] < 0xc0 {
        return Err(HeaderError::NotAList);
    }
    let rlp = rlp::Rlp::new(header_rlp);
    if !rlp.is_list() {
        return Err(HeaderError::NotAList);
    }
    let parent_field = rlp.at(0)?;
    let parent_bytes = parent_field.data()?;
    if parent_bytes.len() != 32 {
        return Err(HeaderError::BadParentHashLength(parent_bytes.len()));
    }
    Ok(Hash::from_slice(parent_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_header(parent: &[u8; 32], extra_fields: &[&[u8]]) -> Vec<u8> {
        let mut stream = rlp::RlpStream::new_list(1 + extra_fields.len());
        stream.append(&parent.as_slice());
        for field in extra_fields {
            stream.append(field);
        }
        stream.out().to_vec()
    }

    #[test]
    fn extracts_parent_hash_from_short_header() {
        let parent = [0x11u8; 32];
        let raw = encode_header(&parent, &[&[1, 2, 3]]);
        let extracted = parent_hash_of(&raw).unwrap();
        assert_eq!(extracted.as_bytes(), &parent);
    }

    #[test]
    fn extracts_parent_hash_from_header_needing_two_byte_length_prefix() {
        let parent = [0x22u8; 32];
        // Pad with enough extra fields that the list body exceeds 55 bytes,
        // forcing RLP to use a long-form (0xf8+) length prefix instead of
        // the short form — exactly the case a fixed-offset-3 shortcut gets
        // wrong.
        let padding = vec![0xabu8; 64];
        let raw = encode_header(&parent, &[&padding]);
        assert!(raw[0] >= 0xf8, "expected a long-form list prefix");
        let extracted = parent_hash_of(&raw).unwrap();
        assert_eq!(extracted.as_bytes(), &parent);
    }

    #[test]
    fn rejects_non_list_payload() {
        let raw = vec![0x83, b'f', b'o', b'o']; // RLP string, not a list
        assert!(matches!(parent_hash_of(&raw), Err(HeaderError::NotAList)));
    }

    #[test]
    fn rejects_wrong_length_parent_field() {
        let mut stream = rlp::RlpStream::new_list(1);
        stream.append(&[1u8, 2, 3].as_slice());
        let raw = stream.out().to_vec();
        assert!(matches!(
            parent_hash_of(&raw),
            Err(HeaderError::BadParentHashLength(3))
        ));
    }
}
