//! Key Codec: classification and re-encoding of the three coexisting
//! on-disk key layouts (`Namespaced`, `EvmPrefixed`, `Bare`) into one
//! layout-independent [`LogicalKey`].
//!
//! `classify_layout` is the disambiguation ladder; `encode` is its inverse.
//! Both are pure functions over byte slices — no I/O, no allocation beyond
//! what the result needs.

use crate::error::CodecError;
use crate::hash::Hash;
use crate::Height;

/// A 32-byte store namespace, as used by the `Namespaced` layout's leading
/// bytes.
pub type Namespace = [u8; 32];

const TYPE_HEADER: u8 = 0x68; // 'h'
const TYPE_BODY: u8 = 0x62; // 'b'
const TYPE_RECEIPTS: u8 = 0x72; // 'r'
const TYPE_CANONICAL: u8 = 0x6e; // 'n'
const TYPE_HASH_TO_NUM: u8 = 0x48; // 'H'
const TYPE_TOTAL_DIFFICULTY: u8 = 0x54; // 'T'
const TYPE_TX_LOOKUP: u8 = 0x6c; // 'l'
const TYPE_CODE: u8 = 0x74; // 't'
const TYPE_PREIMAGE: u8 = 0x00;
const TYPE_TRIE_NODE: u8 = 0x53; // 'S'

/// Named ASCII meta keys that bypass the type-byte dispatch entirely,
/// regardless of layout.
const META_NAMES: &[&str] = &[
    "LastBlock",
    "LastHeader",
    "LastFast",
    "LastPivot",
    "Height",
    "lastAccepted",
    "last_accepted",
    "metadata",
    "currentRevision",
];

/// Which of the three coexisting on-disk key layouts a raw key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum Layout {
    /// `namespace(32) ‖ type(1) ‖ body ‖ revision(8)`.
    Namespaced,
    /// `"evm" ‖ type(1) ‖ body`.
    EvmPrefixed,
    /// `type(1) ‖ body`.
    Bare,
}

/// The closed set of logical key families this schema recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, strum::EnumIter)]
pub enum KeyFamily {
    Header,
    Body,
    Receipts,
    Canonical,
    HashToNum,
    TotalDifficulty,
    TxLookup,
    Code,
    Preimage,
    TrieNode,
    /// Named ASCII meta key (`LastBlock`, `Height`, ...).
    Meta(String),
    /// Anything the ladder couldn't place; `tail` on the owning
    /// [`LogicalKey`] holds the original type+body bytes so it still
    /// round-trips through `encode`.
    Unknown,
}

/// A raw key, decomposed into a layout-independent logical form.
///
/// Not every field is populated for every family: `number`/`hash` hold the
/// family's primary payload when it decoded cleanly, `tail` holds raw bytes
/// for families whose payload isn't a plain number or hash (`TrieNode`,
/// `Unknown`) or whose payload didn't match the expected length (truncated
/// `Canonical`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalKey {
    pub family: KeyFamily,
    pub number: Option<Height>,
    pub hash: Option<Hash>,
    pub tail: Option<Vec<u8>>,
    /// Populated only when decoded from a `Namespaced`-layout key.
    pub revision: Option<u64>,
    /// Set when this key is the legacy 10-byte `0x68‖be64(h)‖0x6e` defect
    /// form, found only under the `Bare` layout where `Canonical` shares
    /// its type byte with `Header` and must be disambiguated by length.
    /// `encode` ignores this flag: re-encoding a `Canonical` key always
    /// produces the clean 9-byte form.
    pub defective_bare_canonical: bool,
}

impl LogicalKey {
    fn new(family: KeyFamily) -> Self {
        LogicalKey {
            family,
            number: None,
            hash: None,
            tail: None,
            revision: None,
            defective_bare_canonical: false,
        }
    }
}

fn is_meta_name(bytes: &[u8]) -> Option<&'static str> {
    META_NAMES
        .iter()
        .copied()
        .find(|name| name.as_bytes() == bytes)
}

/// Splits a raw key into `(layout, type_and_body, revision)`, applying the
/// ladder's layout precedence: `Namespaced` (if the namespace matches) takes
/// priority over `"evm"`-prefixed, which takes priority over `Bare`.
fn strip_envelope<'a>(key: &'a [u8], namespace: Option<&Namespace>) -> (Layout, &'a [u8], Option<u64>) {
    if let Some(ns) = namespace {
        if key.len() >= 41 && key[0..32] == ns[..] {
            let body_end = key.len() - 8;
            let revision = u64::from_be_bytes(key[body_end..].try_into().unwrap());
            return (Layout::Namespaced, &key[32..body_end], Some(revision));
        }
    }
    if key.len() >= 3 && &key[0..3] == b"evm" {
        return (Layout::EvmPrefixed, &key[3..], None);
    }
    (Layout::Bare, key, None)
}

/// Decomposes `type_and_body` (the bytes after namespace/"evm" stripping)
/// into a family and its payload, applying the `Bare`-layout ambiguity
/// between `Header` and `Canonical` (both use `0x68`, disambiguated by
/// length) documented on [`LogicalKey::defective_bare_canonical`].
fn classify_type_and_body(layout: Layout, type_and_body: &[u8]) -> LogicalKey {
    if type_and_body.is_empty() {
        let mut lk = LogicalKey::new(KeyFamily::Unknown);
        lk.tail = Some(Vec::new());
        return lk;
    }
    if let Some(name) = is_meta_name(type_and_body) {
        return LogicalKey::new(KeyFamily::Meta(name.to_string()));
    }

    let type_byte = type_and_body[0];
    let body = &type_and_body[1..];

    if layout == Layout::Bare && type_byte == TYPE_HEADER {
        return match body.len() {
            40 => {
                let mut lk = LogicalKey::new(KeyFamily::Header);
                lk.number = Some(u64::from_be_bytes(body[0..8].try_into().unwrap()));
                lk.hash = Some(Hash::from_slice(&body[8..40]));
                lk
            }
            8 => {
                let mut lk = LogicalKey::new(KeyFamily::Canonical);
                lk.number = Some(u64::from_be_bytes(body[0..8].try_into().unwrap()));
                lk
            }
            9 if body[8] == TYPE_CANONICAL => {
                // Legacy `0x68‖be64(h)‖0x6e` defect: 10 raw bytes total.
                let mut lk = LogicalKey::new(KeyFamily::Canonical);
                lk.number = Some(u64::from_be_bytes(body[0..8].try_into().unwrap()));
                lk.defective_bare_canonical = true;
                lk
            }
            _ => {
                let mut lk = LogicalKey::new(KeyFamily::Unknown);
                lk.tail = Some(type_and_body.to_vec());
                lk
            }
        };
    }

    // `EvmPrefixed`/`Namespaced` carry an explicit type byte per family, so
    // there's no ambiguity to resolve; an unrecognized byte under
    // `EvmPrefixed` is passed through as a meta key rather than dropped,
    // since the `"evm"` prefix already proves it belongs to this schema.
    match type_byte {
        TYPE_HEADER => {
            let mut lk = LogicalKey::new(KeyFamily::Header);
            if body.len() == 40 {
                lk.number = Some(u64::from_be_bytes(body[0..8].try_into().unwrap()));
                lk.hash = Some(Hash::from_slice(&body[8..40]));
            } else {
                lk.tail = Some(body.to_vec());
            }
            lk
        }
        TYPE_BODY => hash_keyed(KeyFamily::Body, body),
        TYPE_RECEIPTS => hash_keyed(KeyFamily::Receipts, body),
        TYPE_CANONICAL => {
            let mut lk = LogicalKey::new(KeyFamily::Canonical);
            if body.len() == 8 {
                lk.number = Some(u64::from_be_bytes(body.try_into().unwrap()));
            } else {
                // Truncated (or otherwise malformed) Canonical body: no
                // number can be derived, signalling the caller (typically
                // the Migrator) to resolve it via the hash->height index.
                lk.tail = Some(body.to_vec());
            }
            lk
        }
        TYPE_HASH_TO_NUM => hash_keyed(KeyFamily::HashToNum, body),
        TYPE_TOTAL_DIFFICULTY => hash_keyed(KeyFamily::TotalDifficulty, body),
        TYPE_TX_LOOKUP => hash_keyed(KeyFamily::TxLookup, body),
        TYPE_CODE => hash_keyed(KeyFamily::Code, body),
        TYPE_PREIMAGE => hash_keyed(KeyFamily::Preimage, body),
        TYPE_TRIE_NODE => {
            let mut lk = LogicalKey::new(KeyFamily::TrieNode);
            lk.tail = Some(body.to_vec());
            lk
        }
        _ if layout == Layout::EvmPrefixed => {
            let mut lk = LogicalKey::new(KeyFamily::Meta(
                String::from_utf8_lossy(type_and_body).into_owned(),
            ));
            lk.tail = Some(type_and_body.to_vec());
            lk
        }
        _ => {
            let mut lk = LogicalKey::new(KeyFamily::Unknown);
            lk.tail = Some(type_and_body.to_vec());
            lk
        }
    }
}

fn hash_keyed(family: KeyFamily, body: &[u8]) -> LogicalKey {
    let mut lk = LogicalKey::new(family);
    if body.len() == 32 {
        lk.hash = Some(Hash::from_slice(body));
    } else {
        lk.tail = Some(body.to_vec());
    }
    lk
}

/// Classifies a raw key into its layout and logical form. Never fails: an
/// unrecognized key simply becomes `KeyFamily::Unknown`.
pub fn classify_layout(key: &[u8], namespace: Option<&Namespace>) -> (Layout, LogicalKey) {
    if key.is_empty() {
        let mut lk = LogicalKey::new(KeyFamily::Unknown);
        lk.tail = Some(Vec::new());
        return (Layout::Bare, lk);
    }
    let (layout, type_and_body, revision) = strip_envelope(key, namespace);
    let mut lk = classify_type_and_body(layout, type_and_body);
    lk.revision = revision;
    (layout, lk)
}

fn type_and_body_bytes(lk: &LogicalKey, layout: Layout) -> Result<Vec<u8>, CodecError> {
    let family_name = |f: &KeyFamily| -> &'static str {
        match f {
            KeyFamily::Header => "Header",
            KeyFamily::Body => "Body",
            KeyFamily::Receipts => "Receipts",
            KeyFamily::Canonical => "Canonical",
            KeyFamily::HashToNum => "HashToNum",
            KeyFamily::TotalDifficulty => "TotalDifficulty",
            KeyFamily::TxLookup => "TxLookup",
            KeyFamily::Code => "Code",
            KeyFamily::Preimage => "Preimage",
            KeyFamily::TrieNode => "TrieNode",
            KeyFamily::Meta(_) => "Meta",
            KeyFamily::Unknown => "Unknown",
        }
    };
    let missing = |field: &'static str| CodecError::MissingField {
        family: family_name(&lk.family),
        field,
    };

    match &lk.family {
        KeyFamily::Meta(name) => Ok(name.as_bytes().to_vec()),
        KeyFamily::Header => {
            let number = lk.number.ok_or_else(|| missing("number"))?;
            let hash = lk.hash.ok_or_else(|| missing("hash"))?;
            let mut v = Vec::with_capacity(1 + 8 + 32);
            v.push(TYPE_HEADER);
            v.extend_from_slice(&number.to_be_bytes());
            v.extend_from_slice(hash.as_bytes());
            Ok(v)
        }
        KeyFamily::Body => hash_body(TYPE_BODY, lk, &missing),
        KeyFamily::Receipts => hash_body(TYPE_RECEIPTS, lk, &missing),
        KeyFamily::Canonical => {
            let number = lk.number.ok_or_else(|| missing("number"))?;
            let mut v = Vec::with_capacity(9);
            // `Bare` reuses the `Header` type byte (0x68) for the clean
            // 9-byte form, disambiguated from `Header` by length alone; the
            // other layouts carry an unambiguous type byte of their own.
            v.push(if layout == Layout::Bare {
                TYPE_HEADER
            } else {
                TYPE_CANONICAL
            });
            v.extend_from_slice(&number.to_be_bytes());
            Ok(v)
        }
        KeyFamily::HashToNum => hash_body(TYPE_HASH_TO_NUM, lk, &missing),
        KeyFamily::TotalDifficulty => hash_body(TYPE_TOTAL_DIFFICULTY, lk, &missing),
        KeyFamily::TxLookup => hash_body(TYPE_TX_LOOKUP, lk, &missing),
        KeyFamily::Code => hash_body(TYPE_CODE, lk, &missing),
        KeyFamily::Preimage => hash_body(TYPE_PREIMAGE, lk, &missing),
        KeyFamily::TrieNode => {
            let tail = lk.tail.clone().ok_or_else(|| missing("tail"))?;
            let mut v = Vec::with_capacity(1 + tail.len());
            v.push(TYPE_TRIE_NODE);
            v.extend_from_slice(&tail);
            Ok(v)
        }
        KeyFamily::Unknown => lk.tail.clone().ok_or_else(|| missing("tail")),
    }
}

fn hash_body(
    type_byte: u8,
    lk: &LogicalKey,
    missing: &dyn Fn(&'static str) -> CodecError,
) -> Result<Vec<u8>, CodecError> {
    let hash = lk.hash.ok_or_else(|| missing("hash"))?;
    let mut v = Vec::with_capacity(1 + 32);
    v.push(type_byte);
    v.extend_from_slice(hash.as_bytes());
    Ok(v)
}

/// Re-encodes a logical key into the given output layout. `namespace` and
/// `revision` are only consulted (and required) for `Layout::Namespaced`;
/// the pipeline's real outputs are always `Bare` or `EvmPrefixed`, but
/// `Namespaced` is supported here too so the codec round-trips cleanly
/// for every layout it can classify.
pub fn encode(
    lk: &LogicalKey,
    layout: Layout,
    namespace: Option<&Namespace>,
    revision: Option<u64>,
) -> Result<Vec<u8>, CodecError> {
    let type_and_body = type_and_body_bytes(lk, layout)?;
    match layout {
        Layout::Bare => Ok(type_and_body),
        Layout::EvmPrefixed => {
            let mut v = Vec::with_capacity(3 + type_and_body.len());
            v.extend_from_slice(b"evm");
            v.extend_from_slice(&type_and_body);
            Ok(v)
        }
        Layout::Namespaced => {
            let ns = namespace.ok_or(CodecError::MissingNamespace)?;
            let rev = revision.ok_or(CodecError::MissingRevision)?;
            let mut v = Vec::with_capacity(32 + type_and_body.len() + 8);
            v.extend_from_slice(ns);
            v.extend_from_slice(&type_and_body);
            v.extend_from_slice(&rev.to_be_bytes());
            Ok(v)
        }
    }
}

/// Builds the canonical (number -> hash) key for `height` under `layout`,
/// always in the clean, non-defective form.
pub fn canonical_key(height: Height, layout: Layout) -> Vec<u8> {
    let mut lk = LogicalKey::new(KeyFamily::Canonical);
    lk.number = Some(height);
    encode(&lk, layout, None, None).expect("Canonical encode with `number` set never fails")
}

/// Builds the hash->height index key for `hash` under `layout`.
pub fn hash_to_num_key(hash: Hash, layout: Layout) -> Vec<u8> {
    let mut lk = LogicalKey::new(KeyFamily::HashToNum);
    lk.hash = Some(hash);
    encode(&lk, layout, None, None).expect("HashToNum encode with `hash` set never fails")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_key(layout: Layout, number: Height, hash: Hash) -> LogicalKey {
        let mut lk = LogicalKey::new(KeyFamily::Header);
        lk.number = Some(number);
        lk.hash = Some(hash);
        let _ = layout;
        lk
    }

    #[test]
    fn roundtrips_header_through_bare() {
        let hash = Hash::from_slice(&[7u8; 32]);
        let lk = header_key(Layout::Bare, 42, hash);
        let raw = encode(&lk, Layout::Bare, None, None).unwrap();
        let (layout, decoded) = classify_layout(&raw, None);
        assert_eq!(layout, Layout::Bare);
        assert_eq!(decoded.family, KeyFamily::Header);
        assert_eq!(decoded.number, Some(42));
        assert_eq!(decoded.hash, Some(hash));
    }

    #[test]
    fn roundtrips_canonical_through_evm_prefixed() {
        let lk = {
            let mut lk = LogicalKey::new(KeyFamily::Canonical);
            lk.number = Some(9001);
            lk
        };
        let raw = encode(&lk, Layout::EvmPrefixed, None, None).unwrap();
        assert_eq!(&raw[0..4], b"evmn");
        let (layout, decoded) = classify_layout(&raw, None);
        assert_eq!(layout, Layout::EvmPrefixed);
        assert_eq!(decoded.family, KeyFamily::Canonical);
        assert_eq!(decoded.number, Some(9001));
    }

    #[test]
    fn roundtrips_through_namespaced() {
        let ns: Namespace = [3u8; 32];
        let hash = Hash::from_slice(&[9u8; 32]);
        let mut lk = LogicalKey::new(KeyFamily::Body);
        lk.hash = Some(hash);
        let raw = encode(&lk, Layout::Namespaced, Some(&ns), Some(7)).unwrap();
        let (layout, decoded) = classify_layout(&raw, Some(&ns));
        assert_eq!(layout, Layout::Namespaced);
        assert_eq!(decoded.family, KeyFamily::Body);
        assert_eq!(decoded.hash, Some(hash));
        assert_eq!(decoded.revision, Some(7));
    }

    #[test]
    fn bare_canonical_shares_header_byte_disambiguated_by_length() {
        let clean = canonical_key(1_082_780, Layout::Bare);
        assert_eq!(clean.len(), 9);
        assert_eq!(clean[0], TYPE_HEADER);
        let (layout, decoded) = classify_layout(&clean, None);
        assert_eq!(layout, Layout::Bare);
        assert_eq!(decoded.family, KeyFamily::Canonical);
        assert_eq!(decoded.number, Some(1_082_780));
        assert!(!decoded.defective_bare_canonical);
    }

    #[test]
    fn detects_defective_10_byte_bare_canonical() {
        // height 1_082_780 in the legacy defective 10-byte form.
        let raw: Vec<u8> = vec![0x68, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x85, 0x9c, 0x6e];
        let (layout, decoded) = classify_layout(&raw, None);
        assert_eq!(layout, Layout::Bare);
        assert_eq!(decoded.family, KeyFamily::Canonical);
        assert_eq!(decoded.number, Some(1_082_780));
        assert!(decoded.defective_bare_canonical);

        let rewritten = canonical_key(decoded.number.unwrap(), Layout::Bare);
        assert_eq!(rewritten.len(), 9);
        assert_eq!(&rewritten, &raw[0..9]);
    }

    #[test]
    fn truncated_canonical_has_no_number() {
        let mut raw = vec![TYPE_CANONICAL];
        raw.extend_from_slice(&[1, 2, 3]);
        let (_, decoded) = classify_layout(&raw, None);
        assert_eq!(decoded.family, KeyFamily::Canonical);
        assert_eq!(decoded.number, None);
        assert_eq!(decoded.tail, Some(vec![1, 2, 3]));
    }

    #[test]
    fn recognizes_named_meta_keys_across_layouts() {
        let (layout, decoded) = classify_layout(b"LastBlock", None);
        assert_eq!(layout, Layout::Bare);
        assert_eq!(decoded.family, KeyFamily::Meta("LastBlock".to_string()));

        let mut evm_key = b"evm".to_vec();
        evm_key.extend_from_slice(b"Height");
        let (layout, decoded) = classify_layout(&evm_key, None);
        assert_eq!(layout, Layout::EvmPrefixed);
        assert_eq!(decoded.family, KeyFamily::Meta("Height".to_string()));
    }

    #[test]
    fn empty_key_is_unknown() {
        let (layout, decoded) = classify_layout(&[], None);
        assert_eq!(layout, Layout::Bare);
        assert_eq!(decoded.family, KeyFamily::Unknown);
    }

    #[test]
    fn unrecognized_evm_prefixed_type_passes_through_as_meta() {
        let mut raw = b"evm".to_vec();
        raw.push(0xff);
        raw.extend_from_slice(b"xyz");
        let (layout, decoded) = classify_layout(&raw, None);
        assert_eq!(layout, Layout::EvmPrefixed);
        assert!(matches!(decoded.family, KeyFamily::Meta(_)));
    }

    #[test]
    fn unknown_family_roundtrips_its_tail_verbatim() {
        let raw = vec![0xaa, 1, 2, 3, 4];
        let (layout, decoded) = classify_layout(&raw, None);
        assert_eq!(decoded.family, KeyFamily::Unknown);
        let re = encode(&decoded, layout, None, None).unwrap();
        assert_eq!(re, raw);
    }
}
