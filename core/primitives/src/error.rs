/// Errors raised while turning a [`crate::LogicalKey`] back into raw bytes.
///
/// Classification (`classify_layout`) never fails — an unrecognized key just
/// becomes `KeyFamily::Unknown` — but the inverse direction has real
/// preconditions per family, mirrored here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("namespace is required to encode a Namespaced-layout key")]
    MissingNamespace,
    #[error("revision is required to encode a Namespaced-layout key")]
    MissingRevision,
    #[error("logical key of family {family:?} is missing required field `{field}`")]
    MissingField {
        family: &'static str,
        field: &'static str,
    },
}

/// Errors raised while extracting the parent-hash field from an RLP-encoded
/// block header.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("header payload does not start with an RLP list prefix")]
    NotAList,
    #[error("header RLP payload is truncated or malformed")]
    Rlp(#[from] rlp::DecoderError),
    #[error("parent hash field has length {0}, expected 32")]
    BadParentHashLength(usize),
}

/// Errors raised while encoding or decoding a fixed-width [`crate::AcceptedBlock`]
/// record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AcceptedBlockError {
    #[error("accepted block record has length {actual}, expected {expected}")]
    WrongLength { actual: usize, expected: usize },
}
