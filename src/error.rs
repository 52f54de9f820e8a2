use thiserror::Error;

/// Errors raised while encoding or decoding the on-disk model asset format.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid asset magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },
    #[error("invalid asset type: expected {expected:#010x}, found {found:#010x}")]
    InvalidAssetType { expected: u32, found: u32 },
    #[error("guard mismatch at offset {offset}: expected {expected:?}, found {found:#010x}")]
    GuardMismatch {
        expected: &'static str,
        found: u32,
        offset: usize,
    },
    #[error("unsupported mesh type: {0}")]
    UnsupportedMeshType(u8),
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: u32,
        len: u32,
    },
    #[error("string table offset mismatch: header says {header}, strings guard is at {actual}")]
    StringTableOffsetMismatch { header: u32, actual: u32 },
    #[error("{context} mismatch: expected {expected}, found {found}")]
    AnimationChannelCountMismatch {
        context: String,
        expected: u16,
        found: u16,
    },
    #[error(transparent)]
    StringTable(#[from] StringTableError),
    #[error("io error while reading asset data: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    BinRead(#[from] binrw::Error),
}

/// Errors raised by the [`crate::string_table::StringTable`] container.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StringTableError {
    #[error("cannot add an empty string to a string table")]
    EmptyString,
    #[error("string table index {index} out of range (len {len})")]
    IndexOutOfRange { index: u32, len: u32 },
}

/// Errors raised by the pooled model/animation runtime.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("pool allocator exhausted (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
    #[error("render backend allocation failed: {detail}")]
    BackendAllocationFailed { detail: String },
    #[error("state violation: {detail}")]
    StateViolation { detail: &'static str },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Umbrella error returned at the public API boundary, where a single
/// operation can fail for either a codec or a runtime reason.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum KohiError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
