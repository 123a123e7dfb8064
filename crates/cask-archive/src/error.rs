use thiserror::Error;

use cask_store::StoreError;

/// Errors from the directory pack format.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid pack magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("pack checksum mismatch")]
    ChecksumMismatch,

    #[error("corrupt pack entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("CRC32 mismatch for entry {path}")]
    CrcMismatch { path: String },

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("invalid entry path: {0}")]
    InvalidPath(String),
}

/// Result alias for pack operations.
pub type PackResult<T> = Result<T, PackError>;

/// Errors from archive lifecycle operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The source directory passed to `add` is unusable.
    #[error("invalid archive source: {0}")]
    InvalidSource(String),

    /// No archive record exists for the given source directory path.
    #[error("archive not found for source: {0}")]
    NotFound(String),

    /// Failure from the underlying blob store (authoritative, propagated).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The packed blob is malformed.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Metadata record could not be serialized.
    #[error("metadata serialization error: {0}")]
    Serialization(String),

    /// Local scratch-directory I/O failure (disk full, permissions).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
