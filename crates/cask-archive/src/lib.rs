//! Directory-tree archiving over any cask blob store.
//!
//! Packages a directory tree into a single compressed blob, stores it with a
//! small JSON metadata record in any [`BlobStore`], and manages on-demand
//! extraction back into a local scratch directory.
//!
//! # Architecture
//!
//! - **Pack blob** (`<package-id>.pack`): zstd-compressed, CRC-checked
//!   entries with a BLAKE3 trailer checksum
//! - **Metadata blob** (`<package-id>.meta`): JSON record linking package
//!   id, source directory path, and packed blob key
//! - **DirPackWriter** / **DirPackReader**: build and read pack blobs
//! - **ArchiveManager**: add/load/unload/delete/list lifecycle, idempotent
//!   loads tracked by source directory path
//!
//! [`BlobStore`]: cask_store::BlobStore

pub mod entry;
pub mod error;
pub mod manager;
pub mod reader;
pub mod record;
pub mod writer;

pub use entry::{EntryKind, PackEntry};
pub use error::{ArchiveError, ArchiveResult, PackError, PackResult};
pub use manager::ArchiveManager;
pub use reader::DirPackReader;
pub use record::{ArchiveHandle, ArchiveRecord, METADATA_SUFFIX, PACKED_SUFFIX};
pub use writer::DirPackWriter;
