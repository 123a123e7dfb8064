use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArchiveError, ArchiveResult};

/// Fixed suffix of metadata blob keys, distinguishing them from packed
/// blobs during store scans.
pub const METADATA_SUFFIX: &str = ".meta";
/// Fixed suffix of packed-tree blob keys.
pub const PACKED_SUFFIX: &str = ".pack";

/// Caller-facing handle for one registered archive.
///
/// The logical identity of an archive is the original source directory path
/// string, not its internal package id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveHandle {
    /// The directory path the archive was created from.
    pub source_directory_path: String,
}

impl ArchiveHandle {
    /// Create a handle for the given source directory path.
    pub fn new(source_directory_path: impl Into<String>) -> Self {
        Self {
            source_directory_path: source_directory_path.into(),
        }
    }
}

/// Persisted metadata for one archive: the self-describing half of the
/// metadata + packed blob pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    /// Opaque unique id generated at creation time, never reused.
    pub package_id: Uuid,
    /// Logical identity: the directory path passed to `add`.
    pub source_directory_path: String,
    /// Store key of the packed directory-tree blob.
    pub packed_blob_key: String,
}

impl ArchiveRecord {
    /// Create a record with a fresh package id and derived blob keys.
    pub fn new(source_directory_path: impl Into<String>) -> Self {
        let package_id = Uuid::now_v7();
        Self {
            package_id,
            source_directory_path: source_directory_path.into(),
            packed_blob_key: format!("{package_id}{PACKED_SUFFIX}"),
        }
    }

    /// Store key of this record's own metadata blob.
    pub fn metadata_blob_key(&self) -> String {
        format!("{}{METADATA_SUFFIX}", self.package_id)
    }

    /// Serialize to the stored JSON representation.
    pub fn to_json(&self) -> ArchiveResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }

    /// Parse from the stored JSON representation.
    pub fn from_json(data: &[u8]) -> ArchiveResult<Self> {
        serde_json::from_slice(data).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }
}
