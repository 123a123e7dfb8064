use crate::error::{PackError, PackResult};

/// Type tag for pack entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file with contents.
    File,
    /// Directory marker. Carries no data. Extraction skips these and
    /// recreates directory structure from file paths instead.
    Directory,
}

impl EntryKind {
    /// Serialize to a type byte for the pack format.
    pub fn type_byte(&self) -> u8 {
        match self {
            Self::File => 1,
            Self::Directory => 2,
        }
    }

    /// Parse from a type byte.
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::File),
            2 => Some(Self::Directory),
            _ => None,
        }
    }
}

/// A single unpacked entry: relative path plus uncompressed contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackEntry {
    /// Kind of this entry.
    pub kind: EntryKind,
    /// Path relative to the archive root, forward-slash separated.
    pub path: String,
    /// Uncompressed contents. Empty for directory entries.
    pub data: Vec<u8>,
}

/// Validate a relative entry path.
///
/// Rejects absolute paths, backslashes, and `.`/`..`/empty segments so a
/// hostile pack cannot write outside the extraction root.
pub fn validate_rel_path(path: &str) -> PackResult<()> {
    if path.is_empty() {
        return Err(PackError::InvalidPath("empty path".into()));
    }
    if path.starts_with('/') {
        return Err(PackError::InvalidPath(format!("absolute path: {path}")));
    }
    if path.contains('\\') {
        return Err(PackError::InvalidPath(format!(
            "backslash separator: {path}"
        )));
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(PackError::InvalidPath(format!(
                "invalid path segment in: {path}"
            )));
        }
    }
    Ok(())
}
