use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, BlobStream};

/// Filesystem-backed blob store: one file per key under a root directory.
///
/// Keys are relative paths with forward-slash separators; `write("a/b", ..)`
/// creates `<root>/a/b`, with intermediate directories made on demand.
/// Absolute keys and keys containing `.`, `..`, or empty path segments are
/// rejected so no key can escape the root.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if absent.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("empty key".into()));
        }
        if key.starts_with('/') {
            return Err(StoreError::InvalidArgument(format!(
                "absolute key not allowed: {key}"
            )));
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::InvalidArgument(format!(
                    "key contains invalid path segment: {key}"
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for FileStore {
    async fn list_all(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.key_to_path(key)?;
        if data.is_empty() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, data).await?;
            Ok(())
        }
    }

    async fn read_stream(&self, key: &str) -> StoreResult<BlobStream> {
        let path = self.key_to_path(key)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("root", &self.root).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn temp_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        (dir, store)
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_and_read() {
        let (_dir, store) = temp_store();
        store.write("file.bin", b"contents").await.unwrap();
        assert_eq!(store.read("file.bin").await.unwrap(), b"contents");
    }

    #[tokio::test]
    async fn nested_key_creates_directories() {
        let (_dir, store) = temp_store();
        store.write("a/b/c.txt", b"deep").await.unwrap();
        assert_eq!(store.read("a/b/c.txt").await.unwrap(), b"deep");
        assert!(store.root().join("a/b/c.txt").exists());
    }

    #[tokio::test]
    async fn read_missing_key_is_not_found() {
        let (_dir, store) = temp_store();
        let err = store.read("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    // -----------------------------------------------------------------------
    // Delete-on-empty
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn empty_write_deletes_file() {
        let (_dir, store) = temp_store();
        store.write("k", b"data").await.unwrap();
        store.write("k", b"").await.unwrap();
        assert!(store.read("k").await.is_err());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_absent_key_is_noop() {
        let (_dir, store) = temp_store();
        store.write("never-written", b"").await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Key validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let (_dir, store) = temp_store();
        for key in ["", "/abs", "../escape", "a/../b", "a//b", "./x"] {
            let err = store.write(key, b"x").await.unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidArgument(_)),
                "key {key:?} should be rejected"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_all_returns_relative_sorted_keys() {
        let (_dir, store) = temp_store();
        store.write("b.txt", b"2").await.unwrap();
        store.write("sub/a.txt", b"1").await.unwrap();
        store.write("a.txt", b"0").await.unwrap();

        let keys = store.list_all().await.unwrap();
        assert_eq!(keys, vec!["a.txt", "b.txt", "sub/a.txt"]);
    }

    // -----------------------------------------------------------------------
    // Streaming
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn read_stream_from_file() {
        let (_dir, store) = temp_store();
        store.write("streamed", b"direct from disk").await.unwrap();

        let mut stream = store.read_stream("streamed").await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"direct from disk");
    }

    #[tokio::test]
    async fn read_stream_missing_is_not_found() {
        let (_dir, store) = temp_store();
        // Streams are not Debug, so match on the Result instead of
        // unwrapping the error out of it.
        assert!(matches!(
            store.read_stream("missing").await.map(|_| ()),
            Err(StoreError::NotFound(_))
        ));
    }
}
