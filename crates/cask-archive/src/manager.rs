use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use cask_store::BlobStore;

use crate::entry::EntryKind;
use crate::error::{ArchiveError, ArchiveResult};
use crate::reader::DirPackReader;
use crate::record::{ArchiveHandle, ArchiveRecord, METADATA_SUFFIX};
use crate::writer::DirPackWriter;

/// Packages directory trees into single blobs and manages their on-demand
/// extraction lifecycle.
///
/// Each registered archive is a metadata + packed blob pair in the
/// underlying store, linked by a package id. Callers address archives by
/// their logical identity -- the original source directory path -- via
/// [`ArchiveHandle`]. The loaded-map (source path to extraction path) is
/// process-local: a fresh process has no memory of prior loads.
///
/// Record lookup scans every metadata blob in the store, so `load`,
/// `delete`, and `list_all` are O(n) in the number of blobs. Adequate for
/// small-to-moderate archive counts; there is deliberately no index.
///
/// One manager-wide async mutex guards the loaded-map and the
/// check-then-extract / scan-then-delete sequences, so concurrent calls
/// within one process cannot double-extract. Concurrent *processes* sharing
/// a store or scratch directory are not coordinated.
pub struct ArchiveManager {
    scratch_dir: PathBuf,
    store: Arc<dyn BlobStore>,
    loaded: Mutex<HashMap<String, PathBuf>>,
}

impl ArchiveManager {
    /// Create a manager extracting into `scratch_dir` (created if absent)
    /// and persisting archives in `store`.
    pub fn new(scratch_dir: impl AsRef<Path>, store: Arc<dyn BlobStore>) -> ArchiveResult<Self> {
        let scratch_dir = scratch_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&scratch_dir)?;
        Ok(Self {
            scratch_dir,
            store,
            loaded: Mutex::new(HashMap::new()),
        })
    }

    /// Package the directory tree at `directory_path` into the store.
    ///
    /// Files within a directory are packed before its subdirectories, in
    /// lexicographic order, with forward-slash relative paths.
    ///
    /// Uniqueness of `directory_path` is not enforced: a second `add` of the
    /// same path creates an independent record, and [`load`] / [`delete`]
    /// resolve to the oldest live record for that path (metadata keys are
    /// scanned in sorted order and package ids are time-ordered). Delete the
    /// existing record first to replace an archive.
    ///
    /// [`load`]: ArchiveManager::load
    /// [`delete`]: ArchiveManager::delete
    pub async fn add(&self, directory_path: &str) -> ArchiveResult<ArchiveHandle> {
        if directory_path.trim().is_empty() {
            return Err(ArchiveError::InvalidSource(
                "source directory path is empty".into(),
            ));
        }
        let source = Path::new(directory_path);
        if !source.is_dir() {
            return Err(ArchiveError::InvalidSource(format!(
                "source is not an existing directory: {directory_path}"
            )));
        }

        let pack = self.pack_tree(source).await?;

        let record = ArchiveRecord::new(directory_path);
        self.store.write(&record.packed_blob_key, &pack).await?;
        self.store
            .write(&record.metadata_blob_key(), &record.to_json()?)
            .await?;

        tracing::debug!(
            source = directory_path,
            package_id = %record.package_id,
            "archive registered"
        );
        Ok(ArchiveHandle::new(directory_path))
    }

    /// Extract the archive into the scratch directory and return the local
    /// path.
    ///
    /// Idempotent: if the handle's source path is already loaded, the
    /// existing extraction path is returned without re-extracting or
    /// re-reading the store. Fails with [`ArchiveError::NotFound`] when no
    /// record matches.
    pub async fn load(&self, handle: &ArchiveHandle) -> ArchiveResult<PathBuf> {
        let mut loaded = self.loaded.lock().await;
        if let Some(path) = loaded.get(&handle.source_directory_path) {
            return Ok(path.clone());
        }

        let record = self
            .find_record(&handle.source_directory_path)
            .await?
            .ok_or_else(|| ArchiveError::NotFound(handle.source_directory_path.clone()))?;

        let packed = self.store.read(&record.packed_blob_key).await?;
        let target = self.scratch_dir.join(record.package_id.to_string());

        // Clean slate: a previous extraction at this path may be stale or
        // partial.
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&target).await?;

        let reader = DirPackReader::from_bytes(packed)?;
        for entry in reader.entries() {
            let entry = entry?;
            if entry.kind == EntryKind::Directory {
                continue;
            }
            let mut dest = target.clone();
            for segment in entry.path.split('/') {
                dest.push(segment);
            }
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, &entry.data).await?;
        }

        loaded.insert(handle.source_directory_path.clone(), target.clone());
        tracing::debug!(source = %handle.source_directory_path, path = %target.display(), "archive loaded");
        Ok(target)
    }

    /// Remove the extracted directory and forget the load. No-op if the
    /// handle is not currently loaded.
    pub async fn unload(&self, handle: &ArchiveHandle) -> ArchiveResult<()> {
        let mut loaded = self.loaded.lock().await;
        self.unload_locked(&mut loaded, handle).await
    }

    /// Remove the archive's record from the store, unloading it first if
    /// needed. A missing record is a silent no-op.
    pub async fn delete(&self, handle: &ArchiveHandle) -> ArchiveResult<()> {
        let mut loaded = self.loaded.lock().await;
        self.unload_locked(&mut loaded, handle).await?;

        if let Some(record) = self.find_record(&handle.source_directory_path).await? {
            // Soft delete: empty writes remove both halves of the pair.
            self.store.write(&record.metadata_blob_key(), &[]).await?;
            self.store.write(&record.packed_blob_key, &[]).await?;
            tracing::debug!(
                source = %handle.source_directory_path,
                package_id = %record.package_id,
                "archive deleted"
            );
        }
        Ok(())
    }

    /// One handle per parseable metadata record, deduplicated by source
    /// path. Corrupt or foreign blobs with a metadata suffix are skipped.
    pub async fn list_all(&self) -> ArchiveResult<Vec<ArchiveHandle>> {
        let mut handles = Vec::new();
        let mut seen = HashSet::new();
        for record in self.scan_records().await? {
            if seen.insert(record.source_directory_path.clone()) {
                handles.push(ArchiveHandle::new(record.source_directory_path));
            }
        }
        Ok(handles)
    }

    /// Wipe every blob in the store and forget all loads.
    ///
    /// A bulk reset with no per-record lifecycle guarantees; extracted
    /// scratch directories are left for the next `load` to overwrite.
    pub async fn clear(&self) -> ArchiveResult<()> {
        let mut loaded = self.loaded.lock().await;
        for key in self.store.list_all().await? {
            self.store.write(&key, &[]).await?;
        }
        loaded.clear();
        Ok(())
    }

    /// Whether the handle's source path is currently loaded.
    pub async fn is_loaded(&self, handle: &ArchiveHandle) -> bool {
        self.loaded
            .lock()
            .await
            .contains_key(&handle.source_directory_path)
    }

    /// Number of archives currently loaded.
    pub async fn loaded_count(&self) -> usize {
        self.loaded.lock().await.len()
    }

    async fn unload_locked(
        &self,
        loaded: &mut HashMap<String, PathBuf>,
        handle: &ArchiveHandle,
    ) -> ArchiveResult<()> {
        if let Some(path) = loaded.remove(&handle.source_directory_path) {
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Walk `source` and pack it into a single blob. Files come before
    /// subdirectories at each level, lexicographic within each group.
    async fn pack_tree(&self, source: &Path) -> ArchiveResult<Vec<u8>> {
        let mut writer = DirPackWriter::new();
        let walker = walkdir::WalkDir::new(source)
            .min_depth(1)
            .sort_by(|a, b| {
                (a.file_type().is_dir(), a.file_name().to_owned())
                    .cmp(&(b.file_type().is_dir(), b.file_name().to_owned()))
            });

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let rel = entry
                .path()
                .strip_prefix(source)
                .expect("walked path is under the walk root");
            let rel_path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if entry.file_type().is_dir() {
                writer.add_dir(&rel_path)?;
            } else if entry.file_type().is_file() {
                let data = tokio::fs::read(entry.path()).await?;
                writer.add_file(&rel_path, data)?;
            }
            // Symlinks and other special files are not representable.
        }

        Ok(writer.finish()?)
    }

    /// Parse every metadata blob in the store, in sorted key order,
    /// skipping blobs that fail to read or parse.
    async fn scan_records(&self) -> ArchiveResult<Vec<ArchiveRecord>> {
        let mut records = Vec::new();
        for key in self.store.list_all().await? {
            if !key.ends_with(METADATA_SUFFIX) {
                continue;
            }
            let data = match self.store.read(&key).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "skipping unreadable metadata blob");
                    continue;
                }
            };
            match ArchiveRecord::from_json(&data) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "skipping unparseable metadata blob");
                }
            }
        }
        Ok(records)
    }

    /// First record whose source path matches, over sorted metadata keys.
    async fn find_record(&self, source_directory_path: &str) -> ArchiveResult<Option<ArchiveRecord>> {
        Ok(self
            .scan_records()
            .await?
            .into_iter()
            .find(|r| r.source_directory_path == source_directory_path))
    }
}

impl std::fmt::Debug for ArchiveManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveManager")
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_store::{CachingStore, MemoryStore};

    /// Build a source tree: a.txt = "1", b/c.txt = "2", and an empty dir.
    fn make_source() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "1").unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("b").join("c.txt"), "2").unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        dir
    }

    fn make_manager() -> (tempfile::TempDir, Arc<MemoryStore>, ArchiveManager) {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let manager = ArchiveManager::new(scratch.path(), store.clone()).unwrap();
        (scratch, store, manager)
    }

    fn source_path(dir: &tempfile::TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    // -----------------------------------------------------------------------
    // Add
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn add_writes_record_pair() {
        let source = make_source();
        let (_scratch, store, manager) = make_manager();

        let handle = manager.add(&source_path(&source)).await.unwrap();
        assert_eq!(handle.source_directory_path, source_path(&source));

        let keys = store.list_all().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().any(|k| k.ends_with(".meta")));
        assert!(keys.iter().any(|k| k.ends_with(".pack")));
    }

    #[tokio::test]
    async fn add_rejects_bad_sources() {
        let (_scratch, _store, manager) = make_manager();

        for path in ["", "   ", "/definitely/not/a/real/dir"] {
            assert!(matches!(
                manager.add(path).await.unwrap_err(),
                ArchiveError::InvalidSource(_)
            ));
        }

        // A file is not a directory.
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            manager
                .add(&file.path().to_string_lossy())
                .await
                .unwrap_err(),
            ArchiveError::InvalidSource(_)
        ));
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn add_then_load_roundtrips_tree() {
        let source = make_source();
        let (_scratch, _store, manager) = make_manager();

        let handle = manager.add(&source_path(&source)).await.unwrap();
        let extracted = manager.load(&handle).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(extracted.join("a.txt")).unwrap(),
            "1"
        );
        assert_eq!(
            std::fs::read_to_string(extracted.join("b/c.txt")).unwrap(),
            "2"
        );
        assert!(manager.is_loaded(&handle).await);
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let source = make_source();
        let (_scratch, _store, manager) = make_manager();
        let handle = manager.add(&source_path(&source)).await.unwrap();

        let first = manager.load(&handle).await.unwrap();

        // Mutate the extracted tree; a second load must not overwrite it.
        std::fs::write(first.join("a.txt"), "mutated").unwrap();
        let second = manager.load(&handle).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            std::fs::read_to_string(second.join("a.txt")).unwrap(),
            "mutated"
        );
    }

    #[tokio::test]
    async fn load_unregistered_is_not_found() {
        let (_scratch, _store, manager) = make_manager();
        let err = manager
            .load(&ArchiveHandle::new("/never/added"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound(_)));
    }

    // -----------------------------------------------------------------------
    // Unload
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unload_removes_extraction() {
        let source = make_source();
        let (_scratch, _store, manager) = make_manager();
        let handle = manager.add(&source_path(&source)).await.unwrap();

        let extracted = manager.load(&handle).await.unwrap();
        assert!(extracted.exists());

        manager.unload(&handle).await.unwrap();
        assert!(!extracted.exists());
        assert!(!manager.is_loaded(&handle).await);
    }

    #[tokio::test]
    async fn unload_when_not_loaded_is_noop() {
        let (_scratch, _store, manager) = make_manager();
        manager
            .unload(&ArchiveHandle::new("/never/loaded"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unload_then_load_re_extracts() {
        let source = make_source();
        let (_scratch, _store, manager) = make_manager();
        let handle = manager.add(&source_path(&source)).await.unwrap();

        let first = manager.load(&handle).await.unwrap();
        std::fs::write(first.join("a.txt"), "mutated").unwrap();
        manager.unload(&handle).await.unwrap();

        // Fresh extraction discards the mutation.
        let second = manager.load(&handle).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(second.join("a.txt")).unwrap(),
            "1"
        );
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_removes_record_and_unloads() {
        let source = make_source();
        let (_scratch, store, manager) = make_manager();
        let handle = manager.add(&source_path(&source)).await.unwrap();
        let extracted = manager.load(&handle).await.unwrap();

        manager.delete(&handle).await.unwrap();

        assert!(!extracted.exists());
        assert!(store.is_empty());
        assert!(manager.list_all().await.unwrap().is_empty());
        assert!(matches!(
            manager.load(&handle).await.unwrap_err(),
            ArchiveError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_absent_record_is_noop() {
        let (_scratch, _store, manager) = make_manager();
        manager
            .delete(&ArchiveHandle::new("/never/added"))
            .await
            .unwrap();
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_all_returns_one_handle_per_archive() {
        let source_a = make_source();
        let source_b = make_source();
        let (_scratch, _store, manager) = make_manager();

        manager.add(&source_path(&source_a)).await.unwrap();
        manager.add(&source_path(&source_b)).await.unwrap();

        let handles = manager.list_all().await.unwrap();
        assert_eq!(handles.len(), 2);
        let paths: Vec<_> = handles
            .iter()
            .map(|h| h.source_directory_path.clone())
            .collect();
        assert!(paths.contains(&source_path(&source_a)));
        assert!(paths.contains(&source_path(&source_b)));
    }

    #[tokio::test]
    async fn list_all_skips_corrupt_metadata() {
        let source = make_source();
        let (_scratch, store, manager) = make_manager();
        manager.add(&source_path(&source)).await.unwrap();

        // A foreign blob wearing the metadata suffix must not break the scan.
        store.write("junk.meta", b"not a record").await.unwrap();

        let handles = manager.list_all().await.unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].source_directory_path, source_path(&source));
    }

    #[tokio::test]
    async fn duplicate_add_dedupes_in_listing() {
        let source = make_source();
        let (_scratch, store, manager) = make_manager();

        manager.add(&source_path(&source)).await.unwrap();
        manager.add(&source_path(&source)).await.unwrap();

        // Two independent record pairs exist in the store,
        assert_eq!(store.list_all().await.unwrap().len(), 4);
        // but the listing resolves them to one logical archive.
        assert_eq!(manager.list_all().await.unwrap().len(), 1);

        // And the archive still loads.
        let handle = ArchiveHandle::new(source_path(&source));
        let extracted = manager.load(&handle).await.unwrap();
        assert!(extracted.join("a.txt").exists());
    }

    // -----------------------------------------------------------------------
    // Clear
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn clear_resets_everything() {
        let source = make_source();
        let (_scratch, store, manager) = make_manager();
        let handle = manager.add(&source_path(&source)).await.unwrap();
        manager.load(&handle).await.unwrap();

        manager.clear().await.unwrap();

        assert!(store.is_empty());
        assert!(manager.list_all().await.unwrap().is_empty());
        assert_eq!(manager.loaded_count().await, 0);
        assert!(!manager.is_loaded(&handle).await);
    }

    // -----------------------------------------------------------------------
    // Composition over decorated stores
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn works_over_a_caching_store() {
        let source = make_source();
        let scratch = tempfile::tempdir().unwrap();

        let origin = Arc::new(MemoryStore::new());
        let caching = Arc::new(CachingStore::new(
            Arc::new(MemoryStore::new()),
            origin.clone(),
        ));
        let manager = ArchiveManager::new(scratch.path(), caching).unwrap();

        let handle = manager.add(&source_path(&source)).await.unwrap();
        // Blobs landed in the origin: the cache is transparent.
        assert_eq!(origin.len(), 2);

        let extracted = manager.load(&handle).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(extracted.join("b/c.txt")).unwrap(),
            "2"
        );

        manager.delete(&handle).await.unwrap();
        assert!(origin.is_empty());
    }
}
