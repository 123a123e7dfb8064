use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::StoreResult;

/// A readable byte stream handed out by [`BlobStore::read_stream`].
pub type BlobStream = Pin<Box<dyn AsyncRead + Send>>;

/// Named-blob storage capability.
///
/// All implementations must satisfy these invariants:
/// - `write(key, data)` followed by `read(key)` returns `data`, byte for
///   byte, until the key is overwritten or deleted.
/// - Writing an empty byte sequence deletes the key. Deleting an absent key
///   is a no-op.
/// - `list_all` returns every live key, sorted, with no duplicates.
/// - `read` of an absent key fails with [`StoreError::NotFound`].
/// - Errors are propagated, never silently ignored; decorators that swallow
///   failures (caching) do so only on their optimization path.
///
/// [`StoreError::NotFound`]: crate::error::StoreError::NotFound
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every key currently stored, sorted.
    async fn list_all(&self) -> StoreResult<Vec<String>>;

    /// Read the full contents of a blob.
    async fn read(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Write a blob. An empty `data` slice deletes the key.
    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Open a blob as a readable stream.
    ///
    /// Default implementation buffers the whole blob via [`read`]. Backends
    /// with a natural stream representation may override.
    ///
    /// [`read`]: BlobStore::read
    async fn read_stream(&self, key: &str) -> StoreResult<BlobStream> {
        let data = self.read(key).await?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    /// Write a blob from a readable stream. A stream yielding zero bytes
    /// deletes the key, matching [`write`].
    ///
    /// Default implementation drains the stream into memory and delegates to
    /// [`write`], so decorators inherit their byte-path semantics unchanged.
    ///
    /// [`write`]: BlobStore::write
    async fn write_stream(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StoreResult<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.write(key, &data).await
    }
}
