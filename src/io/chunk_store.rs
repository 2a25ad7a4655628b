use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for fetching whole objects from key-addressed chunk storage.
///
/// Keys follow the Zarr store layout: metadata documents such as `.zattrs`
/// or `0/.zarray`, and chunks such as `0/3/1/7`. Implementations must be
/// thread-safe; the pyramid shares one store between all of its levels.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Fetch the object stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist. Zarr arrays leave chunks
    /// that contain only the fill value unwritten, so absence is not an error.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, IoError>;

    /// Get a unique identifier for this store (for logging).
    ///
    /// For S3, this would typically be `s3://bucket/prefix`.
    fn identifier(&self) -> &str;
}

#[async_trait]
impl<T: ChunkStore + ?Sized> ChunkStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, IoError> {
        (**self).get(key).await
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

/// Join a store prefix and a key with a single `/`.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}
