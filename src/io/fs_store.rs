use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::ChunkStore;
use crate::error::IoError;

/// Local-directory implementation of ChunkStore.
///
/// Keys map to paths relative to the root directory, so a Zarr group written
/// with `/` dimension separators is served as-is.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    identifier: String,
}

impl FsStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self { root, identifier }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ChunkStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, IoError> {
        if key.split('/').any(|part| part == "..") {
            return Err(IoError::Filesystem(format!(
                "key {} escapes the store root",
                key
            )));
        }

        let path = self.root.join(key.trim_start_matches('/'));
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IoError::Filesystem(format!("{}: {}", path.display(), e))),
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
