//! Chunk storage: the store trait, its filesystem and S3 implementations, and
//! the read-through cache that sits in front of them and serves `zarrs`.

mod chunk_cache;
mod chunk_store;
mod fs_store;
mod s3_store;

pub use chunk_cache::{CacheStats, ChunkCache};
pub use chunk_store::{join_key, ChunkStore};
pub use fs_store::FsStore;
pub use s3_store::{create_s3_client, S3Store};
