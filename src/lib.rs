//! # NGFF Streamer
//!
//! Lazy, resolution-aware reads from OME-NGFF multiscale pyramids stored as
//! Zarr v2 arrays on a local disk or in S3-compatible object storage.
//!
//! A viewer asks for a region at some sampling step. Instead of reading the
//! full-resolution array and striding through it, the request is redirected to
//! the coarsest pyramid level whose resolution still satisfies the step, so
//! only the chunks of that level are fetched. Every fetched chunk is kept in a
//! read-through cache and concurrent requests for the same chunk share one
//! fetch.
//!
//! ## Architecture
//!
//! - [`io`] - Chunk stores (filesystem, S3) and the read-through chunk cache
//! - [`metadata`] - Multiscales attributes and axis units
//! - [`array`] - Chunked array trait, `zarrs`-backed reader and sample blocks
//! - [`pyramid`] - Pyramid opening, level adapters and the resolution multiplexer
//! - [`config`] - CLI configuration for the binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use ngff_streamer::{FsStore, OpenOptions, Pyramid};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FsStore::new("/data/image.ome.zarr");
//!     let pyramid = Pyramid::open(store, OpenOptions::default()).await?;
//!
//!     // One surface across every level; step 4 is served by a coarser level
//!     let grid = pyramid.multiplexed()?;
//!     let block = grid.read([0, 0, 0], Some([256, 256, 1]), [4, 4, 4]).await?;
//!     println!("read {:?} samples of {}", block.shape(), block.data_type());
//!     Ok(())
//! }
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod io;
pub mod metadata;
pub mod pyramid;

// Re-export commonly used types
pub use array::{ChunkedArray, DataType, Sample, SampleBlock, Samples, ZarrArray};
pub use config::{Cli, Command, InfoConfig, ReadConfig, SourceConfig, SourceLocation};
pub use error::{IoError, MetadataError, PyramidError, ReadError};
pub use io::{create_s3_client, CacheStats, ChunkCache, ChunkStore, FsStore, S3Store};
pub use metadata::{
    parse_attributes, parse_multiscales, physical_pixel_sizes, validate_axes, Axis, AxisKind,
    Dataset, Multiscales,
};
pub use pyramid::{
    CachedArray, GridSource, LevelAdapter, Multiplexer, OpenOptions, Pyramid, PyramidLevel,
    Region, Strategy, DEFAULT_LEVEL_STEP, DEFAULT_MULTIPLEXED_STEP,
};
