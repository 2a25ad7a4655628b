//! Chunked array abstraction.
//!
//! A pyramid level is backed by one chunked array. The level adapter only
//! needs the array's shape, element type and a strided read, so that is the
//! whole trait; [`ZarrArray`] implements it with `zarrs`, reading through
//! the [`ChunkCache`] storage adapter.
//!
//! [`ChunkCache`]: crate::io::ChunkCache

mod data_type;
mod zarr;

use async_trait::async_trait;

use crate::error::ReadError;

pub use data_type::{DataType, Sample, SampleBlock, Samples};
pub use zarr::ZarrArray;

/// A 3-D array addressed in storage order (outermost axis first).
#[async_trait]
pub trait ChunkedArray: Send + Sync {
    /// Extent of each axis.
    fn shape(&self) -> [u64; 3];

    /// Element type of stored samples.
    fn data_type(&self) -> DataType;

    /// Total number of elements.
    fn element_count(&self) -> u64 {
        self.shape().iter().product()
    }

    /// Read the samples at `start[a] + k * step[a]` below `stop[a]` on every axis.
    ///
    /// `stop` is clamped to the array shape. Any step is accepted, however
    /// far it reaches past the array.
    async fn read_strided(
        &self,
        start: [u64; 3],
        stop: [u64; 3],
        step: [u64; 3],
    ) -> Result<SampleBlock, ReadError>;
}
