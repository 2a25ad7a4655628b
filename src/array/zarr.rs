//! Zarr array reader built on `zarrs`.
//!
//! Array metadata, chunk keys, codecs (blosc, zstd, gzip, ...), byte order,
//! memory order and fill values are all handled by `zarrs`. A strided read
//! retrieves the bounding box of the selected samples and keeps every
//! `step`-th one; the multiplexer picks the level so that the residual step
//! is small.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use zarrs::array::{Array, ArrayCreateError, ElementOwned};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::AsyncReadableStorageTraits;

use super::{ChunkedArray, DataType, Sample, SampleBlock};
use crate::error::{MetadataError, ReadError};

/// A 3-D Zarr array opened from async storage.
pub struct ZarrArray<S: ?Sized> {
    array: Array<S>,
    path: String,
    shape: [u64; 3],
    data_type: DataType,
}

impl<S: ?Sized + AsyncReadableStorageTraits + 'static> ZarrArray<S> {
    /// Open the array stored under `path`, relative to the store root.
    pub async fn open(storage: Arc<S>, path: &str) -> Result<Self, MetadataError> {
        let path = path.trim_matches('/').to_string();
        let array = Array::async_open(storage, &format!("/{}", path))
            .await
            .map_err(|e| match e {
                ArrayCreateError::MissingMetadata => {
                    MetadataError::Missing(format!("array metadata for {}", path))
                }
                other => MetadataError::Array {
                    path: path.clone(),
                    message: other.to_string(),
                },
            })?;

        let zarr = Self::from_array(array, path)?;
        debug!(
            path = %zarr.path,
            shape = ?zarr.shape,
            chunks = ?zarr.chunk_shape(),
            dtype = %zarr.data_type,
            "opened array"
        );
        Ok(zarr)
    }

    /// Wrap an already opened `zarrs` array.
    pub fn from_array(array: Array<S>, path: impl Into<String>) -> Result<Self, MetadataError> {
        let path = path.into();
        let shape: [u64; 3] =
            array
                .shape()
                .try_into()
                .map_err(|_| MetadataError::InvalidValue {
                    field: format!("{} shape", path),
                    message: format!("expected 3 dimensions, found {}", array.shape().len()),
                })?;
        let data_type =
            DataType::from_zarr(array.data_type()).ok_or_else(|| MetadataError::InvalidValue {
                field: format!("{} data type", path),
                message: format!("{:?} has no sample type", array.data_type()),
            })?;

        Ok(Self {
            array,
            path,
            shape,
            data_type,
        })
    }

    /// Array path relative to the store root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The underlying `zarrs` array.
    pub fn inner(&self) -> &Array<S> {
        &self.array
    }

    /// Shape of the first chunk; `None` for an empty chunk grid.
    pub fn chunk_shape(&self) -> Option<[u64; 3]> {
        let chunk = self.array.chunk_shape(&[0, 0, 0]).ok()?;
        let edges: Vec<u64> = chunk.iter().map(|c| c.get()).collect();
        edges.try_into().ok()
    }

    async fn retrieve<T: Sample + ElementOwned>(
        &self,
        ranges: &[std::ops::Range<u64>; 3],
        step: [u64; 3],
    ) -> Result<SampleBlock, ReadError> {
        let subset = ArraySubset::new_with_ranges(ranges);
        let values = self
            .array
            .async_retrieve_array_subset_elements::<T>(&subset)
            .await
            .map_err(|e| ReadError::Array {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        let dims = ranges.clone().map(|r| (r.end - r.start) as usize);
        let (shape, values) = decimate(values, dims, step);
        SampleBlock::from_values(shape, values).ok_or_else(|| ReadError::Array {
            path: self.path.clone(),
            message: format!("retrieved block does not match {:?}", dims),
        })
    }
}

#[async_trait]
impl<S: ?Sized + AsyncReadableStorageTraits + 'static> ChunkedArray for ZarrArray<S> {
    fn shape(&self) -> [u64; 3] {
        self.shape
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    async fn read_strided(
        &self,
        start: [u64; 3],
        stop: [u64; 3],
        step: [u64; 3],
    ) -> Result<SampleBlock, ReadError> {
        if step.contains(&0) {
            return Err(ReadError::InvalidStep {
                step,
                reason: "step components must be at least 1",
            });
        }

        let stop = [0, 1, 2].map(|a| stop[a].min(self.shape[a]));
        let counts = [0, 1, 2].map(|a| stop[a].saturating_sub(start[a]).div_ceil(step[a]));
        if counts.contains(&0) {
            return Ok(SampleBlock::empty(
                counts.map(|n| n as usize),
                self.data_type,
            ));
        }

        // (count - 1) * step < stop - start, so the last sample never overflows
        let ranges = [0, 1, 2].map(|a| start[a]..start[a] + (counts[a] - 1) * step[a] + 1);

        debug!(
            path = %self.path,
            ?start,
            ?stop,
            ?step,
            "strided read"
        );

        match self.data_type {
            DataType::Bool => self.retrieve::<bool>(&ranges, step).await,
            DataType::Int8 => self.retrieve::<i8>(&ranges, step).await,
            DataType::Int16 => self.retrieve::<i16>(&ranges, step).await,
            DataType::Int32 => self.retrieve::<i32>(&ranges, step).await,
            DataType::Int64 => self.retrieve::<i64>(&ranges, step).await,
            DataType::UInt8 => self.retrieve::<u8>(&ranges, step).await,
            DataType::UInt16 => self.retrieve::<u16>(&ranges, step).await,
            DataType::UInt32 => self.retrieve::<u32>(&ranges, step).await,
            DataType::UInt64 => self.retrieve::<u64>(&ranges, step).await,
            DataType::Float16 => self.retrieve::<half::f16>(&ranges, step).await,
            DataType::Float32 => self.retrieve::<f32>(&ranges, step).await,
            DataType::Float64 => self.retrieve::<f64>(&ranges, step).await,
        }
    }
}

/// Keep every `step`-th sample along each axis of a dense row-major block
/// whose extent `dims` starts and ends on a selected sample.
fn decimate<T: Copy>(values: Vec<T>, dims: [usize; 3], step: [u64; 3]) -> ([usize; 3], Vec<T>) {
    let step = step.map(|s| usize::try_from(s).unwrap_or(usize::MAX));
    let shape = [0, 1, 2].map(|a| dims[a].div_ceil(step[a]));
    if step == [1, 1, 1] {
        return (shape, values);
    }

    let mut out = Vec::with_capacity(shape.iter().product());
    for z in (0..dims[0]).step_by(step[0]) {
        for y in (0..dims[1]).step_by(step[1]) {
            let row = (z * dims[1] + y) * dims[2];
            out.extend(values[row..row + dims[2]].iter().step_by(step[2]).copied());
        }
    }
    (shape, out)
}
