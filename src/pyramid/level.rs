//! Single-resolution grid view over one pyramid level.
//!
//! Arrays are stored outermost axis first (z, y, x). Callers address the grid
//! in the reversed order (i, j, k) = (x, y, z), so every vector crossing this
//! API is reversed on the way in and on the way out. Returned sample blocks
//! keep storage order.

use std::sync::Arc;

use crate::array::{ChunkedArray, DataType, SampleBlock};
use crate::error::ReadError;

/// Reverse a 3-vector between storage order and grid (ijk) order.
#[inline]
pub fn reversed<T: Copy>(v: [T; 3]) -> [T; 3] {
    [v[2], v[1], v[0]]
}

/// One resolution level exposed as a queryable 3-D grid.
///
/// Reads are clamped to the level's extent and never cached here; caching
/// happens in the chunk store below the array.
pub struct LevelAdapter<A> {
    array: Arc<A>,
    name: String,
    /// Storage order
    origin: [f64; 3],
    /// Storage order
    step: [f64; 3],
}

impl<A> Clone for LevelAdapter<A> {
    fn clone(&self) -> Self {
        Self {
            array: Arc::clone(&self.array),
            name: self.name.clone(),
            origin: self.origin,
            step: self.step,
        }
    }
}

impl<A: ChunkedArray> LevelAdapter<A> {
    /// Create an adapter from an origin and physical step given in ijk order.
    pub fn new(array: Arc<A>, origin: [f64; 3], step: [f64; 3]) -> Self {
        Self {
            array,
            name: String::new(),
            origin: reversed(origin),
            step: reversed(step),
        }
    }

    /// Set a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn array(&self) -> &A {
        &self.array
    }

    /// Grid extent in ijk order.
    pub fn size(&self) -> [u64; 3] {
        reversed(self.array.shape())
    }

    /// Physical origin in ijk order.
    pub fn origin(&self) -> [f64; 3] {
        reversed(self.origin)
    }

    /// Physical step (pixel size) in ijk order.
    pub fn step(&self) -> [f64; 3] {
        reversed(self.step)
    }

    /// Element type of the stored samples.
    pub fn stored_data_type(&self) -> DataType {
        self.array.data_type()
    }

    /// Element type of blocks returned by [`read`](Self::read).
    pub fn data_type(&self) -> DataType {
        match self.array.data_type() {
            DataType::Float16 => DataType::Float32,
            other => other,
        }
    }

    /// Read a strided block.
    ///
    /// All vectors are in ijk order. The origin is clamped into the grid,
    /// a missing size means "to the end of the grid", and `origin + size` is
    /// clamped to the extent. Half-precision samples come back as `f32`.
    pub async fn read(
        &self,
        ijk_origin: [u64; 3],
        ijk_size: Option<[u64; 3]>,
        ijk_step: [u64; 3],
    ) -> Result<SampleBlock, ReadError> {
        if ijk_step.contains(&0) {
            return Err(ReadError::InvalidStep {
                step: ijk_step,
                reason: "step components must be at least 1",
            });
        }

        let shape = self.array.shape();
        let origin = reversed(ijk_origin);
        let step = reversed(ijk_step);

        let start = [0, 1, 2].map(|a| origin[a].min(shape[a].saturating_sub(1)));
        let stop = match ijk_size {
            None => shape,
            Some(size) => {
                let size = reversed(size);
                [0, 1, 2].map(|a| start[a].saturating_add(size[a]).min(shape[a]))
            }
        };

        let block = self.array.read_strided(start, stop, step).await?;
        Ok(block.promote_half())
    }
}
