//! Multiscale pyramids and the grids built on top of them.
//!
//! A [`Pyramid`] is opened once from a chunk store: the group attributes are
//! parsed, the axes validated, every level's array metadata loaded and the
//! levels sorted from coarsest to finest. All levels share one [`ChunkCache`]
//! in front of the store.
//!
//! From an opened pyramid a host builds one of two views:
//!
//! - [`Pyramid::multiplexed`]: a single [`Multiplexer`] surface that serves
//!   each read from the coarsest level able to satisfy its step
//! - [`Pyramid::level_grids`]: one [`LevelAdapter`] per requested scale
//!
//! Both implement [`GridSource`].

mod level;
mod multiplexer;
mod selection;

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::array::{ChunkedArray, DataType, SampleBlock, ZarrArray};
use crate::error::{PyramidError, ReadError};
use crate::io::{ChunkCache, ChunkStore};
use crate::metadata::{
    parse_attributes, physical_pixel_sizes, unit_factors, validate_axes, Multiscales,
};

pub use level::{reversed, LevelAdapter};
pub use multiplexer::Multiplexer;
pub use selection::{derive_factors, select_level, Strategy, PRECOMPUTED_STEPS};

/// Initial step for a multiplexed surface.
pub const DEFAULT_MULTIPLEXED_STEP: [u64; 3] = [4, 4, 4];

/// Initial step for a grid pinned to a single level.
pub const DEFAULT_LEVEL_STEP: [u64; 3] = [1, 1, 1];

/// Group attributes document.
const ATTRIBUTES_KEY: &str = ".zattrs";

// =============================================================================
// Grid Source
// =============================================================================

/// A region of a grid in ijk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub origin: [u64; 3],
    pub size: [u64; 3],
    pub step: [u64; 3],
}

/// Queryable 3-D grid addressed in ijk order.
#[async_trait]
pub trait GridSource: Send + Sync {
    fn name(&self) -> &str;

    /// Extent in ijk order.
    fn size(&self) -> [u64; 3];

    /// Physical step in ijk order.
    fn step(&self) -> [f64; 3];

    /// Element type of returned blocks.
    fn data_type(&self) -> DataType;

    /// Read a strided block.
    async fn read(
        &self,
        origin: [u64; 3],
        size: Option<[u64; 3]>,
        step: [u64; 3],
    ) -> Result<SampleBlock, ReadError>;

    /// Region first shown for this grid: the middle k-slice at `step`.
    fn initial_region(&self, step: [u64; 3]) -> Region {
        let [i, j, k] = self.size();
        Region {
            origin: [0, 0, k / 2],
            size: [i, j, 1],
            step,
        }
    }
}

#[async_trait]
impl<A: ChunkedArray> GridSource for LevelAdapter<A> {
    fn name(&self) -> &str {
        LevelAdapter::name(self)
    }

    fn size(&self) -> [u64; 3] {
        LevelAdapter::size(self)
    }

    fn step(&self) -> [f64; 3] {
        LevelAdapter::step(self)
    }

    fn data_type(&self) -> DataType {
        LevelAdapter::data_type(self)
    }

    async fn read(
        &self,
        origin: [u64; 3],
        size: Option<[u64; 3]>,
        step: [u64; 3],
    ) -> Result<SampleBlock, ReadError> {
        LevelAdapter::read(self, origin, size, step).await
    }
}

#[async_trait]
impl<A: ChunkedArray> GridSource for Multiplexer<A> {
    fn name(&self) -> &str {
        Multiplexer::name(self)
    }

    fn size(&self) -> [u64; 3] {
        Multiplexer::size(self)
    }

    fn step(&self) -> [f64; 3] {
        Multiplexer::step(self)
    }

    fn data_type(&self) -> DataType {
        Multiplexer::data_type(self)
    }

    async fn read(
        &self,
        origin: [u64; 3],
        size: Option<[u64; 3]>,
        step: [u64; 3],
    ) -> Result<SampleBlock, ReadError> {
        Multiplexer::read(self, origin, size, step).await
    }
}

// =============================================================================
// Pyramid
// =============================================================================

/// Options for [`Pyramid::open`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Maximum number of cached chunks; `None` caches without bound
    pub cache_capacity: Option<NonZeroUsize>,
    /// Display name; defaults to the descriptor's name, then the store identifier
    pub name: Option<String>,
}

/// Array type backing every level of a pyramid opened from store `S`.
pub type CachedArray<S> = ZarrArray<ChunkCache<S>>;

/// One level of an opened pyramid.
pub struct PyramidLevel<S> {
    array: Arc<CachedArray<S>>,
    path: String,
    /// Physical pixel size in angstrom, storage order
    pixel_size: [f64; 3],
    /// Physical origin in angstrom, storage order
    origin: [f64; 3],
}

impl<S: ChunkStore + 'static> PyramidLevel<S> {
    /// Dataset path of this level.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn array(&self) -> &CachedArray<S> {
        &self.array
    }

    /// Physical pixel size in storage order.
    pub fn pixel_size(&self) -> [f64; 3] {
        self.pixel_size
    }

    /// Physical origin in storage order.
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Grid view over this level.
    pub fn adapter(&self, name: &str) -> LevelAdapter<CachedArray<S>> {
        LevelAdapter::new(
            Arc::clone(&self.array),
            reversed(self.origin),
            reversed(self.pixel_size),
        )
        .with_name(name)
    }
}

/// An opened multiscale image.
pub struct Pyramid<S> {
    name: String,
    multiscales: Multiscales,
    cache: Arc<ChunkCache<S>>,
    /// Sorted coarsest first
    levels: Vec<PyramidLevel<S>>,
}

impl<S: ChunkStore + 'static> Pyramid<S> {
    /// Open the multiscale image at the root of `store`.
    pub async fn open(store: S, options: OpenOptions) -> Result<Self, PyramidError> {
        let identifier = store.identifier().to_string();
        let cache = Arc::new(ChunkCache::with_capacity(store, options.cache_capacity));

        let attrs = cache
            .get(ATTRIBUTES_KEY)
            .await?
            .ok_or_else(|| PyramidError::NoMultiscales(identifier.clone()))?;
        let multiscales = parse_attributes(&attrs)?
            .ok_or_else(|| PyramidError::NoMultiscales(identifier.clone()))?;

        validate_axes(&multiscales)?;

        let pixel_sizes = physical_pixel_sizes(&multiscales)?;
        let units = unit_factors(&multiscales)?;

        let mut levels = Vec::with_capacity(multiscales.datasets.len());
        for (dataset, pixel_size) in multiscales.datasets.iter().zip(pixel_sizes) {
            let array = ZarrArray::open(Arc::clone(&cache), &dataset.path).await?;
            let origin = match dataset.translation() {
                Some(t) => [t[0] * units[0], t[1] * units[1], t[2] * units[2]],
                None => [0.0; 3],
            };
            debug!(
                path = %dataset.path,
                pixel_size = ?pixel_size,
                elements = array.element_count(),
                "Loaded pyramid level"
            );
            levels.push(PyramidLevel {
                array: Arc::new(array),
                path: dataset.path.clone(),
                pixel_size,
                origin,
            });
        }
        if levels.is_empty() {
            return Err(PyramidError::EmptyPyramid);
        }

        // Stable, so equal-sized levels keep descriptor order
        levels.sort_by_key(|level| level.array.element_count());

        let name = options
            .name
            .or_else(|| multiscales.name.clone())
            .unwrap_or(identifier);

        info!(
            name = %name,
            store = cache.inner().identifier(),
            levels = levels.len(),
            "Opened pyramid"
        );

        Ok(Self {
            name,
            multiscales,
            cache,
            levels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed multiscales descriptor.
    pub fn multiscales(&self) -> &Multiscales {
        &self.multiscales
    }

    /// Available scale paths in descriptor order.
    pub fn scales(&self) -> Vec<&str> {
        self.multiscales.paths()
    }

    /// Levels sorted coarsest first.
    pub fn levels(&self) -> &[PyramidLevel<S>] {
        &self.levels
    }

    /// The chunk cache shared by all levels.
    pub fn cache(&self) -> &ChunkCache<S> {
        &self.cache
    }

    /// One surface spanning every level.
    pub fn multiplexed(&self) -> Result<Multiplexer<CachedArray<S>>, PyramidError> {
        let adapters = self
            .levels
            .iter()
            .map(|level| level.adapter(&self.name))
            .collect();
        Ok(Multiplexer::new(adapters)?.with_name(self.name.clone()))
    }

    /// One grid per requested scale, coarsest first.
    ///
    /// Every requested scale must be listed in the descriptor.
    pub fn level_grids(
        &self,
        scales: &[&str],
    ) -> Result<Vec<LevelAdapter<CachedArray<S>>>, PyramidError> {
        if let Some(missing) = scales
            .iter()
            .find(|scale| self.multiscales.dataset(scale).is_none())
        {
            return Err(PyramidError::ScaleNotAvailable(missing.to_string()));
        }

        Ok(self
            .levels
            .iter()
            .filter(|level| scales.contains(&level.path.as_str()))
            .map(|level| level.adapter(&format!("{} - {}", self.name, level.path)))
            .collect())
    }

    /// Downsample factor of every level, coarsest first.
    pub fn factors(&self) -> Result<Vec<u64>, PyramidError> {
        let steps: Vec<[f64; 3]> = self.levels.iter().map(|l| l.pixel_size).collect();
        derive_factors(&steps)
    }

    /// Level by dataset path.
    pub fn level(&self, path: &str) -> Result<&PyramidLevel<S>, PyramidError> {
        self.levels
            .iter()
            .find(|level| level.path == path)
            .ok_or_else(|| PyramidError::ScaleNotAvailable(path.to_string()))
    }
}

