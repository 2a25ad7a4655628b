//! One queryable grid spanning every level of a pyramid.
//!
//! The multiplexer presents the finest level's coordinate space. Each read is
//! redirected to the coarsest level that can serve the requested step exactly,
//! with origin and size scaled down into that level's local coordinates. No
//! resampling happens here: switching levels is an exact stride.

use std::collections::HashMap;

use tracing::debug;

use crate::array::{ChunkedArray, DataType, SampleBlock};
use crate::error::{PyramidError, ReadError};

use super::level::LevelAdapter;
use super::selection::{derive_factors, select_level, Strategy, PRECOMPUTED_STEPS};

/// Level adapters ordered coarsest to finest, with their downsample factors.
///
/// All state is fixed at construction, so a multiplexer can be shared across
/// tasks behind an `Arc` without further locking.
pub struct Multiplexer<A> {
    name: String,
    levels: Vec<LevelAdapter<A>>,
    factors: Vec<u64>,
    strategies: HashMap<[u64; 3], Strategy>,
}

impl<A: ChunkedArray> Multiplexer<A> {
    /// Build a multiplexer over `levels`, ordered coarsest first.
    ///
    /// Fails if the levels' physical steps are not isotropic integer
    /// multiples of the finest level's step.
    pub fn new(levels: Vec<LevelAdapter<A>>) -> Result<Self, PyramidError> {
        let steps: Vec<[f64; 3]> = levels.iter().map(|level| level.step()).collect();
        let factors = derive_factors(&steps)?;

        let mut strategies = HashMap::new();
        for s in PRECOMPUTED_STEPS {
            let step = [s, s, s];
            // Isotropic steps always satisfy the multiple-of-min check
            if let Ok(strategy) = select_level(&factors, step) {
                strategies.insert(step, strategy);
            }
        }

        debug!(
            levels = levels.len(),
            factors = ?factors,
            "Built resolution multiplexer"
        );

        Ok(Self {
            name: String::new(),
            levels,
            factors,
            strategies,
        })
    }

    /// Set a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Levels, coarsest first.
    pub fn levels(&self) -> &[LevelAdapter<A>] {
        &self.levels
    }

    /// Downsample factor of each level relative to the finest.
    pub fn factors(&self) -> &[u64] {
        &self.factors
    }

    fn finest(&self) -> &LevelAdapter<A> {
        // derive_factors rejects an empty level list
        &self.levels[self.levels.len() - 1]
    }

    /// Full-resolution extent in ijk order.
    pub fn size(&self) -> [u64; 3] {
        self.finest().size()
    }

    /// Physical origin of the finest level in ijk order.
    pub fn origin(&self) -> [f64; 3] {
        self.finest().origin()
    }

    /// Physical step of the finest level in ijk order.
    pub fn step(&self) -> [f64; 3] {
        self.finest().step()
    }

    /// Element type of returned blocks.
    pub fn data_type(&self) -> DataType {
        self.finest().data_type()
    }

    /// Compute how `step` would be served without consulting the precomputed table.
    pub fn select(&self, step: [u64; 3]) -> Result<Strategy, ReadError> {
        select_level(&self.factors, step)
    }

    /// Strategy for `step`, from the precomputed table when available.
    pub fn strategy(&self, step: [u64; 3]) -> Result<Strategy, ReadError> {
        match self.strategies.get(&step) {
            Some(strategy) => Ok(*strategy),
            None => {
                let strategy = self.select(step)?;
                debug!(
                    step = ?step,
                    level = strategy.level,
                    residual = ?strategy.residual_step,
                    "Computed selection strategy"
                );
                Ok(strategy)
            }
        }
    }

    /// Read a strided block in full-resolution ijk coordinates.
    ///
    /// Each size component is widened to at least the step. Origin and size
    /// are divided by the chosen level's factor and the read is delegated to
    /// that level with the residual step.
    pub async fn read(
        &self,
        ijk_origin: [u64; 3],
        ijk_size: Option<[u64; 3]>,
        ijk_step: [u64; 3],
    ) -> Result<SampleBlock, ReadError> {
        let strategy = self.strategy(ijk_step)?;
        let factor = strategy.factor;

        let origin = [0, 1, 2].map(|a| ijk_origin[a] / factor[a]);
        let size = ijk_size.map(|size| [0, 1, 2].map(|a| size[a].max(ijk_step[a]) / factor[a]));

        self.levels[strategy.level]
            .read(origin, size, strategy.residual_step)
            .await
    }
}
