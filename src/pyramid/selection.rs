//! Resolution selection.
//!
//! Levels are ordered coarsest first. Each level has an integer downsample
//! factor relative to the finest level, which is derived from the physical
//! pixel sizes once when the pyramid is built. A requested step is served by
//! the coarsest level whose factor divides the smallest step component; the
//! remainder of the stride is applied inside that level.

use std::ops::RangeInclusive;

use crate::error::{PyramidError, ReadError};

/// Isotropic steps whose strategies are computed up front.
pub const PRECOMPUTED_STEPS: RangeInclusive<u64> = 1..=16;

const RELATIVE_TOLERANCE: f64 = 1e-5;
const ABSOLUTE_TOLERANCE: f64 = 1e-8;

#[inline]
fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * b.abs()
}

/// How a requested step is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strategy {
    /// Index of the chosen level (0 = coarsest)
    pub level: usize,
    /// Step to apply within the chosen level
    pub residual_step: [u64; 3],
    /// Downsample factor of the chosen level; origin and size are divided by it
    pub factor: [u64; 3],
}

/// Integer downsample factor of every level relative to the last (finest) one.
///
/// `steps` are physical pixel sizes ordered coarsest first. Every ratio must
/// be the same on all three axes and integral, and each level's factor must
/// be a multiple of the next finer level's factor.
pub fn derive_factors(steps: &[[f64; 3]]) -> Result<Vec<u64>, PyramidError> {
    let base = *steps.last().ok_or(PyramidError::EmptyPyramid)?;
    if base.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(PyramidError::UnsupportedPyramid {
            reason: "invalid pixel size",
            detail: format!("finest pixel size {:?} must be positive", base),
        });
    }

    let mut factors = Vec::with_capacity(steps.len());
    for step in steps {
        let rel = [0, 1, 2].map(|a| step[a] / base[a]);

        if !(approx_eq(rel[1], rel[0]) && approx_eq(rel[2], rel[0])) {
            return Err(PyramidError::UnsupportedPyramid {
                reason: "anisotropic",
                detail: format!(
                    "finest step {:?}, current step {:?}, relative step {:?}",
                    base, step, rel
                ),
            });
        }

        let rounded = rel[0].round();
        if !approx_eq(rel[0], rounded) || rounded < 1.0 {
            return Err(PyramidError::UnsupportedPyramid {
                reason: "non-integer ratio",
                detail: format!("relative step {:?}", rel),
            });
        }

        factors.push(rounded as u64);
    }

    for pair in factors.windows(2) {
        if pair[0] % pair[1] != 0 {
            return Err(PyramidError::UnsupportedPyramid {
                reason: "non-integer ratio",
                detail: format!(
                    "factor {} is not a multiple of the next finer factor {} (factors {:?})",
                    pair[0], pair[1], factors
                ),
            });
        }
    }

    Ok(factors)
}

/// Pick the coarsest level able to serve `step`.
///
/// Anisotropic steps are allowed as long as every component is a multiple of
/// the smallest one.
pub fn select_level(factors: &[u64], step: [u64; 3]) -> Result<Strategy, ReadError> {
    if step.contains(&0) {
        return Err(ReadError::InvalidStep {
            step,
            reason: "step components must be at least 1",
        });
    }

    let minstep = step.iter().copied().min().unwrap_or(1);
    if step.iter().any(|s| s % minstep != 0) {
        return Err(ReadError::InvalidStep {
            step,
            reason: "anisotropic steps must be multiples of the smallest step",
        });
    }

    // The finest level has factor 1 and always qualifies
    let level = factors
        .iter()
        .position(|&f| minstep >= f && minstep % f == 0)
        .ok_or(ReadError::InvalidStep {
            step,
            reason: "no level can serve this step",
        })?;

    let f = factors[level];
    Ok(Strategy {
        level,
        residual_step: step.map(|s| s / f),
        factor: [f; 3],
    })
}
