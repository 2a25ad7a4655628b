//! OME-NGFF multiscales attributes.
//!
//! A pyramid group carries its level list in the `multiscales` attribute:
//!
//! ```json
//! {
//!   "multiscales": [{
//!     "axes": [
//!       {"name": "z", "type": "space", "unit": "nanometer"},
//!       {"name": "y", "type": "space", "unit": "nanometer"},
//!       {"name": "x", "type": "space", "unit": "nanometer"}
//!     ],
//!     "datasets": [
//!       {"path": "0", "coordinateTransformations": [{"type": "scale", "scale": [1, 1, 1]}]},
//!       {"path": "1", "coordinateTransformations": [{"type": "scale", "scale": [2, 2, 2]}]}
//!     ]
//!   }]
//! }
//! ```
//!
//! Axes are listed outermost first, matching array storage order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::units::unit_factor;
use crate::error::{MetadataError, PyramidError};

// =============================================================================
// Axes
// =============================================================================

/// Kind of an axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    #[default]
    Space,
    Time,
    Channel,
    /// Any type string outside the NGFF vocabulary
    #[serde(other)]
    Custom,
}

/// One axis of the multiscale image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,

    /// Physical unit; `None` means angstrom
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: AxisKind,
}

// =============================================================================
// Coordinate Transformations
// =============================================================================

/// Kind of a coordinate transformation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    #[default]
    Scale,
    Translation,
    Identity,
}

/// Scale or translation applied to a dataset's array coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTransform {
    #[serde(rename = "type", default)]
    pub kind: TransformKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<Vec<f64>>,
}

// =============================================================================
// Datasets
// =============================================================================

/// One resolution level of the multiscale image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Array path relative to the group ("0", "1", ...)
    pub path: String,

    #[serde(rename = "coordinateTransformations")]
    pub coordinate_transformations: Vec<CoordinateTransform>,
}

impl Dataset {
    /// The first scale vector of this dataset.
    pub fn scale(&self) -> Option<&[f64]> {
        self.coordinate_transformations
            .iter()
            .filter(|t| t.kind == TransformKind::Scale)
            .find_map(|t| t.scale.as_deref())
    }

    /// The first translation vector of this dataset, if any.
    pub fn translation(&self) -> Option<&[f64]> {
        self.coordinate_transformations
            .iter()
            .filter(|t| t.kind == TransformKind::Translation)
            .find_map(|t| t.translation.as_deref())
    }
}

/// Normalized multiscales descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiscales {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub axes: Vec<Axis>,

    /// Levels in descriptor order (usually finest first)
    pub datasets: Vec<Dataset>,
}

impl Multiscales {
    /// Dataset paths in descriptor order.
    pub fn paths(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.path.as_str()).collect()
    }

    /// Find a dataset by path.
    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.path == path)
    }

    fn check(&self) -> Result<(), MetadataError> {
        if self.axes.is_empty() {
            return Err(MetadataError::Missing("multiscales axes".to_string()));
        }
        if self.datasets.is_empty() {
            return Err(MetadataError::Missing("multiscales datasets".to_string()));
        }

        let ndim = self.axes.len();
        for dataset in &self.datasets {
            for transform in &dataset.coordinate_transformations {
                let (field, vector) = match transform.kind {
                    TransformKind::Scale => ("scale", transform.scale.as_ref()),
                    TransformKind::Translation => ("translation", transform.translation.as_ref()),
                    TransformKind::Identity => continue,
                };
                let vector = vector.ok_or_else(|| {
                    MetadataError::Missing(format!(
                        "{} vector in a {} transformation of dataset {}",
                        field, field, dataset.path
                    ))
                })?;
                if vector.len() != ndim {
                    return Err(MetadataError::InvalidValue {
                        field: format!("datasets[{}].{}", dataset.path, field),
                        message: format!("expected {} components, got {}", ndim, vector.len()),
                    });
                }
            }
            if dataset.scale().is_none() {
                return Err(MetadataError::Missing(format!(
                    "scale transformation for dataset {}",
                    dataset.path
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse the multiscales descriptor out of a group's attributes.
///
/// Returns `Ok(None)` when the attributes carry no `multiscales` entry, either
/// at the top level or nested under `ome`. Only the first multiscale image is
/// used. A `labels` entry is ignored with a warning.
pub fn parse_multiscales(attrs: &Value) -> Result<Option<Multiscales>, MetadataError> {
    let root = match attrs.get("ome") {
        Some(ome) if attrs.get("multiscales").is_none() => ome,
        _ => attrs,
    };

    if root.get("labels").is_some() {
        warn!("labels metadata is not supported and will be ignored");
    }

    let Some(entries) = root.get("multiscales") else {
        return Ok(None);
    };

    let entries = entries
        .as_array()
        .ok_or_else(|| MetadataError::Malformed {
            document: "multiscales",
            message: "expected an array".to_string(),
        })?;

    let first = entries
        .first()
        .ok_or_else(|| MetadataError::Missing("multiscales[0]".to_string()))?;
    if entries.len() > 1 {
        debug!(count = entries.len(), "using the first of several multiscale images");
    }

    let multiscales: Multiscales =
        serde_json::from_value(first.clone()).map_err(|e| MetadataError::Malformed {
            document: "multiscales",
            message: e.to_string(),
        })?;
    multiscales.check()?;

    Ok(Some(multiscales))
}

/// Parse raw `.zattrs` bytes and extract the multiscales descriptor.
pub fn parse_attributes(bytes: &[u8]) -> Result<Option<Multiscales>, MetadataError> {
    let attrs: Value = serde_json::from_slice(bytes).map_err(|e| MetadataError::Malformed {
        document: ".zattrs",
        message: e.to_string(),
    })?;
    parse_multiscales(&attrs)
}

// =============================================================================
// Validation and Pixel Sizes
// =============================================================================

/// Reject any axis layout other than three spatial axes.
pub fn validate_axes(multiscales: &Multiscales) -> Result<(), PyramidError> {
    for axis in &multiscales.axes {
        match axis.kind {
            AxisKind::Space => {}
            AxisKind::Channel => {
                return Err(PyramidError::UnsupportedAxis(format!(
                    "channel axis '{}' is not supported",
                    axis.name
                )))
            }
            AxisKind::Time => {
                return Err(PyramidError::UnsupportedAxis(format!(
                    "time axis '{}' is not supported",
                    axis.name
                )))
            }
            AxisKind::Custom => {
                return Err(PyramidError::UnsupportedAxis(format!(
                    "axis '{}' has an unknown type",
                    axis.name
                )))
            }
        }
    }

    if multiscales.axes.len() != 3 {
        return Err(PyramidError::UnsupportedAxis(format!(
            "expected 3 spatial axes, found {}",
            multiscales.axes.len()
        )));
    }

    Ok(())
}

/// Per-axis factors converting each axis unit to angstrom, storage order.
pub fn unit_factors(multiscales: &Multiscales) -> Result<[f64; 3], MetadataError> {
    let axes: &[Axis; 3] =
        multiscales
            .axes
            .as_slice()
            .try_into()
            .map_err(|_| MetadataError::InvalidValue {
                field: "axes".to_string(),
                message: format!("expected 3 axes, got {}", multiscales.axes.len()),
            })?;
    Ok([
        unit_factor(axes[0].unit.as_deref()),
        unit_factor(axes[1].unit.as_deref()),
        unit_factor(axes[2].unit.as_deref()),
    ])
}

/// Physical pixel size of every dataset in angstrom, descriptor order.
///
/// Each component is the dataset's scale for that axis times the axis unit
/// factor. Axis order is storage order (outermost first).
pub fn physical_pixel_sizes(multiscales: &Multiscales) -> Result<Vec<[f64; 3]>, MetadataError> {
    let factors = unit_factors(multiscales)?;

    multiscales
        .datasets
        .iter()
        .map(|dataset| {
            let scale = dataset.scale().ok_or_else(|| {
                MetadataError::Missing(format!(
                    "scale transformation for dataset {}",
                    dataset.path
                ))
            })?;
            if scale.len() != 3 {
                return Err(MetadataError::InvalidValue {
                    field: format!("datasets[{}].scale", dataset.path),
                    message: format!("expected 3 components, got {}", scale.len()),
                });
            }
            Ok([
                scale[0] * factors[0],
                scale[1] * factors[1],
                scale[2] * factors[2],
            ])
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
