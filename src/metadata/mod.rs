//! Pyramid metadata: NGFF multiscales attributes and axis units.

mod multiscales;
mod units;

pub use multiscales::{
    parse_attributes, parse_multiscales, physical_pixel_sizes, unit_factors, validate_axes, Axis,
    AxisKind, CoordinateTransform, Dataset, Multiscales, TransformKind,
};
pub use units::{known_unit_factor, unit_factor, BASE_UNIT};
