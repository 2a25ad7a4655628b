//! Length units of the NGFF axis vocabulary.
//!
//! Physical pixel sizes are normalized to angstrom, the unit volumetric
//! viewers work in.

use tracing::warn;

/// Unit assumed when an axis does not declare one.
pub const BASE_UNIT: &str = "angstrom";

/// Multiplication factors converting each unit to angstrom.
const UNIT_FACTORS: &[(&str, f64)] = &[
    ("yoctometer", 1e-14),
    ("zeptometer", 1e-11),
    ("attometer", 1e-8),
    ("femtometer", 1e-5),
    ("picometer", 1e-2),
    ("angstrom", 1.0),
    ("nanometer", 1e1),
    ("micrometer", 1e4),
    ("millimeter", 1e7),
    ("centimeter", 1e8),
    ("decimeter", 1e9),
    ("meter", 1e10),
    ("decameter", 1e11),
    ("hectometer", 1e12),
    ("kilometer", 1e13),
    ("megameter", 1e16),
    ("gigameter", 1e19),
    ("terameter", 1e22),
    ("petameter", 1e25),
    ("exameter", 1e28),
    ("zettameter", 1e31),
    ("yottameter", 1e34),
    ("inch", 2.54e8),
    ("foot", 3.048e9),
    ("yard", 9.144e9),
    ("mile", 1.609344e13),
    ("parsec", 3.085_677_581_491_367e26),
];

/// Look up the angstrom factor for a unit name.
pub fn known_unit_factor(unit: &str) -> Option<f64> {
    UNIT_FACTORS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, factor)| *factor)
}

/// Factor converting `unit` to angstrom.
///
/// Missing units are angstrom. Unknown units fall back to the angstrom factor
/// with a warning, since the descriptor is otherwise usable.
pub fn unit_factor(unit: Option<&str>) -> f64 {
    let Some(unit) = unit else {
        return 1.0;
    };
    match known_unit_factor(unit) {
        Some(factor) => factor,
        None => {
            warn!(unit, "unknown axis unit, assuming {}", BASE_UNIT);
            1.0
        }
    }
}
