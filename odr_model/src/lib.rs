//! The output model for OpenDRIVE conversion: parametric geometry primitives,
//! road segments, and lane width profiles. An external serializer turns these
//! into `<planView>` and `<width>` XML records; this crate owns the numeric
//! payload and its invariants.

mod geometry;
mod road;
mod width;

pub use crate::geometry::{GeometryPrimitive, ParamPoly3, PrimitiveKind};
pub use crate::road::{RoadSegment, CONTINUITY_GAP};
pub use crate::width::{WidthPolynomialSegment, WidthSample};

use serde::{Deserialize, Serialize};

/// The per-road payload handed to the OpenDRIVE serializer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertedRoad {
    pub id: String,
    pub segment: RoadSegment,
    pub lanes: Vec<LaneWidthProfile>,
}

/// Width records for one lane surface, ordered by `s`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaneWidthProfile {
    pub index: i32,
    pub widths: Vec<WidthPolynomialSegment>,
}

/// Rounds to `places` decimal places, for emission at a configured
/// coordinate precision.
pub fn round_decimal(x: f64, places: usize) -> f64 {
    let factor = 10.0_f64.powi(places as i32);
    (x * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_decimal(3.14159, 3), 3.142);
        assert_eq!(round_decimal(-0.00049, 3), -0.0);
        assert_eq!(round_decimal(2.5, 1), 2.5);
    }
}
