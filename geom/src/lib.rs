//! 2D geometry for road conversion: points, angles, lines, and polylines in a
//! local metric frame. Everything is in meters.

mod angle;
mod line;
mod polyline;
mod pt;

pub use crate::angle::Angle;
pub use crate::line::Line;
pub use crate::polyline::PolyLine;
pub use crate::pt::Pt2D;

/// Two points closer than this are considered coincident.
pub const EPSILON_DIST: f64 = 1e-6;
