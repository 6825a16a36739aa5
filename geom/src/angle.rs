use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

/// An angle in radians, normalized to `(-pi, pi]` -- the OpenDRIVE heading
/// convention.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn new_rads(rads: f64) -> Angle {
        Angle(normalize_rads(rads))
    }

    pub fn degrees(degs: f64) -> Angle {
        Angle::new_rads(degs.to_radians())
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    pub fn to_degrees(self) -> f64 {
        self.0.to_degrees()
    }

    pub fn opposite(self) -> Angle {
        Angle::new_rads(self.0 + std::f64::consts::PI)
    }

    /// Rotates by 90 degrees, counter-clockwise.
    pub fn perpendicular(self) -> Angle {
        Angle::new_rads(self.0 + std::f64::consts::FRAC_PI_2)
    }

    /// The unit vector pointing along this angle.
    pub fn unit_vector(self) -> (f64, f64) {
        let (sin, cos) = self.0.sin_cos();
        (cos, sin)
    }

    /// The signed difference `self - other`, wrapped into `(-pi, pi]`.
    pub fn shortest_rotation_towards(self, other: Angle) -> f64 {
        normalize_rads(self.0 - other.0)
    }

    pub fn approx_eq(self, other: Angle, epsilon_rads: f64) -> bool {
        self.shortest_rotation_towards(other).abs() < epsilon_rads
    }
}

impl ops::Add for Angle {
    type Output = Angle;

    fn add(self, other: Angle) -> Angle {
        Angle::new_rads(self.0 + other.0)
    }
}

impl ops::Sub for Angle {
    type Output = Angle;

    fn sub(self, other: Angle) -> Angle {
        Angle::new_rads(self.0 - other.0)
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Angle({} degrees)", self.to_degrees())
    }
}

/// Wraps any radian value into `(-pi, pi]`.
pub(crate) fn normalize_rads(rads: f64) -> f64 {
    let mut r = rads.rem_euclid(2.0 * std::f64::consts::PI);
    if r > std::f64::consts::PI {
        r -= 2.0 * std::f64::consts::PI;
    }
    r
}
