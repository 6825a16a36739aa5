use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Angle, EPSILON_DIST};

/// A point in a local metric frame, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pt2D {
    x: f64,
    y: f64,
}

impl Pt2D {
    pub fn new(x: f64, y: f64) -> Pt2D {
        if !x.is_finite() || !y.is_finite() {
            panic!("Bad Pt2D ({}, {})", x, y);
        }
        Pt2D { x, y }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn dist_to(self, to: Pt2D) -> f64 {
        ((self.x - to.x).powi(2) + (self.y - to.y).powi(2)).sqrt()
    }

    pub fn angle_to(self, to: Pt2D) -> Angle {
        Angle::new_rads((to.y - self.y).atan2(to.x - self.x))
    }

    /// The point at `dist` meters away in the direction `theta`.
    pub fn project_away(self, dist: f64, theta: Angle) -> Pt2D {
        let (sin, cos) = theta.radians().sin_cos();
        Pt2D::new(self.x + dist * cos, self.y + dist * sin)
    }

    pub fn approx_eq(self, other: Pt2D, threshold: f64) -> bool {
        self.dist_to(other) < threshold
    }

    /// Linear interpolation towards `to`; `pct` 0 is `self`, 1 is `to`.
    pub fn lerp(self, to: Pt2D, pct: f64) -> Pt2D {
        Pt2D::new(self.x + pct * (to.x - self.x), self.y + pct * (to.y - self.y))
    }

    /// The midpoint of two points.
    pub fn center(self, other: Pt2D) -> Pt2D {
        self.lerp(other, 0.5)
    }

    /// Drops consecutive points closer than `EPSILON_DIST`.
    pub fn dedupe(pts: Vec<Pt2D>) -> Vec<Pt2D> {
        let mut result: Vec<Pt2D> = Vec::new();
        for pt in pts {
            if result
                .last()
                .map(|last| !last.approx_eq(pt, EPSILON_DIST))
                .unwrap_or(true)
            {
                result.push(pt);
            }
        }
        result
    }
}

impl fmt::Display for Pt2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt2D({}, {})", self.x, self.y)
    }
}
