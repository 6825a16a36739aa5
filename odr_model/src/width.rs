use serde::{Deserialize, Serialize};

use geom::{Angle, Pt2D};

/// One measured width between a road's left and right boundary, at arc
/// length `s` along the reference line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WidthSample {
    pub s: f64,
    /// Always >= 0.
    pub width: f64,
    pub left_pt: Pt2D,
    pub right_pt: Pt2D,
    pub reference_pt: Pt2D,
    pub reference_heading: Angle,
}

/// A cubic width record covering `[s, s + length]`:
/// `w(ds) = a + b*ds + c*ds^2 + d*ds^3`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WidthPolynomialSegment {
    pub s: f64,
    pub length: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub start_width: f64,
    pub end_width: f64,
}

impl WidthPolynomialSegment {
    pub fn eval(&self, ds: f64) -> f64 {
        self.a + self.b * ds + self.c * ds * ds + self.d * ds * ds * ds
    }

    /// The record with its meter-valued fields rounded for emission. The
    /// slope terms stay exact: `c` and `d` are per-meter^2 and per-meter^3,
    /// so truncating them would shift evaluated widths by meters over a
    /// long record.
    pub fn rounded(&self, precision: usize) -> WidthPolynomialSegment {
        WidthPolynomialSegment {
            a: crate::round_decimal(self.a, precision),
            start_width: crate::round_decimal(self.start_width, precision),
            end_width: crate::round_decimal(self.end_width, precision),
            ..self.clone()
        }
    }
}
