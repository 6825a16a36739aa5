use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use structopt::StructOpt;

/// How a road's point sequence becomes geometry primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveFittingMode {
    /// Simplified line-segment chain.
    Polyline,
    /// Constant-curvature runs as arcs, lines elsewhere.
    Arc,
    /// Catmull-Rom smoothing, re-tessellated into line segments.
    Spline,
    /// Degree-adaptive parametric polynomials. `Polynomial` and `ParamPoly3`
    /// are the same path; both names appear in source data configs.
    Polynomial,
    ParamPoly3,
}

impl FromStr for CurveFittingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<CurveFittingMode> {
        match s.to_ascii_lowercase().as_str() {
            "polyline" => Ok(CurveFittingMode::Polyline),
            "arc" => Ok(CurveFittingMode::Arc),
            "spline" => Ok(CurveFittingMode::Spline),
            "polynomial" => Ok(CurveFittingMode::Polynomial),
            "parampoly3" => Ok(CurveFittingMode::ParamPoly3),
            x => anyhow::bail!("unknown curve fitting mode {}", x),
        }
    }
}

#[derive(Clone, Debug, StructOpt, Serialize, Deserialize)]
pub struct Options {
    /// Line-fit deviation budget, in meters
    #[structopt(long, default_value = "1.0")]
    pub tolerance: f64,

    /// polyline, arc, spline, polynomial, or parampoly3
    #[structopt(long, default_value = "parampoly3")]
    pub curve_fitting_mode: CurveFittingMode,

    /// Maximum polynomial degree to try (clamped to 2-5; only up to 3
    /// coefficients per axis are retained)
    #[structopt(long, default_value = "3")]
    pub polynomial_degree: usize,

    /// 0 is angular, 1 is smoothest (clamped to 0-1)
    #[structopt(long, default_value = "0.5")]
    pub curve_smoothness: f64,

    /// Tighten the effective tolerance (x0.8) instead of relaxing it (x1.5)
    #[structopt(long)]
    pub preserve_detail: bool,

    /// Decimal places for emitted coordinates and widths (clamped to 1-10)
    #[structopt(long, default_value = "3")]
    pub coordinate_precision: usize,

    /// Cap on line-mode primitives per road
    #[structopt(long, default_value = "100")]
    pub max_segments_per_road: usize,
}

impl Options {
    /// The option set with all documented clamps applied. Call once at the
    /// pipeline boundary; the fitting code assumes clamped values.
    pub fn clamped(mut self) -> Options {
        self.polynomial_degree = self.polynomial_degree.clamp(2, 5);
        self.curve_smoothness = self.curve_smoothness.clamp(0.0, 1.0);
        self.coordinate_precision = self.coordinate_precision.clamp(1, 10);
        self.max_segments_per_road = self.max_segments_per_road.max(1);
        self
    }

    /// The simplification tolerance after the detail-preservation scaling.
    pub fn effective_tolerance(&self) -> f64 {
        if self.preserve_detail {
            self.tolerance * 0.8
        } else {
            self.tolerance * 1.5
        }
    }
}

impl Default for Options {
    fn default() -> Options {
        Options {
            tolerance: 1.0,
            curve_fitting_mode: CurveFittingMode::ParamPoly3,
            polynomial_degree: 3,
            curve_smoothness: 0.5,
            preserve_detail: false,
            coordinate_precision: 3,
            max_segments_per_road: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping() {
        let opts = Options {
            polynomial_degree: 9,
            curve_smoothness: 1.7,
            coordinate_precision: 0,
            ..Options::default()
        }
        .clamped();
        assert_eq!(opts.polynomial_degree, 5);
        assert_eq!(opts.curve_smoothness, 1.0);
        assert_eq!(opts.coordinate_precision, 1);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(
            "ParamPoly3".parse::<CurveFittingMode>().unwrap(),
            CurveFittingMode::ParamPoly3
        );
        assert!("bezier".parse::<CurveFittingMode>().is_err());
    }
}
