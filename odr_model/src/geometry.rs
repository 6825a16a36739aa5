use serde::{Deserialize, Serialize};

use geom::{Angle, Pt2D};

/// One piece of a road's reference line, in OpenDRIVE's plan-view terms.
///
/// `start` is the absolute start coordinate. Internally every primitive
/// carries it, so continuity can be audited; the emitted form keeps it only
/// on the first primitive of a segment (the schema chains the rest
/// implicitly).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeometryPrimitive {
    /// Arc-length offset from the start of the containing segment.
    pub s: f64,
    pub start: Option<Pt2D>,
    /// Tangent direction at the start, in `(-pi, pi]`.
    pub heading: Angle,
    pub length: f64,
    pub kind: PrimitiveKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Line,
    Arc {
        /// Signed; positive curves left.
        curvature: f64,
    },
    ParamPoly3(ParamPoly3),
}

/// A parametric cubic in a local `(u, v)` frame whose u-axis is the
/// primitive's start heading, over `t` in `[0, 1]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamPoly3 {
    pub au: f64,
    pub bu: f64,
    pub cu: f64,
    pub du: f64,
    pub av: f64,
    pub bv: f64,
    pub cv: f64,
    pub dv: f64,
    /// Blend of max and RMS deviation from the fitted points, in meters.
    pub fitting_error: f64,
    /// The degree actually retained (coefficients above it are zero).
    pub polynomial_degree: usize,
}

impl ParamPoly3 {
    pub fn eval_local(&self, t: f64) -> (f64, f64) {
        (
            self.au + self.bu * t + self.cu * t * t + self.du * t * t * t,
            self.av + self.bv * t + self.cv * t * t + self.dv * t * t * t,
        )
    }

    pub fn deriv_local(&self, t: f64) -> (f64, f64) {
        (
            self.bu + 2.0 * self.cu * t + 3.0 * self.du * t * t,
            self.bv + 2.0 * self.cv * t + 3.0 * self.dv * t * t,
        )
    }
}

impl GeometryPrimitive {
    /// The point and heading `ds` meters along this primitive, measured from
    /// `start` (the primitive's absolute start).
    pub fn eval(&self, start: Pt2D, ds: f64) -> (Pt2D, Angle) {
        let h = self.heading.radians();
        match &self.kind {
            PrimitiveKind::Line => (start.project_away(ds, self.heading), self.heading),
            PrimitiveKind::Arc { curvature } => {
                let k = *curvature;
                if k.abs() < 1e-12 {
                    return (start.project_away(ds, self.heading), self.heading);
                }
                let pt = Pt2D::new(
                    start.x() + ((h + k * ds).sin() - h.sin()) / k,
                    start.y() - ((h + k * ds).cos() - h.cos()) / k,
                );
                (pt, Angle::new_rads(h + k * ds))
            }
            PrimitiveKind::ParamPoly3(poly) => {
                let t = if self.length > 0.0 {
                    (ds / self.length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let (u, v) = poly.eval_local(t);
                let (du, dv) = poly.deriv_local(t);
                let (sin, cos) = h.sin_cos();
                let pt = Pt2D::new(
                    start.x() + u * cos - v * sin,
                    start.y() + u * sin + v * cos,
                );
                (pt, Angle::new_rads(h + dv.atan2(du)))
            }
        }
    }

    /// The point and heading at the end of this primitive.
    pub fn end(&self, start: Pt2D) -> (Pt2D, Angle) {
        self.eval(start, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_eval() {
        let prim = GeometryPrimitive {
            s: 0.0,
            start: Some(Pt2D::new(0.0, 0.0)),
            heading: Angle::degrees(90.0),
            length: 10.0,
            kind: PrimitiveKind::Line,
        };
        let (pt, angle) = prim.end(Pt2D::new(0.0, 0.0));
        assert!(pt.approx_eq(Pt2D::new(0.0, 10.0), 1e-9));
        assert!(angle.approx_eq(Angle::degrees(90.0), 1e-9));
    }

    #[test]
    fn arc_eval_quarter_circle() {
        // Radius 10, turning left from heading 0; a quarter circle ends at
        // (10, 10) facing 90 degrees.
        let prim = GeometryPrimitive {
            s: 0.0,
            start: Some(Pt2D::new(0.0, 0.0)),
            heading: Angle::ZERO,
            length: 10.0 * std::f64::consts::FRAC_PI_2,
            kind: PrimitiveKind::Arc { curvature: 0.1 },
        };
        let (pt, angle) = prim.end(Pt2D::new(0.0, 0.0));
        assert!(pt.approx_eq(Pt2D::new(10.0, 10.0), 1e-6));
        assert!(angle.approx_eq(Angle::degrees(90.0), 1e-6));
    }

    #[test]
    fn parampoly3_eval_straight() {
        // u(t) = 10t, v(t) = 0 is just a 10m straight line.
        let prim = GeometryPrimitive {
            s: 0.0,
            start: Some(Pt2D::new(0.0, 0.0)),
            heading: Angle::ZERO,
            length: 10.0,
            kind: PrimitiveKind::ParamPoly3(ParamPoly3 {
                au: 0.0,
                bu: 10.0,
                cu: 0.0,
                du: 0.0,
                av: 0.0,
                bv: 0.0,
                cv: 0.0,
                dv: 0.0,
                fitting_error: 0.0,
                polynomial_degree: 1,
            }),
        };
        let (pt, angle) = prim.eval(Pt2D::new(0.0, 0.0), 5.0);
        assert!(pt.approx_eq(Pt2D::new(5.0, 0.0), 1e-9));
        assert!(angle.approx_eq(Angle::ZERO, 1e-9));
    }
}
