use serde::{Deserialize, Serialize};

use geom::{Angle, Pt2D};

use crate::{round_decimal, GeometryPrimitive, ParamPoly3, PrimitiveKind};

/// Adjoining primitives within a segment must meet within this gap, by
/// construction of the fitting procedure.
pub const CONTINUITY_GAP: f64 = 0.1;

/// An identified road with its fitted reference-line geometry. The node ids
/// are opaque junction identifiers from the source data; a segment without
/// them participates in no connection constraints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadSegment {
    pub id: String,
    pub s_node_id: Option<String>,
    pub e_node_id: Option<String>,
    pub primitives: Vec<GeometryPrimitive>,
    /// Sum of primitive lengths.
    pub length: f64,
}

impl RoadSegment {
    pub fn new(
        id: String,
        s_node_id: Option<String>,
        e_node_id: Option<String>,
        primitives: Vec<GeometryPrimitive>,
    ) -> RoadSegment {
        let length = primitives.iter().map(|p| p.length).sum();
        RoadSegment {
            id,
            s_node_id,
            e_node_id,
            primitives,
            length,
        }
    }

    pub fn start_pt(&self) -> Option<Pt2D> {
        self.primitives.first().and_then(|p| p.start)
    }

    /// The point and heading at arc length `s` from the segment start,
    /// clamped to the ends. `None` for an empty segment or one without an
    /// absolute start.
    pub fn eval(&self, s: f64) -> Option<(Pt2D, Angle)> {
        let mut start = self.start_pt()?;
        let mut s_left = s.max(0.0);
        for (i, prim) in self.primitives.iter().enumerate() {
            // Chain implicitly off the previous primitive's end, which wins
            // over any declared start after the first.
            if i > 0 {
                if let Some(declared) = prim.start {
                    start = declared;
                }
            }
            if s_left <= prim.length || i == self.primitives.len() - 1 {
                return Some(prim.eval(start, s_left.min(prim.length)));
            }
            s_left -= prim.length;
            start = prim.end(start).0;
        }
        None
    }

    pub fn end_state(&self) -> Option<(Pt2D, Angle)> {
        self.eval(self.length)
    }

    /// The largest gap between one primitive's evaluated end and the next
    /// one's start. 0 for segments of fewer than 2 primitives.
    pub fn max_continuity_gap(&self) -> f64 {
        let mut max_gap: f64 = 0.0;
        let Some(mut start) = self.start_pt() else {
            return max_gap;
        };
        for pair in self.primitives.windows(2) {
            let end = pair[0].end(start).0;
            let next_start = pair[1].start.unwrap_or(end);
            max_gap = max_gap.max(end.dist_to(next_start));
            start = next_start;
        }
        max_gap
    }

    /// The emitted form: coordinates rounded to `precision` decimals, and
    /// the absolute start kept only on the first primitive (the OpenDRIVE
    /// schema chains the rest implicitly).
    pub fn emit(&self, precision: usize) -> RoadSegment {
        let mut copy = self.clone();
        for (i, prim) in copy.primitives.iter_mut().enumerate() {
            if i > 0 {
                prim.start = None;
            }
            if let PrimitiveKind::ParamPoly3(poly) = &mut prim.kind {
                *poly = round_poly(poly, precision);
            }
        }
        copy
    }
}

fn round_poly(poly: &ParamPoly3, precision: usize) -> ParamPoly3 {
    ParamPoly3 {
        au: round_decimal(poly.au, precision),
        bu: round_decimal(poly.bu, precision),
        cu: round_decimal(poly.cu, precision),
        du: round_decimal(poly.du, precision),
        av: round_decimal(poly.av, precision),
        bv: round_decimal(poly.bv, precision),
        cv: round_decimal(poly.cv, precision),
        dv: round_decimal(poly.dv, precision),
        fitting_error: poly.fitting_error,
        polynomial_degree: poly.polynomial_degree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_lines() -> RoadSegment {
        RoadSegment::new(
            "r1".to_string(),
            None,
            None,
            vec![
                GeometryPrimitive {
                    s: 0.0,
                    start: Some(Pt2D::new(0.0, 0.0)),
                    heading: Angle::ZERO,
                    length: 10.0,
                    kind: PrimitiveKind::Line,
                },
                GeometryPrimitive {
                    s: 10.0,
                    start: Some(Pt2D::new(10.0, 0.0)),
                    heading: Angle::degrees(90.0),
                    length: 10.0,
                    kind: PrimitiveKind::Line,
                },
            ],
        )
    }

    #[test]
    fn eval_across_primitives() {
        let seg = two_lines();
        assert!((seg.length - 20.0).abs() < 1e-9);
        let (pt, _) = seg.eval(15.0).unwrap();
        assert!(pt.approx_eq(Pt2D::new(10.0, 5.0), 1e-9));
        let (end, angle) = seg.end_state().unwrap();
        assert!(end.approx_eq(Pt2D::new(10.0, 10.0), 1e-9));
        assert!(angle.approx_eq(Angle::degrees(90.0), 1e-9));
    }

    #[test]
    fn continuity_gap() {
        let seg = two_lines();
        assert!(seg.max_continuity_gap() < 1e-9);

        let mut broken = two_lines();
        broken.primitives[1].start = Some(Pt2D::new(10.5, 0.0));
        assert!((broken.max_continuity_gap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn emit_strips_chained_starts() {
        let emitted = two_lines().emit(3);
        assert!(emitted.primitives[0].start.is_some());
        assert!(emitted.primitives[1].start.is_none());
    }
}
