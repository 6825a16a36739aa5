use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Angle, Line, Pt2D, EPSILON_DIST};

/// An ordered sequence of at least two distinct points, with cached total
/// length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pts: Vec<Pt2D>,
    length: f64,
}

impl PolyLine {
    pub fn new(pts: Vec<Pt2D>) -> Result<PolyLine> {
        let pts = Pt2D::dedupe(pts);
        if pts.len() < 2 {
            anyhow::bail!("PolyLine needs at least 2 distinct points");
        }
        let length = pts.windows(2).map(|pair| pair[0].dist_to(pair[1])).sum();
        Ok(PolyLine { pts, length })
    }

    pub fn must_new(pts: Vec<Pt2D>) -> PolyLine {
        PolyLine::new(pts).unwrap()
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn first_pt(&self) -> Pt2D {
        self.pts[0]
    }

    pub fn last_pt(&self) -> Pt2D {
        *self.pts.last().unwrap()
    }

    /// The heading of the first edge.
    pub fn first_angle(&self) -> Angle {
        self.pts[0].angle_to(self.pts[1])
    }

    /// The heading of the last edge.
    pub fn last_angle(&self) -> Angle {
        self.pts[self.pts.len() - 2].angle_to(self.pts[self.pts.len() - 1])
    }

    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        self.pts.windows(2).map(|pair| Line::must_new(pair[0], pair[1]))
    }

    /// The point and heading at `dist` along, clamped to the ends.
    pub fn dist_along(&self, dist: f64) -> (Pt2D, Angle) {
        if dist <= 0.0 {
            return (self.first_pt(), self.first_angle());
        }
        let mut dist_left = dist;
        for line in self.lines() {
            let len = line.length();
            if dist_left <= len + EPSILON_DIST {
                return (line.dist_along(dist_left.min(len)), line.angle());
            }
            dist_left -= len;
        }
        (self.last_pt(), self.last_angle())
    }

    /// Resamples to exactly `n` points, evenly spaced by arc length. The
    /// endpoints always survive.
    pub fn interpolate_points(&self, n: usize) -> Vec<Pt2D> {
        assert!(n >= 2);
        let mut result = Vec::with_capacity(n);
        for i in 0..n {
            let dist = self.length * (i as f64) / ((n - 1) as f64);
            result.push(self.dist_along(dist).0);
        }
        // Resampling shouldn't drift off the true endpoints.
        result[0] = self.first_pt();
        *result.last_mut().unwrap() = self.last_pt();
        result
    }

    /// The segment (as a `Line`) closest to `pt`.
    pub fn closest_line(&self, pt: Pt2D) -> Line {
        self.lines()
            .min_by(|a, b| {
                a.dist_to_pt_on_segment(pt)
                    .partial_cmp(&b.dist_to_pt_on_segment(pt))
                    .unwrap()
            })
            .unwrap()
    }
}

impl fmt::Display for PolyLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PolyLine({} pts, {}m)", self.pts.len(), self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dist_along_and_length() {
        let pl = PolyLine::must_new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(10.0, 0.0),
            Pt2D::new(10.0, 10.0),
        ]);
        assert!((pl.length() - 20.0).abs() < 1e-9);

        let (pt, angle) = pl.dist_along(5.0);
        assert!(pt.approx_eq(Pt2D::new(5.0, 0.0), 1e-9));
        assert!(angle.approx_eq(Angle::ZERO, 1e-9));

        let (pt, angle) = pl.dist_along(15.0);
        assert!(pt.approx_eq(Pt2D::new(10.0, 5.0), 1e-9));
        assert!(angle.approx_eq(Angle::degrees(90.0), 1e-9));
    }

    #[test]
    fn interpolate_points_even_spacing() {
        let pl = PolyLine::must_new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)]);
        let pts = pl.interpolate_points(5);
        assert_eq!(pts.len(), 5);
        assert!(pts[2].approx_eq(Pt2D::new(5.0, 0.0), 1e-9));
        assert!(pts[4].approx_eq(Pt2D::new(10.0, 0.0), 1e-9));
    }

    #[test]
    fn rejects_degenerate() {
        assert!(PolyLine::new(vec![Pt2D::new(1.0, 1.0), Pt2D::new(1.0, 1.0)]).is_err());
    }
}
