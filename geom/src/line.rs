use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Angle, Pt2D, EPSILON_DIST};

/// A line segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line(Pt2D, Pt2D);

impl Line {
    /// Fails on a segment shorter than `EPSILON_DIST`.
    pub fn new(pt1: Pt2D, pt2: Pt2D) -> Option<Line> {
        if pt1.dist_to(pt2) <= EPSILON_DIST {
            return None;
        }
        Some(Line(pt1, pt2))
    }

    /// Just to be careful with floating point math, this is the caller
    /// asserting the segment isn't degenerate.
    pub fn must_new(pt1: Pt2D, pt2: Pt2D) -> Line {
        Line::new(pt1, pt2).expect("Line from degenerate pts")
    }

    pub fn pt1(&self) -> Pt2D {
        self.0
    }

    pub fn pt2(&self) -> Pt2D {
        self.1
    }

    pub fn length(&self) -> f64 {
        self.pt1().dist_to(self.pt2())
    }

    pub fn angle(&self) -> Angle {
        self.pt1().angle_to(self.pt2())
    }

    pub fn dist_along(&self, dist: f64) -> Pt2D {
        self.pt1().lerp(self.pt2(), dist / self.length())
    }

    pub fn middle(&self) -> Pt2D {
        self.pt1().center(self.pt2())
    }

    /// Perpendicular distance from `pt` to the infinite line through this
    /// segment. With a degenerate chord, callers should fall back to plain
    /// point distance; `Line::new` prevents constructing that case.
    pub fn dist_to_pt(&self, pt: Pt2D) -> f64 {
        let (x0, y0) = (pt.x(), pt.y());
        let (x1, y1) = (self.pt1().x(), self.pt1().y());
        let (x2, y2) = (self.pt2().x(), self.pt2().y());
        ((y2 - y1) * x0 - (x2 - x1) * y0 + x2 * y1 - y2 * x1).abs() / self.length()
    }

    /// Distance from `pt` to the closest point on this segment (not the
    /// infinite line).
    pub fn dist_to_pt_on_segment(&self, pt: Pt2D) -> f64 {
        pt.dist_to(self.project_pt(pt))
    }

    /// The closest point on this segment to `pt`.
    pub fn project_pt(&self, pt: Pt2D) -> Pt2D {
        let dx = self.pt2().x() - self.pt1().x();
        let dy = self.pt2().y() - self.pt1().y();
        let t = ((pt.x() - self.pt1().x()) * dx + (pt.y() - self.pt1().y()) * dy)
            / (dx * dx + dy * dy);
        self.pt1().lerp(self.pt2(), t.clamp(0.0, 1.0))
    }

    /// Intersection of the two infinite lines containing these segments.
    /// `None` when (numerically) parallel.
    pub fn infinite_line_intersection(&self, other: &Line) -> Option<Pt2D> {
        let (x1, y1) = (self.pt1().x(), self.pt1().y());
        let (x2, y2) = (self.pt2().x(), self.pt2().y());
        let (x3, y3) = (other.pt1().x(), other.pt1().y());
        let (x4, y4) = (other.pt2().x(), other.pt2().y());

        let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
        if denom.abs() < 1e-9 {
            return None;
        }
        let num_x = (x1 * y2 - y1 * x2) * (x3 - x4) - (x1 - x2) * (x3 * y4 - y3 * x4);
        let num_y = (x1 * y2 - y1 * x2) * (y3 - y4) - (y1 - y2) * (x3 * y4 - y3 * x4);
        Some(Pt2D::new(num_x / denom, num_y / denom))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Line({} to {})", self.pt1(), self.pt2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perpendicular_distance() {
        let l = Line::must_new(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0));
        assert!((l.dist_to_pt(Pt2D::new(5.0, 3.0)) - 3.0).abs() < 1e-9);
        assert!((l.dist_to_pt(Pt2D::new(20.0, 4.0)) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn intersection() {
        let l1 = Line::must_new(Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0));
        let l2 = Line::must_new(Pt2D::new(5.0, -5.0), Pt2D::new(5.0, 5.0));
        let pt = l1.infinite_line_intersection(&l2).unwrap();
        assert!(pt.approx_eq(Pt2D::new(5.0, 0.0), 1e-9));

        let l3 = Line::must_new(Pt2D::new(0.0, 1.0), Pt2D::new(10.0, 1.0));
        assert!(l1.infinite_line_intersection(&l3).is_none());
    }
}
