//! Polyline simplification: classic Douglas-Peucker, plus a
//! curvature-adaptive variant that keeps detail on curves while aggressively
//! thinning straight runs.

use geom::{Line, Pt2D};

/// Recursive Douglas-Peucker. Points whose perpendicular deviation from the
/// chord between the endpoints stays under `tolerance` are dropped.
/// Sequences of 2 or fewer points come back unchanged.
pub fn simplify(points: &[Pt2D], tolerance: f64) -> Vec<Pt2D> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let first = points[0];
    let last = *points.last().unwrap();
    let mut max_dist = 0.0;
    let mut max_idx = 0;
    for (i, pt) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = chord_dist(first, last, *pt);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist < tolerance {
        return vec![first, last];
    }

    // Recurse on both halves, sharing the split point once.
    let mut left = simplify(&points[..=max_idx], tolerance);
    let right = simplify(&points[max_idx..], tolerance);
    left.pop();
    left.extend(right);
    left
}

/// Distance from `pt` to the infinite line through the chord, or plain point
/// distance when the chord is degenerate.
fn chord_dist(chord_start: Pt2D, chord_end: Pt2D, pt: Pt2D) -> f64 {
    match Line::new(chord_start, chord_end) {
        Some(line) => line.dist_to_pt(pt),
        None => pt.dist_to(chord_start),
    }
}

/// Curvature-adaptive simplification: the effective tolerance shrinks
/// (~0.7x) where the polyline turns sharply and grows (~4x) on straight
/// runs. The deviation test is against the running simplified tail, not the
/// original neighbors.
pub fn adaptive_simplify(points: &[Pt2D], base_tolerance: f64) -> Vec<Pt2D> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let curvatures = local_curvatures(points);
    let mean = curvatures.iter().sum::<f64>() / (curvatures.len() as f64);

    let mut result = vec![points[0]];
    for i in 1..points.len() - 1 {
        let tolerance = if curvatures[i] > mean {
            base_tolerance * 0.7
        } else {
            base_tolerance * 4.0
        };
        let anchor = *result.last().unwrap();
        if chord_dist(anchor, points[i + 1], points[i]) >= tolerance {
            result.push(points[i]);
        }
    }
    result.push(*points.last().unwrap());
    result
}

/// Turn angle divided by average adjacent edge length, per point. Endpoints
/// get 0.
pub fn local_curvatures(points: &[Pt2D]) -> Vec<f64> {
    let mut result = vec![0.0; points.len()];
    for i in 1..points.len().saturating_sub(1) {
        let in_angle = points[i - 1].angle_to(points[i]);
        let out_angle = points[i].angle_to(points[i + 1]);
        let turn = out_angle.shortest_rotation_towards(in_angle).abs();
        let avg_edge =
            0.5 * (points[i - 1].dist_to(points[i]) + points[i].dist_to(points[i + 1]));
        if avg_edge > geom::EPSILON_DIST {
            result[i] = turn / avg_edge;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Pt2D> {
        raw.iter().map(|(x, y)| Pt2D::new(*x, *y)).collect()
    }

    #[test]
    fn collapses_collinear_runs() {
        let input = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (10.0, 0.0)]);
        let out = simplify(&input, 0.01);
        assert_eq!(out, pts(&[(0.0, 0.0), (10.0, 0.0)]));
    }

    #[test]
    fn keeps_corners() {
        let input = pts(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (10.0, 5.0), (10.0, 10.0)]);
        let out = simplify(&input, 0.01);
        assert_eq!(out, pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]));
    }

    #[test]
    fn idempotent() {
        let input = pts(&[
            (0.0, 0.0),
            (1.0, 0.2),
            (2.0, -0.1),
            (5.0, 3.0),
            (6.0, 3.1),
            (10.0, 0.0),
        ]);
        for tolerance in [0.05, 0.5, 2.0] {
            let once = simplify(&input, tolerance);
            let twice = simplify(&once, tolerance);
            assert_eq!(once, twice, "not idempotent at tolerance {}", tolerance);
        }
    }

    #[test]
    fn short_inputs_unchanged() {
        let input = pts(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(simplify(&input, 10.0), input);
        assert_eq!(adaptive_simplify(&input, 10.0), input);
    }

    #[test]
    fn adaptive_keeps_curve_detail() {
        // A straight run into a tight quarter turn. The straight interior
        // points should thin out; the turn should keep its shape.
        let mut input = Vec::new();
        for i in 0..10 {
            input.push(Pt2D::new(i as f64, 0.0));
        }
        for i in 1..=8 {
            let theta = std::f64::consts::FRAC_PI_2 * (i as f64) / 8.0;
            input.push(Pt2D::new(9.0 + 3.0 * theta.sin(), 3.0 - 3.0 * theta.cos()));
        }
        let out = adaptive_simplify(&input, 0.1);
        assert!(out.len() < input.len());
        // Every surviving point is an input point, endpoints included.
        assert_eq!(out[0], input[0]);
        assert_eq!(*out.last().unwrap(), *input.last().unwrap());
        // The turn region keeps more of its points than the straight run.
        let kept_straight = out.iter().filter(|pt| pt.y() == 0.0).count();
        assert!(kept_straight <= 3, "straight run kept {}", kept_straight);
    }
}
