//! Turns a road's point sequence into an ordered list of geometry
//! primitives, honoring heading constraints at network nodes. Failures
//! always degrade to simpler primitives; a road never hard-fails here.

use geom::{Angle, Pt2D};
use odr_model::{GeometryPrimitive, ParamPoly3, PrimitiveKind};

use crate::constraints;
use crate::diagnostics::{Diagnostics, FitIssue};
use crate::options::{CurveFittingMode, Options};
use crate::simplify;

/// Above this many points, a parampoly3 fit splits the input at curvature
/// changes and fits each piece, chaining end constraints.
const SEGMENTATION_THRESHOLD: usize = 20;
const MIN_SEGMENT_POINTS: usize = 5;
const MAX_SEGMENT_POINTS: usize = 15;

/// Fitted arc radii outside this range degrade to lines.
const MIN_ARC_RADIUS: f64 = 1.0;
const MAX_ARC_RADIUS: f64 = 10_000.0;

/// Consecutive edges turning at least this much count as a curved run.
const ARC_TURN_THRESHOLD_DEGS: f64 = 10.0;

/// Headings a segment must match at its ends, if the connection graph
/// resolved one there.
#[derive(Clone, Copy, Debug, Default)]
pub struct FitConstraints {
    pub start_heading: Option<Angle>,
    pub end_heading: Option<Angle>,
}

pub struct CurveFitter<'a> {
    opts: &'a Options,
}

impl<'a> CurveFitter<'a> {
    pub fn new(opts: &'a Options) -> CurveFitter<'a> {
        CurveFitter { opts }
    }

    /// Fits `points` in the configured mode. Any failure is recorded in
    /// `diagnostics` and answered with a simpler fit, ultimately a plain
    /// line chain. Returns an empty list only for fewer than 2 distinct
    /// points.
    pub fn fit(
        &self,
        road_id: &str,
        points: &[Pt2D],
        constraints: FitConstraints,
        diagnostics: &mut Diagnostics,
    ) -> Vec<GeometryPrimitive> {
        let points = Pt2D::dedupe(points.to_vec());
        if points.len() < 2 {
            diagnostics.record(
                road_id,
                FitIssue::InsufficientPoints {
                    needed: 2,
                    got: points.len(),
                },
                "no geometry produced",
            );
            return Vec::new();
        }

        match self.opts.curve_fitting_mode {
            CurveFittingMode::Polyline => self.fit_polyline(&points),
            CurveFittingMode::Arc => self.fit_arcs(road_id, &points, diagnostics),
            CurveFittingMode::Spline => self.fit_spline(&points),
            CurveFittingMode::Polynomial | CurveFittingMode::ParamPoly3 => {
                match self.fit_parampoly3(road_id, &points, constraints, diagnostics) {
                    Ok(prims) => prims,
                    Err(issue) => {
                        diagnostics.record(road_id, issue, "fell back to line segments");
                        self.fit_polyline(&points)
                    }
                }
            }
        }
    }

    /// Pure line-segment chain over the simplified points, re-simplified
    /// with a doubled tolerance until it fits under the per-road cap.
    fn fit_polyline(&self, points: &[Pt2D]) -> Vec<GeometryPrimitive> {
        let mut tolerance = self.opts.effective_tolerance();
        let mut simplified = simplify::simplify(points, tolerance);
        while simplified.len() - 1 > self.opts.max_segments_per_road && simplified.len() > 2 {
            tolerance *= 2.0;
            simplified = simplify::simplify(points, tolerance);
        }
        line_chain(&simplified)
    }

    /// Constant-curvature runs become arcs; everything else becomes lines.
    fn fit_arcs(
        &self,
        road_id: &str,
        points: &[Pt2D],
        diagnostics: &mut Diagnostics,
    ) -> Vec<GeometryPrimitive> {
        let mut prims: Vec<GeometryPrimitive> = Vec::new();
        let mut s = 0.0;
        let mut i = 0;
        while i < points.len() - 1 {
            let curve_end = detect_curve_run(points, i);
            if curve_end > i + 1 {
                match fit_single_arc(&points[i..=curve_end], s) {
                    Some(arc) => {
                        s += arc.length;
                        prims.push(arc);
                    }
                    None => {
                        diagnostics.record(
                            road_id,
                            FitIssue::DegenerateGeometry(format!(
                                "arc run at point {} is collinear or out of radius range",
                                i
                            )),
                            "kept line segments for the run",
                        );
                        for pair in points[i..=curve_end].windows(2) {
                            let line = line_primitive(s, pair[0], pair[1]);
                            s += line.length;
                            prims.push(line);
                        }
                    }
                }
                i = curve_end;
            } else {
                let line = line_primitive(s, points[i], points[i + 1]);
                s += line.length;
                prims.push(line);
                i += 1;
            }
        }
        prims
    }

    /// Catmull-Rom smoothing through the simplified points, re-tessellated
    /// into adaptive line segments.
    fn fit_spline(&self, points: &[Pt2D]) -> Vec<GeometryPrimitive> {
        let simplified = simplify::simplify(points, self.opts.effective_tolerance());
        if simplified.len() < 3 {
            return line_chain(&simplified);
        }
        let dense = catmull_rom_tessellate(&simplified, self.opts.curve_smoothness);
        // Thin the tessellation back out; the splined shape survives well
        // within half the base tolerance.
        let thinned = simplify::adaptive_simplify(&dense, self.opts.tolerance * 0.5);
        line_chain(&thinned)
    }

    /// The primary mode: one parametric cubic per (sub-)segment.
    fn fit_parampoly3(
        &self,
        road_id: &str,
        points: &[Pt2D],
        constraints: FitConstraints,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<GeometryPrimitive>, FitIssue> {
        if points.len() < 3 {
            return Err(FitIssue::InsufficientPoints {
                needed: 3,
                got: points.len(),
            });
        }
        if points.len() <= SEGMENTATION_THRESHOLD {
            let prim = self.fit_single_poly(
                road_id,
                points,
                constraints.start_heading,
                constraints.end_heading,
                diagnostics,
            )?;
            return Ok(vec![prim]);
        }

        // Long input: split at curvature changes and fit each piece. The
        // computed end state of each piece becomes the start constraint of
        // the next, which is what keeps tangents continuous across splits
        // without a global solve. Node-unified headings only apply at the
        // true segment ends.
        let ranges = segment_ranges(points);
        let mut prims = Vec::new();
        let mut s = 0.0;
        let mut carried_heading = constraints.start_heading;
        for (idx, (a, b)) in ranges.iter().cloned().enumerate() {
            let end_heading = if idx == ranges.len() - 1 {
                constraints.end_heading
            } else {
                None
            };
            let mut prim =
                self.fit_single_poly(road_id, &points[a..=b], carried_heading, end_heading, diagnostics)?;
            prim.s = s;
            s += prim.length;
            let (_, end_angle) = prim.end(prim.start.unwrap());
            carried_heading = Some(end_angle);
            prims.push(prim);
        }
        Ok(prims)
    }

    /// Fits one ParamPoly3 primitive to `points`, in a local frame aligned
    /// with the start heading. With an end heading present, the boundary
    /// solver produces an exact fit; otherwise a degree-adaptive weighted
    /// least squares fit, corrected to land exactly on the endpoint.
    fn fit_single_poly(
        &self,
        road_id: &str,
        points: &[Pt2D],
        start_heading: Option<Angle>,
        end_heading: Option<Angle>,
        diagnostics: &mut Diagnostics,
    ) -> Result<GeometryPrimitive, FitIssue> {
        let n = points.len();
        if n < 3 {
            return Err(FitIssue::InsufficientPoints { needed: 3, got: n });
        }

        let p0 = points[0];
        let h0 = start_heading.unwrap_or_else(|| p0.angle_to(points[1]));
        let (sin, cos) = h0.radians().sin_cos();
        let mut us = Vec::with_capacity(n);
        let mut vs = Vec::with_capacity(n);
        for pt in points {
            let dx = pt.x() - p0.x();
            let dy = pt.y() - p0.y();
            us.push(cos * dx + sin * dy);
            vs.push(-sin * dx + cos * dy);
        }

        // Arc-length parametrization, so fitting doesn't depend on point
        // spacing.
        let mut cumulative = vec![0.0];
        for pair in points.windows(2) {
            cumulative.push(cumulative.last().unwrap() + pair[0].dist_to(pair[1]));
        }
        let total = *cumulative.last().unwrap();
        if total < geom::EPSILON_DIST {
            return Err(FitIssue::DegenerateGeometry(
                "zero-length point run".to_string(),
            ));
        }
        let ts: Vec<f64> = cumulative.iter().map(|c| c / total).collect();

        let end_u = *us.last().unwrap();
        let end_v = *vs.last().unwrap();
        let max_degree = self.opts.polynomial_degree.min(3).min(n - 1);

        let mut poly = if let Some(end) = end_heading {
            let local_end = end - h0;
            let tangent = local_end.unit_vector();
            if max_degree >= 3 {
                constraints::solve_cubic(end_u, end_v, tangent, total)
            } else {
                let (poly, residual) = constraints::solve_quadratic(end_u, end_v, tangent, total);
                if residual > 1e-3 {
                    diagnostics.record(
                        road_id,
                        FitIssue::ConstraintConflict {
                            tangent_residual: residual,
                        },
                        "kept quadratic; position honored, tangent approximate",
                    );
                }
                poly
            }
        } else {
            let (degree, u_coeffs, v_coeffs) =
                select_optimal_degree(&ts, &us, &vs, &point_weights(n), max_degree)
                    .ok_or(FitIssue::SingularSystem)?;
            let mut poly = ParamPoly3 {
                au: 0.0,
                bu: u_coeffs[0],
                cu: u_coeffs[1],
                du: u_coeffs[2],
                av: 0.0,
                bv: v_coeffs[0],
                cv: v_coeffs[1],
                dv: v_coeffs[2],
                fitting_error: 0.0,
                polynomial_degree: degree,
            };
            constraints::rescale_to_endpoint(&mut poly, end_u, end_v);
            poly
        };

        poly.fitting_error = fitting_error(&poly, &ts, &us, &vs);
        Ok(GeometryPrimitive {
            s: 0.0,
            start: Some(p0),
            heading: h0,
            length: total,
            kind: PrimitiveKind::ParamPoly3(poly),
        })
    }
}

/// Endpoints count double and their neighbors 1.5x, so least squares favors
/// agreement where segments join.
fn point_weights(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            if i == 0 || i == n - 1 {
                2.0
            } else if i == 1 || i == n - 2 {
                1.5
            } else {
                1.0
            }
        })
        .collect()
}

/// Tries degrees `1..=max_degree` and keeps the one minimizing
/// `rmse + 0.01 * degree`. Returns `(degree, [bu, cu, du], [bv, cv, dv])`,
/// zero-padded above the chosen degree. `None` if every system was
/// singular.
pub(crate) fn select_optimal_degree(
    ts: &[f64],
    us: &[f64],
    vs: &[f64],
    weights: &[f64],
    max_degree: usize,
) -> Option<(usize, [f64; 3], [f64; 3])> {
    let mut best: Option<(f64, usize, [f64; 3], [f64; 3])> = None;
    for degree in 1..=max_degree.max(1) {
        // u uses powers 1..=degree. v skips the linear term so the start
        // tangent stays exactly on the local u-axis.
        let Some(u_fit) = weighted_poly_fit(ts, us, weights, 1, degree) else {
            continue;
        };
        let v_fit = if degree >= 2 {
            match weighted_poly_fit(ts, vs, weights, 2, degree) {
                Some(fit) => fit,
                None => continue,
            }
        } else {
            Vec::new()
        };

        let u_coeffs = pad_coeffs(&u_fit, 1);
        let v_coeffs = pad_coeffs(&v_fit, 2);
        let mut sq_err = 0.0;
        for i in 0..ts.len() {
            let t = ts[i];
            let u = u_coeffs[0] * t + u_coeffs[1] * t * t + u_coeffs[2] * t * t * t;
            let v = v_coeffs[0] * t + v_coeffs[1] * t * t + v_coeffs[2] * t * t * t;
            sq_err += (us[i] - u).powi(2) + (vs[i] - v).powi(2);
        }
        let rmse = (sq_err / ts.len() as f64).sqrt();
        let score = rmse + 0.01 * degree as f64;
        if best.map(|(s, _, _, _)| score < s).unwrap_or(true) {
            best = Some((score, degree, u_coeffs, v_coeffs));
        }
    }
    best.map(|(_, degree, u, v)| (degree, u, v))
}

/// Least squares for `y(t) = sum(coeff_k * t^k)` over `k in
/// min_power..=degree`, via the weighted normal equations.
fn weighted_poly_fit(
    ts: &[f64],
    ys: &[f64],
    weights: &[f64],
    min_power: usize,
    degree: usize,
) -> Option<Vec<f64>> {
    let powers: Vec<usize> = (min_power..=degree).collect();
    let k = powers.len();
    let mut matrix = vec![vec![0.0; k]; k];
    let mut rhs = vec![0.0; k];
    for i in 0..ts.len() {
        let w = weights[i];
        for (r, pr) in powers.iter().enumerate() {
            let tr = ts[i].powi(*pr as i32);
            rhs[r] += w * tr * ys[i];
            for (c, pc) in powers.iter().enumerate() {
                matrix[r][c] += w * tr * ts[i].powi(*pc as i32);
            }
        }
    }
    solve_linear(matrix, rhs)
}

/// Gaussian elimination with partial pivoting. `None` on a (numerically)
/// singular matrix.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|r1, r2| {
            a[*r1][col].abs().partial_cmp(&a[*r2][col].abs()).unwrap()
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for c in col..n {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for c in row + 1..n {
            sum -= a[row][c] * x[c];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

fn pad_coeffs(fit: &[f64], min_power: usize) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, c) in fit.iter().enumerate() {
        let power = min_power + i;
        if (1..=3).contains(&power) {
            out[power - 1] = *c;
        }
    }
    out
}

/// Max/RMS blend of the deviation between the fitted curve and the input
/// points, in the local frame.
fn fitting_error(poly: &ParamPoly3, ts: &[f64], us: &[f64], vs: &[f64]) -> f64 {
    let mut max_dev: f64 = 0.0;
    let mut sq_sum = 0.0;
    for i in 0..ts.len() {
        let (u, v) = poly.eval_local(ts[i]);
        let dev = ((us[i] - u).powi(2) + (vs[i] - v).powi(2)).sqrt();
        max_dev = max_dev.max(dev);
        sq_sum += dev * dev;
    }
    let rmse = (sq_sum / ts.len() as f64).sqrt();
    0.5 * max_dev + 0.5 * rmse
}

/// Split indices for a long input: curvature-change points from a 5-point
/// estimator with a 1.5-stddev threshold, with runs bounded to
/// `[MIN_SEGMENT_POINTS, MAX_SEGMENT_POINTS]`. Returns inclusive
/// `(start, end)` index ranges that share their boundary points.
fn segment_ranges(points: &[Pt2D]) -> Vec<(usize, usize)> {
    let curvatures = curvature_5pt(points);
    let n = curvatures.len();
    let mean = curvatures.iter().sum::<f64>() / n as f64;
    let stddev =
        (curvatures.iter().map(|k| (k - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
    let threshold = 1.5 * stddev;

    let mut splits = Vec::new();
    let mut last = 0;
    for i in 1..points.len() - 1 {
        let run = i - last;
        let curvature_change = (curvatures[i] - curvatures[i - 1]).abs() > threshold
            && threshold > 0.0;
        if run + 1 >= MAX_SEGMENT_POINTS || (curvature_change && run + 1 >= MIN_SEGMENT_POINTS) {
            // Don't leave a runt tail behind this split.
            if points.len() - i >= MIN_SEGMENT_POINTS {
                splits.push(i);
                last = i;
            }
        }
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    for split in splits {
        ranges.push((start, split));
        start = split;
    }
    ranges.push((start, points.len() - 1));
    ranges
}

/// Turn angle over a +/-2 point window, divided by the window's average
/// chord length. Endpoints get 0.
fn curvature_5pt(points: &[Pt2D]) -> Vec<f64> {
    let n = points.len();
    let mut result = vec![0.0; n];
    for i in 2..n.saturating_sub(2) {
        let back = points[i - 2].angle_to(points[i]);
        let forward = points[i].angle_to(points[i + 2]);
        let turn = forward.shortest_rotation_towards(back).abs();
        let span =
            0.5 * (points[i - 2].dist_to(points[i]) + points[i].dist_to(points[i + 2]));
        if span > geom::EPSILON_DIST {
            result[i] = turn / span;
        }
    }
    result
}

/// Scans forward from edge `start_idx` while each interior turn stays over
/// the threshold; returns the index ending the curved run. `start_idx + 1`
/// means no run (the first turn was already too shallow).
fn detect_curve_run(points: &[Pt2D], start_idx: usize) -> usize {
    let threshold = ARC_TURN_THRESHOLD_DEGS.to_radians();
    let mut end = start_idx + 1;
    while end + 1 < points.len() {
        let angle1 = points[end - 1].angle_to(points[end]);
        let angle2 = points[end].angle_to(points[end + 1]);
        if angle2.shortest_rotation_towards(angle1).abs() < threshold {
            break;
        }
        end += 1;
    }
    end
}

/// 3-point circle fit over a curved run. `None` when collinear or the
/// radius is implausible for a road.
fn fit_single_arc(points: &[Pt2D], s: f64) -> Option<GeometryPrimitive> {
    if points.len() < 3 {
        return None;
    }
    let (center, radius) =
        circle_through(points[0], points[points.len() / 2], *points.last().unwrap())?;
    if !(MIN_ARC_RADIUS..=MAX_ARC_RADIUS).contains(&radius) {
        return None;
    }

    let start = points[0];
    let end = *points.last().unwrap();
    let sweep = center
        .angle_to(end)
        .shortest_rotation_towards(center.angle_to(start));
    if sweep.abs() < 1e-9 {
        return None;
    }
    // The heading is the circle's tangent at the start point, perpendicular
    // to the radius in the direction of travel. The first chord direction is
    // off by half the per-edge turn, which rotates the whole evaluated arc.
    let radial = center.angle_to(start);
    let heading = if sweep > 0.0 {
        radial.perpendicular()
    } else {
        radial.perpendicular().opposite()
    };
    Some(GeometryPrimitive {
        s,
        start: Some(start),
        heading,
        length: sweep.abs() * radius,
        kind: PrimitiveKind::Arc {
            curvature: sweep.signum() / radius,
        },
    })
}

/// The circle through three points. `None` when they're (nearly) collinear.
fn circle_through(p1: Pt2D, p2: Pt2D, p3: Pt2D) -> Option<(Pt2D, f64)> {
    let (x1, y1) = (p1.x(), p1.y());
    let (x2, y2) = (p2.x(), p2.y());
    let (x3, y3) = (p3.x(), p3.y());
    let d = 2.0 * (x1 * (y2 - y3) + x2 * (y3 - y1) + x3 * (y1 - y2));
    if d.abs() < 1e-10 {
        return None;
    }
    let sq1 = x1 * x1 + y1 * y1;
    let sq2 = x2 * x2 + y2 * y2;
    let sq3 = x3 * x3 + y3 * y3;
    let ux = (sq1 * (y2 - y3) + sq2 * (y3 - y1) + sq3 * (y1 - y2)) / d;
    let uy = (sq1 * (x3 - x2) + sq2 * (x1 - x3) + sq3 * (x2 - x1)) / d;
    let center = Pt2D::new(ux, uy);
    Some((center, center.dist_to(p1)))
}

/// Catmull-Rom through `pts`, sampled at ~2m spacing. `smoothness` scales
/// the tangents; 0 degenerates to the input chain.
fn catmull_rom_tessellate(pts: &[Pt2D], smoothness: f64) -> Vec<Pt2D> {
    let mut dense = vec![pts[0]];
    for i in 0..pts.len() - 1 {
        let p0 = pts[if i == 0 { 0 } else { i - 1 }];
        let p1 = pts[i];
        let p2 = pts[i + 1];
        let p3 = pts[(i + 2).min(pts.len() - 1)];
        let m1 = (
            smoothness * 0.5 * (p2.x() - p0.x()),
            smoothness * 0.5 * (p2.y() - p0.y()),
        );
        let m2 = (
            smoothness * 0.5 * (p3.x() - p1.x()),
            smoothness * 0.5 * (p3.y() - p1.y()),
        );
        let steps = (p1.dist_to(p2) / 2.0).ceil().max(1.0) as usize;
        for step in 1..=steps {
            let t = step as f64 / steps as f64;
            let t2 = t * t;
            let t3 = t2 * t;
            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;
            dense.push(Pt2D::new(
                h00 * p1.x() + h10 * m1.0 + h01 * p2.x() + h11 * m2.0,
                h00 * p1.y() + h10 * m1.1 + h01 * p2.y() + h11 * m2.1,
            ));
        }
    }
    Pt2D::dedupe(dense)
}

fn line_primitive(s: f64, start: Pt2D, end: Pt2D) -> GeometryPrimitive {
    GeometryPrimitive {
        s,
        start: Some(start),
        heading: start.angle_to(end),
        length: start.dist_to(end),
        kind: PrimitiveKind::Line,
    }
}

fn line_chain(pts: &[Pt2D]) -> Vec<GeometryPrimitive> {
    let mut prims = Vec::new();
    let mut s = 0.0;
    for pair in pts.windows(2) {
        let line = line_primitive(s, pair[0], pair[1]);
        s += line.length;
        prims.push(line);
    }
    prims
}
