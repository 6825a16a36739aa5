//! Samples the distance between a road's two boundary polylines along its
//! fitted reference line, smooths the profile, and fits piecewise cubic
//! width records.

use geom::{Line, PolyLine, Pt2D};
use odr_model::{RoadSegment, WidthPolynomialSegment, WidthSample};

/// Emitted widths never dip under this floor.
const MIN_WIDTH: f64 = 0.1;

/// Interior samples within this band of both neighbors get dropped, unless
/// they're a local extremum.
const SIGNIFICANT_WIDTH_CHANGE: f64 = 0.02;

pub struct WidthProfileCalculator {
    max_segments: usize,
}

impl WidthProfileCalculator {
    pub fn new(max_segments: usize) -> WidthProfileCalculator {
        WidthProfileCalculator {
            max_segments: max_segments.max(1),
        }
    }

    /// The full path: sample, smooth, thin, and fit. Returns the samples
    /// (for auditing) and the emitted polynomial segments.
    pub fn profile(
        &self,
        left: &PolyLine,
        right: &PolyLine,
        reference: &RoadSegment,
    ) -> (Vec<WidthSample>, Vec<WidthPolynomialSegment>) {
        let mut samples = self.compute(left, right, reference);
        smooth_profile(&mut samples);
        let kept = simplify_profile(samples.clone(), self.max_segments);
        let polys = fit_polynomials(&kept);
        (samples, polys)
    }

    /// Measures the boundary-to-boundary width at adaptively chosen arc
    /// lengths along the reference line. Every width is >= 0.
    pub fn compute(
        &self,
        left: &PolyLine,
        right: &PolyLine,
        reference: &RoadSegment,
    ) -> Vec<WidthSample> {
        // Work on boundaries resampled to a common point count, so chord
        // lookups near the ends behave the same on both sides.
        let count = left.points().len().max(right.points().len());
        let left = PolyLine::must_new(left.interpolate_points(count));
        let right = PolyLine::must_new(right.interpolate_points(count));

        let n = sample_count(reference.length);
        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let s = reference.length * (i as f64) / ((n - 1) as f64);
            let Some((ref_pt, heading)) = reference.eval(s) else {
                continue;
            };
            let perp = heading.perpendicular();
            let perp_line =
                Line::must_new(ref_pt.project_away(1.0, perp.opposite()), ref_pt.project_away(1.0, perp));

            let left_chord = left.closest_line(ref_pt);
            let right_chord = right.closest_line(ref_pt);

            let (width, left_pt, right_pt) =
                measure_width(ref_pt, &perp_line, &left_chord, &right_chord);
            samples.push(WidthSample {
                s,
                width,
                left_pt,
                right_pt,
                reference_pt: ref_pt,
                reference_heading: heading,
            });
        }
        samples
    }
}

/// Roughly one sample per 25m on short roads, stretching to one per 50m on
/// long ones, always within [3, 20].
fn sample_count(length: f64) -> usize {
    let raw = if length <= 50.0 {
        length / 25.0
    } else if length <= 200.0 {
        length / 35.0
    } else {
        length / 50.0
    };
    (raw.ceil() as usize).clamp(3, 20)
}

/// Preferred: intersect each boundary chord with the perpendicular through
/// the reference point. Falls back to perpendicular projection when the
/// chords run parallel to the perpendicular or the result is implausibly
/// thin, then to the direct boundary-to-boundary distance.
fn measure_width(
    ref_pt: Pt2D,
    perp_line: &Line,
    left_chord: &Line,
    right_chord: &Line,
) -> (f64, Pt2D, Pt2D) {
    if let (Some(l), Some(r)) = (
        left_chord.infinite_line_intersection(perp_line),
        right_chord.infinite_line_intersection(perp_line),
    ) {
        let width = l.dist_to(r);
        if width >= 0.001 {
            return (width, l, r);
        }
    }

    let perp = perp_line.angle();
    let (px, py) = perp.unit_vector();
    let l = left_chord.project_pt(ref_pt);
    let r = right_chord.project_pt(ref_pt);
    let l_offset = (l.x() - ref_pt.x()) * px + (l.y() - ref_pt.y()) * py;
    let r_offset = (r.x() - ref_pt.x()) * px + (r.y() - ref_pt.y()) * py;
    let width = (l_offset - r_offset).abs();
    if width >= 0.001 {
        return (width, ref_pt.project_away(l_offset.abs(), if l_offset >= 0.0 { perp } else { perp.opposite() }), ref_pt.project_away(r_offset.abs(), if r_offset >= 0.0 { perp } else { perp.opposite() }));
    }

    // Last resort; only trusted when it's a plausible road width.
    let direct = l.dist_to(r);
    if direct > 0.1 {
        (direct, l, r)
    } else {
        (0.0, l, r)
    }
}

/// Catmull-Rom-style pass blending each interior sample towards the value
/// its neighbors' tangents predict, clamped to the local window so the
/// smoothing never overshoots. No-op under 4 samples.
fn smooth_profile(samples: &mut [WidthSample]) {
    if samples.len() < 4 {
        return;
    }
    let widths: Vec<f64> = samples.iter().map(|sample| sample.width).collect();
    let ss: Vec<f64> = samples.iter().map(|sample| sample.s).collect();
    let n = widths.len();
    for i in 1..n - 1 {
        let span = ss[i + 1] - ss[i - 1];
        if span <= 0.0 {
            continue;
        }
        let t = (ss[i] - ss[i - 1]) / span;
        let m0 = if i >= 2 {
            (widths[i] - widths[i - 2]) / 2.0
        } else {
            widths[i] - widths[i - 1]
        };
        let m1 = if i + 2 < n {
            (widths[i + 2] - widths[i]) / 2.0
        } else {
            widths[i + 1] - widths[i]
        };
        let t2 = t * t;
        let t3 = t2 * t;
        let predicted = (2.0 * t3 - 3.0 * t2 + 1.0) * widths[i - 1]
            + (t3 - 2.0 * t2 + t) * m0
            + (-2.0 * t3 + 3.0 * t2) * widths[i + 1]
            + (t3 - t2) * m1;
        let blended = 0.5 * widths[i] + 0.5 * predicted;

        let window_lo = i.saturating_sub(1);
        let window_hi = (i + 2).min(n - 1);
        let window = &widths[window_lo..=window_hi];
        let min = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        samples[i].width = blended.clamp(0.8 * min, 1.2 * max).max(0.0);
    }
}

/// Drops interior samples that barely differ from both neighbors, unless
/// they're a strict local extremum, then thins further (least-significant
/// first) until the interval count fits under `max_segments`.
fn simplify_profile(samples: Vec<WidthSample>, max_segments: usize) -> Vec<WidthSample> {
    if samples.len() <= 2 {
        return samples;
    }
    let mut kept = vec![samples[0].clone()];
    for i in 1..samples.len() - 1 {
        let w = samples[i].width;
        let prev = samples[i - 1].width;
        let next = samples[i + 1].width;
        let extremum = (w > prev && w > next) || (w < prev && w < next);
        if extremum
            || (w - prev).abs() >= SIGNIFICANT_WIDTH_CHANGE
            || (w - next).abs() >= SIGNIFICANT_WIDTH_CHANGE
        {
            kept.push(samples[i].clone());
        }
    }
    kept.push(samples.last().unwrap().clone());

    while kept.len() - 1 > max_segments && kept.len() > 2 {
        // Drop the interior sample that changes the profile least.
        let mut drop_idx = 1;
        let mut least = f64::INFINITY;
        for i in 1..kept.len() - 1 {
            let deviation = (kept[i].width - kept[i - 1].width)
                .abs()
                .min((kept[i].width - kept[i + 1].width).abs());
            if deviation < least {
                least = deviation;
                drop_idx = i;
            }
        }
        kept.remove(drop_idx);
    }
    kept
}

/// Cubic Hermite per interval, with centered derivative estimates inside
/// and one-sided at the ends. Sample widths are floored at `MIN_WIDTH`
/// first, so the fit evaluates to at least that at every sample.
fn fit_polynomials(samples: &[WidthSample]) -> Vec<WidthPolynomialSegment> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let ss: Vec<f64> = samples.iter().map(|sample| sample.s).collect();
    let ws: Vec<f64> = samples
        .iter()
        .map(|sample| sample.width.max(MIN_WIDTH))
        .collect();
    let n = ws.len();

    let mut derivs = vec![0.0; n];
    for i in 0..n {
        derivs[i] = if i == 0 {
            (ws[1] - ws[0]) / (ss[1] - ss[0])
        } else if i == n - 1 {
            (ws[n - 1] - ws[n - 2]) / (ss[n - 1] - ss[n - 2])
        } else {
            (ws[i + 1] - ws[i - 1]) / (ss[i + 1] - ss[i - 1])
        };
    }

    let mut result = Vec::with_capacity(n - 1);
    for i in 0..n - 1 {
        let h = ss[i + 1] - ss[i];
        if h <= 0.0 {
            continue;
        }
        let dw = ws[i + 1] - ws[i];
        let a = ws[i];
        let b = derivs[i];
        let c = (3.0 * dw / h - 2.0 * derivs[i] - derivs[i + 1]) / h;
        let d = (-2.0 * dw / h + derivs[i] + derivs[i + 1]) / (h * h);
        result.push(WidthPolynomialSegment {
            s: ss[i],
            length: h,
            a,
            b,
            c,
            d,
            start_width: ws[i],
            end_width: ws[i + 1],
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::Angle;
    use odr_model::{GeometryPrimitive, PrimitiveKind};

    fn straight_reference(length: f64, y: f64) -> RoadSegment {
        RoadSegment::new(
            "ref".to_string(),
            None,
            None,
            vec![GeometryPrimitive {
                s: 0.0,
                start: Some(Pt2D::new(0.0, y)),
                heading: Angle::ZERO,
                length,
                kind: PrimitiveKind::Line,
            }],
        )
    }

    #[test]
    fn constant_corridor() {
        let left = PolyLine::must_new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)]);
        let right = PolyLine::must_new(vec![Pt2D::new(0.0, 3.0), Pt2D::new(10.0, 3.0)]);
        let reference = straight_reference(10.0, 1.5);

        let calc = WidthProfileCalculator::new(100);
        let (samples, polys) = calc.profile(&left, &right, &reference);
        assert!(samples.len() >= 3);
        for sample in &samples {
            assert!((sample.width - 3.0).abs() < 0.01, "width {}", sample.width);
        }
        for poly in &polys {
            for ds in [0.0, poly.length / 2.0, poly.length] {
                assert!((poly.eval(ds) - 3.0).abs() < 0.01);
            }
        }
    }

    #[test]
    fn widening_corridor() {
        let left = PolyLine::must_new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(100.0, 0.0)]);
        let right = PolyLine::must_new(vec![Pt2D::new(0.0, 3.0), Pt2D::new(100.0, 5.0)]);
        let reference = straight_reference(100.0, 1.5);

        let calc = WidthProfileCalculator::new(100);
        let (samples, polys) = calc.profile(&left, &right, &reference);
        assert!(samples.windows(2).all(|pair| pair[1].width >= pair[0].width - 0.05));
        assert!(!polys.is_empty());
        let first = polys.first().unwrap();
        let last = polys.last().unwrap();
        assert!((first.eval(0.0) - 3.0).abs() < 0.1);
        assert!((last.eval(last.length) - 5.0).abs() < 0.1);
    }

    #[test]
    fn widths_never_negative() {
        // Boundaries crossing through the reference line still produce
        // non-negative widths.
        let left = PolyLine::must_new(vec![Pt2D::new(0.0, 0.1), Pt2D::new(30.0, -0.1)]);
        let right = PolyLine::must_new(vec![Pt2D::new(0.0, 0.2), Pt2D::new(30.0, 0.3)]);
        let reference = straight_reference(30.0, 0.0);

        let calc = WidthProfileCalculator::new(100);
        let samples = calc.compute(&left, &right, &reference);
        for sample in &samples {
            assert!(sample.width >= 0.0);
        }
    }

    #[test]
    fn polynomial_floor() {
        let left = PolyLine::must_new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(10.0, 0.0)]);
        let right = PolyLine::must_new(vec![Pt2D::new(0.0, 0.01), Pt2D::new(10.0, 0.01)]);
        let reference = straight_reference(10.0, 0.0);

        let calc = WidthProfileCalculator::new(100);
        let (_, polys) = calc.profile(&left, &right, &reference);
        for poly in &polys {
            assert!(poly.eval(0.0) >= MIN_WIDTH);
            assert!(poly.eval(poly.length) >= MIN_WIDTH);
        }
    }

    #[test]
    fn sample_counts() {
        assert_eq!(sample_count(10.0), 3);
        assert_eq!(sample_count(120.0), 4);
        assert_eq!(sample_count(1000.0), 20);
    }
}
