//! Boundary-constrained polynomial solving for ParamPoly3 primitives.
//!
//! Everything here works in the primitive's local frame: the origin is the
//! start point and the u-axis is the start heading, so the start tangent is
//! always the unit vector (1, 0) and `au = av = 0`.

use odr_model::ParamPoly3;

/// A cubic has 8 coefficients and there are exactly 8 boundary values (start
/// and end position plus tangent, per axis), so both endpoint constraints can
/// be honored exactly. The start constraints pin `au = av = 0`, `bu = L`,
/// `bv = 0`; the rest comes from one 2x2 system per axis:
///
/// ```text
/// [1 1][c]   [end      - b]
/// [2 3][d] = [end_tan*L - b]
/// ```
///
/// with determinant 1*3 - 1*2 = 1, so a unique solution always exists.
pub fn solve_cubic(end_u: f64, end_v: f64, end_tangent: (f64, f64), arc_length: f64) -> ParamPoly3 {
    let bu = arc_length;
    let bv = 0.0;
    let (cu, du) = solve_axis(end_u, end_tangent.0 * arc_length, bu);
    let (cv, dv) = solve_axis(end_v, end_tangent.1 * arc_length, bv);
    ParamPoly3 {
        au: 0.0,
        bu,
        cu,
        du,
        av: 0.0,
        bv,
        cv,
        dv,
        fitting_error: 0.0,
        polynomial_degree: 3,
    }
}

// Cramer's rule on the 2x2 system; the determinant is exactly 1.
fn solve_axis(end: f64, end_deriv: f64, b: f64) -> (f64, f64) {
    let rhs1 = end - b;
    let rhs2 = end_deriv - b;
    let c = 3.0 * rhs1 - rhs2;
    let d = rhs2 - 2.0 * rhs1;
    (c, d)
}

/// A quadratic only has 6 coefficients against 8 boundary values, so it's
/// over-constrained: position is honored exactly, and the leftover tangent
/// error at t=1 is returned so the caller can surface it as a diagnostic.
/// This is intentional graceful degradation, not an automatic upgrade to
/// degree 3.
pub fn solve_quadratic(
    end_u: f64,
    end_v: f64,
    end_tangent: (f64, f64),
    arc_length: f64,
) -> (ParamPoly3, f64) {
    let bu = arc_length;
    let bv = 0.0;
    let cu = end_u - bu;
    let cv = end_v - bv;
    let poly = ParamPoly3 {
        au: 0.0,
        bu,
        cu,
        du: 0.0,
        av: 0.0,
        bv,
        cv,
        dv: 0.0,
        fitting_error: 0.0,
        polynomial_degree: 2,
    };
    let (du1, dv1) = poly.deriv_local(1.0);
    let residual = ((du1 - end_tangent.0 * arc_length).powi(2)
        + (dv1 - end_tangent.1 * arc_length).powi(2))
    .sqrt();
    (poly, residual)
}

/// When only the endpoint position is known (no external heading), rescale
/// the already-fitted coefficients so the curve lands exactly on the
/// endpoint while keeping its shape. An approximation, not an exact-tangent
/// solve.
pub fn rescale_to_endpoint(poly: &mut ParamPoly3, end_u: f64, end_v: f64) {
    rescale_axis(&mut poly.bu, &mut poly.cu, &mut poly.du, end_u);
    rescale_axis(&mut poly.bv, &mut poly.cv, &mut poly.dv, end_v);
}

fn rescale_axis(b: &mut f64, c: &mut f64, d: &mut f64, end: f64) {
    let sum = *b + *c + *d;
    if sum.abs() < 1e-9 {
        // Degenerate: fall back to a straight chord in this axis.
        *b = end;
        *c = 0.0;
        *d = 0.0;
    } else {
        let ratio = end / sum;
        *b *= ratio;
        *c *= ratio;
        *d *= ratio;
    }
}
