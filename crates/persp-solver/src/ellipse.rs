//! Five-point conic fit.
//!
//! Five control points on a tilted circle determine a general conic
//! `a x² + 2b xy + c y² + 2d x + 2f y + g = 0`. The coefficient vector lies
//! in the null space of the 5×6 design matrix and is recovered as the right
//! singular vector of the smallest singular value. The closed-form
//! centre/axes/rotation formulas then place the vanishing point (the vertex
//! of the projected circle) on the minor axis, at a distance set by the
//! focal length and the axis ratio.

use nalgebra::DMatrix;
use thiserror::Error;

use persp_core::{Pt2, Real};

use std::f64::consts::{FRAC_PI_2, PI};

/// Singular values below this rank threshold mark an under-determined fit.
const RANK_EPS: Real = 1e-15;

#[derive(Debug, Error)]
pub enum EllipseError {
    #[error("need exactly 5 points for a conic fit, got {0}")]
    WrongPointCount(usize),
    #[error("svd failed")]
    SvdFailed,
    #[error("conic fit is rank-deficient (coincident or collinear points)")]
    Degenerate,
    #[error("the five points do not lie on an ellipse")]
    NotAnEllipse,
}

/// Vertex of the circle projected as an ellipse, plus the ellipse centre.
///
/// The vertex coordinates follow the sign convention of the angle solver:
/// the default (clockwise point ordering) puts the vertex above the centre,
/// towards negative y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseVertex {
    pub vertex: Pt2,
    pub center: Pt2,
}

/// Fit a conic through five points and derive the vanishing point of the
/// circle it projects, for the given normalized focal length.
///
/// The ordering of the first two points about the centre selects the vertex
/// polarity: clockwise puts it above the ellipse, counter-clockwise below.
pub fn ellipse_vertex(points: &[Pt2], f_normalized: Real) -> Result<EllipseVertex, EllipseError> {
    if points.len() != 5 {
        return Err(EllipseError::WrongPointCount(points.len()));
    }

    // Design matrix of [x², xy, y², x, y, 1] rows, padded with a zero row to
    // make it square so the full right null space is available from the SVD.
    let mut m = DMatrix::<Real>::zeros(6, 6);
    for (i, p) in points.iter().enumerate() {
        m[(i, 0)] = p.x * p.x;
        m[(i, 1)] = p.x * p.y;
        m[(i, 2)] = p.y * p.y;
        m[(i, 3)] = p.x;
        m[(i, 4)] = p.y;
        m[(i, 5)] = 1.0;
    }

    let svd = m.svd(false, true);
    let v_t = svd.v_t.ok_or(EllipseError::SvdFailed)?;
    // The padded row contributes one structural zero; the five data singular
    // values must all be significant for a unique conic.
    if svd.singular_values.iter().take(5).any(|&s| s <= RANK_EPS) {
        return Err(EllipseError::Degenerate);
    }
    let coeffs = v_t.row(v_t.nrows() - 1);

    let (a, b, c, d, f, g) = (
        coeffs[0],
        coeffs[1] / 2.0,
        coeffs[2],
        coeffs[3] / 2.0,
        coeffs[4] / 2.0,
        coeffs[5],
    );

    // Centre, semi-axes and rotation of the conic; see the standard
    // closed-form ellipse parameter formulas.
    let det = b * b - a * c;
    let x0 = (c * d - b * f) / det;
    let y0 = (a * f - b * d) / det;

    let mut phi = 0.5 * (2.0 * b / (a - c)).atan();
    if a > c {
        phi += FRAC_PI_2;
    }

    let n = 2.0 * (a * f * f + c * d * d + g * b * b - 2.0 * b * d * f - a * c * g) / det;
    let s = ((a - c) * (a - c) + 4.0 * b * b).sqrt();
    let r = a + c;
    let (major_sq, minor_sq) = (n / (s - r), n / (-s - r));
    if !(major_sq > 0.0 && minor_sq > 0.0) {
        return Err(EllipseError::NotAnEllipse);
    }
    let mut semi_major = major_sq.sqrt();
    let mut semi_minor = minor_sq.sqrt();
    if semi_major < semi_minor {
        std::mem::swap(&mut semi_major, &mut semi_minor);
        phi -= FRAC_PI_2;
    }
    // Fold into -π/2..π/2 so the vertex half-plane is top or bottom.
    phi = (phi + FRAC_PI_2).rem_euclid(PI) - FRAC_PI_2;

    // Vertex distance along the minor axis; negative so that the vertex of a
    // clockwise point ordering sits above the centre (negative y).
    let ratio = semi_major / semi_minor;
    let mut radius_vertex = -f_normalized / (ratio * ratio - 1.0).sqrt();
    let (p0, p1) = (&points[0], &points[1]);
    if (p0.x - x0) * (p1.y - y0) < (p1.x - x0) * (p0.y - y0) {
        radius_vertex = -radius_vertex;
    }

    Ok(EllipseVertex {
        vertex: Pt2::new(radius_vertex * phi.sin(), radius_vertex * phi.cos()),
        center: Pt2::new(x0, y0),
    })
}
