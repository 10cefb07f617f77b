//! Vanishing-point angle solver.
//!
//! Turns 4 to 8 control points into the rotation angles of the perspective
//! correction. The point count selects the mode:
//!
//! - 4: points 0-1 and 2-3 each define a vertical reference line;
//! - 5: all points lie on an ellipse that is a projected circle;
//! - 6: as 4, plus points 4-5 defining a horizontal reference line;
//! - 7: as 5, plus points 5-6 defining a horizontal line used only for the
//!   final in-plane rotation;
//! - 8: as 6, plus points 6-7 defining a second horizontal line; the focal
//!   length is then derived from the two horizontal lines instead of taken
//!   from the caller.
//!
//! All coordinates are normalized image-plane coordinates, the focal length
//! is normalized by the sensor half-diagonal equivalent.

use log::debug;
use thiserror::Error;

use persp_core::{from_homogeneous, pan_tilt, pan_tilt_pan, Pt2, Real, Vec2, Vec3};

use crate::ellipse::{ellipse_vertex, EllipseError};
use crate::intersect::{direction_to, intersect_lines};

use std::f64::consts::{FRAC_PI_2, PI};

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("unsupported control point count {0}, expected 4 to 8")]
    UnsupportedPointCount(usize),
    #[error(transparent)]
    Ellipse(#[from] EllipseError),
}

/// Solved rotation state: three angles, the effective focal length and the
/// final in-plane rotation, plus the reference centre used for anchoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolvedAngles {
    /// First rotation around the y axis, bringing the vertical vanishing
    /// point into the y-z plane.
    pub rho: Real,
    /// Rotation around the x axis, lifting the vanishing point to the
    /// zenith.
    pub delta: Real,
    /// Second rotation around the y axis, aligning the horizontal vanishing
    /// point.
    pub rho_h: Real,
    /// Effective normalized focal length (either the nominal one, or derived
    /// from two horizontal lines in the 8-point mode).
    pub f_normalized: Real,
    /// Final in-plane rotation.
    pub alpha: Real,
    /// Centre of gravity of the control points (ellipse centre in the 5- and
    /// 7-point modes).
    pub center: Pt2,
}

/// Solve the rotation angles for the given control points.
///
/// `f` is the nominal focal length in millimetres and
/// `normalized_in_millimeters` the sensor half-diagonal equivalent; their
/// ratio is the normalized focal length the geometry runs on.
///
/// Degenerate line inputs (coincident points) do not fail: they produce NaN
/// angles that downstream consumers turn into an all-invalid remap.
/// Degenerate ellipse inputs are typed errors because the conic fit has a
/// natural failure point.
pub fn solve_angles(
    points: &[Pt2],
    f: Real,
    normalized_in_millimeters: Real,
) -> Result<SolvedAngles, SolveError> {
    let n = points.len();
    if !(4..=8).contains(&n) {
        return Err(SolveError::UnsupportedPointCount(n));
    }

    // Centre of gravity of the control points; the 6-point mode only uses
    // the four vertical-line points so the horizontal line cannot drag the
    // anchor sideways.
    let averaged = if n == 6 { &points[..4] } else { points };
    let mut center = Pt2::new(
        averaged.iter().map(|p| p.x).sum::<Real>() / averaged.len() as Real,
        averaged.iter().map(|p| p.y).sum::<Real>() / averaged.len() as Real,
    );

    let mut f_normalized = f / normalized_in_millimeters;

    // Vertical vanishing point, as a homogeneous vector.
    let vp = if n == 5 || n == 7 {
        let fit = ellipse_vertex(&points[..5], f_normalized)?;
        center = fit.center;
        Vec3::new(fit.vertex.x, fit.vertex.y, 1.0)
    } else {
        let v = intersect_lines(&points[0], &points[1], &points[2], &points[3]);
        if n == 8 {
            // Over-determined: two horizontal lines pin the focal length down
            // more reliably than a possibly inaccurate nominal value.
            let h = from_homogeneous(&intersect_lines(
                &points[4], &points[5], &points[6], &points[7],
            ));
            let p = from_homogeneous(&v);
            let f_squared = -h.x * p.x - h.y * p.y;
            if f_squared.is_finite() && f_squared > 0.0 {
                f_normalized = f_squared.sqrt();
                debug!(
                    "focal length derived from horizontal lines: {:.1} mm",
                    f_normalized * normalized_in_millimeters
                );
            }
        }
        v
    };

    // Vertex in polar coordinates. The atan2 forms reduce to
    // atan(-x_v / f) and π/2 - atan(-y_v / sqrt(x_v² + f²)) for finite
    // vanishing points and stay continuous for points at infinity.
    let rho = (-vp.x).atan2(vp.z * f_normalized);
    let mut delta = FRAC_PI_2
        - (-vp.y).atan2((vp.x * vp.x + (vp.z * f_normalized).powi(2)).sqrt());
    if (pan_tilt(rho, delta) * Vec3::new(center.x, center.y, f_normalized)).z < 0.0 {
        // Move the vertex into the nadir instead of the zenith.
        delta -= PI;
    }

    // Decide whether the reference lines are closer to vertical or
    // horizontal in the rotated frame, and the final in-plane rotation.
    let c: Vec2 = match n {
        4 | 6 | 8 => direction_to(&vp, &points[0]) + direction_to(&vp, &points[2]),
        5 => Vec2::new(vp.x - center.x, vp.y - center.y),
        _ => points[5] - points[6],
    };

    let mut swapped_verticals_and_horizontals = false;
    let alpha = if n == 7 {
        let a = pan_tilt(rho, delta) * Vec3::new(points[5].x, points[5].y, f_normalized);
        let b = pan_tilt(rho, delta) * Vec3::new(points[6].x, points[6].y, f_normalized);
        let angle = (b.y - a.y).atan2(b.x - a.x);
        if c.x.abs() > c.y.abs() {
            // Smallest rotation into horizontal.
            (-(angle - FRAC_PI_2)).rem_euclid(PI) - FRAC_PI_2
        } else {
            // Smallest rotation into vertical.
            (-angle).rem_euclid(PI) - FRAC_PI_2
        }
    } else if c.x.abs() > c.y.abs() {
        swapped_verticals_and_horizontals = true;
        FRAC_PI_2.copysign(rho)
    } else {
        0.0
    };

    // Second y rotation: where the horizontal great circle crosses the
    // equator once the vertex sits in the zenith.
    let rho_h = match n {
        4 => {
            // No explicit horizontal line; use a synthetic one through the
            // centre of gravity, perpendicular to the reference direction.
            let (pa, pb) = if swapped_verticals_and_horizontals {
                (
                    Pt2::new(center.x, center.y - 1.0),
                    Pt2::new(center.x, center.y + 1.0),
                )
            } else {
                (
                    Pt2::new(center.x - 1.0, center.y),
                    Pt2::new(center.x + 1.0, center.y),
                )
            };
            determine_rho_h(rho, delta, &pa, &pb, f_normalized, &center).unwrap_or(0.0)
        }
        5 | 7 => 0.0,
        _ => determine_rho_h(rho, delta, &points[4], &points[5], f_normalized, &center)
            .or_else(|| {
                if n == 8 {
                    determine_rho_h(rho, delta, &points[6], &points[7], f_normalized, &center)
                } else {
                    None
                }
            })
            .unwrap_or(0.0),
    };

    Ok(SolvedAngles {
        rho,
        delta,
        rho_h,
        f_normalized,
        alpha,
        center,
    })
}

/// Rotation aligning the horizontal vanishing point, from one horizontal
/// reference line.
///
/// Rotates the two endpoints by (ρ, δ), finds where the great circle through
/// them crosses the y = 0 plane and derives the second y rotation from that
/// crossing. Returns `None` when the horizontal great circle lies on the
/// equator and the rotation is undefined.
fn determine_rho_h(
    rho: Real,
    delta: Real,
    pa: &Pt2,
    pb: &Pt2,
    f_normalized: Real,
    center: &Pt2,
) -> Option<Real> {
    let m = pan_tilt(rho, delta);
    let a = m * Vec3::new(pa.x, pa.y, f_normalized);
    let b = m * Vec3::new(pb.x, pb.y, f_normalized);
    if a.y == b.y {
        if a.y == 0.0 {
            // The horizontal great circle is on the equator.
            return None;
        }
        // The horizontal vanishing point is perfectly to the left/right.
        return Some(0.0);
    }
    let lambda = a.y / (a.y - b.y);
    let x_h = a.x + lambda * (b.x - a.x);
    let z_h = a.z + lambda * (b.z - a.z);
    let mut rho_h = if z_h == 0.0 {
        if x_h > 0.0 {
            0.0
        } else {
            PI
        }
    } else {
        FRAC_PI_2 - (x_h / z_h).atan()
    };
    let rotated_center =
        pan_tilt_pan(rho, delta, rho_h) * Vec3::new(center.x, center.y, f_normalized);
    if rotated_center.z < 0.0 {
        // Move the vertex to the left instead of right.
        rho_h -= PI;
    }
    Some(rho_h)
}
