//! Homogeneous line intersection.
//!
//! Vanishing points are represented as homogeneous `(x, y, w)` vectors with
//! `w ≥ 0`: parallel reference lines meet at infinity (`w = 0`) and stay
//! representable without IEEE overflow, which keeps already-straight images
//! on the no-correction path instead of producing a spurious ±π/2 pan.

use persp_core::{to_homogeneous, Pt2, Real, Vec2, Vec3};

/// Intersect the line through `p1`, `p2` with the line through `p3`, `p4`.
///
/// Returns a homogeneous point canonicalized to `w ≥ 0`. Parallel lines
/// yield a point at infinity (`w = 0`); a degenerate line (coincident
/// endpoints, or two identical lines) yields an all-NaN vector that
/// propagates through the angle pipeline and marks the correction invalid.
pub fn intersect_lines(p1: &Pt2, p2: &Pt2, p3: &Pt2, p4: &Pt2) -> Vec3 {
    let l1 = to_homogeneous(p1).cross(&to_homogeneous(p2));
    let l2 = to_homogeneous(p3).cross(&to_homogeneous(p4));
    let v = l1.cross(&l2);
    if v.norm_squared() == 0.0 {
        return Vec3::repeat(Real::NAN);
    }
    if v.z < 0.0 {
        -v
    } else {
        v
    }
}

/// Unit direction in the image plane from `p` towards the homogeneous point
/// `vp`. For points at infinity this is the encoded direction itself.
///
/// A zero direction (the point coincides with `vp`) yields NaN components,
/// mirroring the NaN-propagation contract of the rest of the pipeline.
pub fn direction_to(vp: &Vec3, p: &Pt2) -> Vec2 {
    let dir = if vp.z == 0.0 {
        Vec2::new(vp.x, vp.y)
    } else {
        Vec2::new(vp.x / vp.z - p.x, vp.y / vp.z - p.y)
    };
    let norm = dir.norm();
    if norm == 0.0 {
        return Vec2::repeat(Real::NAN);
    }
    dir / norm
}
