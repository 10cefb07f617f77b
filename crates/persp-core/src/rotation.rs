//! Rotation algebra for the perspective corrector.
//!
//! The corrector composes up to three extrinsic rotations: first around the
//! y axis by ρ (bringing the vertical vanishing point into the y-z plane),
//! then around the x axis by δ (lifting it to the zenith), then around the y
//! axis again by ρₕ (aligning the horizontal vanishing point). The combined
//! rotation can additionally be rescaled by a correction-strength parameter,
//! which requires going through the quaternion representation: only there can
//! a single combined angle and axis be extracted and re-applied.

use nalgebra::{Rotation3, UnitQuaternion, Vector3};

use crate::math::{Mat3, Real};

/// Upper bound on the rescaled rotation angle. Keeps strength values close
/// to +1 from rotating the image past the hemisphere boundary.
const ANGLE_CAP: Real = 0.9 * std::f64::consts::PI;

/// Compression constant of the logarithmic over-correction curve.
const COMPRESSION: Real = 10.0;

/// The matrix `Rx(δ) · Ry(ρ)`.
pub fn pan_tilt(rho: Real, delta: Real) -> Mat3 {
    (Rotation3::from_axis_angle(&Vector3::x_axis(), delta)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), rho))
    .into_inner()
}

/// The matrix `Ry(ρₕ) · Rx(δ) · Ry(ρ)`.
pub fn pan_tilt_pan(rho: Real, delta: Real, rho_h: Real) -> Mat3 {
    (Rotation3::from_axis_angle(&Vector3::y_axis(), rho_h)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), delta)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), rho))
    .into_inner()
}

/// Rotation matrix `Ry(ρ₂) · Rx(δ) · Ry(ρ₁)` with its total rotation angle
/// rescaled by the correction strength `d ∈ [-1, 1]`.
///
/// The three rotations are composed as quaternions, the combined angle θ and
/// axis are extracted, θ is rescaled and the quaternion is rebuilt:
/// - `d ≤ 0`: θ · (d + 1), so `d = -1` yields the identity (no correction);
/// - `d > 0`: θ · (1 + ln(10·d + 1) / 10), a slower-than-linear
///   over-correction, capped at 0.9π.
///
/// A negligible combined rotation has no extractable axis; the identity is
/// returned. Non-finite input angles yield an all-NaN matrix so that
/// degenerate geometry keeps propagating instead of silently becoming a
/// no-op.
pub fn rotation_with_strength(rho1: Real, delta: Real, rho2: Real, d: Real) -> Mat3 {
    if !(rho1.is_finite() && delta.is_finite() && rho2.is_finite()) {
        return Mat3::repeat(Real::NAN);
    }
    let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), rho2)
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), delta)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), rho1);
    let Some((axis, theta)) = q.axis_angle() else {
        return Mat3::identity();
    };
    // axis_angle() returns θ in [0, π]; the sign lives in the axis.
    let mut theta = if d <= 0.0 {
        theta * (d + 1.0)
    } else {
        theta * (1.0 + (COMPRESSION * d + 1.0).ln() / COMPRESSION)
    };
    theta = theta.min(ANGLE_CAP);
    UnitQuaternion::from_axis_angle(&axis, theta)
        .to_rotation_matrix()
        .into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn combined_angle(m: &Mat3) -> Real {
        Rotation3::from_matrix_unchecked(*m).angle()
    }

    #[test]
    fn pan_tilt_matches_explicit_matrix() {
        let (rho, delta) = (0.3, -0.2);
        let m = pan_tilt(rho, delta);
        let expected = Mat3::new(
            rho.cos(),
            0.0,
            rho.sin(),
            rho.sin() * delta.sin(),
            delta.cos(),
            -rho.cos() * delta.sin(),
            -rho.sin() * delta.cos(),
            delta.sin(),
            rho.cos() * delta.cos(),
        );
        assert_relative_eq!(m, expected, epsilon = 1e-12);
    }

    #[test]
    fn zero_strength_matches_plain_composition() {
        let m = rotation_with_strength(0.3, 0.2, 0.1, 0.0);
        let expected = pan_tilt_pan(0.3, 0.2, 0.1);
        assert_relative_eq!(m, expected, epsilon = 1e-12);
    }

    #[test]
    fn full_negative_strength_is_identity() {
        let m = rotation_with_strength(0.3, 0.2, 0.1, -1.0);
        assert_relative_eq!(m, Mat3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn positive_strength_grows_angle_below_cap() {
        let base = combined_angle(&rotation_with_strength(0.3, 0.2, 0.1, 0.0));
        let over = combined_angle(&rotation_with_strength(0.3, 0.2, 0.1, 1.0));
        assert!(over > base, "over-correction must increase the angle");
        assert!(over <= 0.9 * PI + 1e-12);
    }

    #[test]
    fn angle_cap_applies_to_large_rotations() {
        let m = rotation_with_strength(1.5, 1.5, 1.5, 1.0);
        assert!(combined_angle(&m) <= 0.9 * PI + 1e-12);
    }

    #[test]
    fn degenerate_zero_rotation_is_identity() {
        let m = rotation_with_strength(0.0, 0.0, 0.0, 0.5);
        assert_relative_eq!(m, Mat3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn nan_angles_propagate() {
        let m = rotation_with_strength(Real::NAN, 0.1, 0.0, 0.0);
        assert!(m[(0, 0)].is_nan());
    }
}
