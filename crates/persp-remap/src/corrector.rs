//! Construction of one perspective correction.
//!
//! The forward picture: the image is central-projected onto the sphere,
//! rotated by (ρ, δ, ρₕ) so the vanishing points sit where they belong, and
//! projected back onto the sensor plane. The lookup runs backwards, so the
//! stored matrix is the strength-scaled rotation by (-ρₕ, -δ, -ρ) with the
//! final in-plane rotation α appended, and the shift keeps the chosen anchor
//! point fixed.

use log::debug;
use thiserror::Error;

use persp_core::{
    pan_tilt_pan, rotation_with_strength, Mat3, Pt2, Real, SensorFrame, Vec2, Vec3,
};
use persp_solver::{solve_angles, SolveError};

/// Magnification of the old image centre beyond which the anchor falls back
/// to the control-point centroid.
const MAX_CENTER_MAGNIFICATION: Real = 10.0;

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("focal length must be positive, got {0}")]
    InvalidFocalLength(Real),
    #[error("unsupported control point count {0}, expected 4 to 8")]
    UnsupportedPointCount(usize),
    #[error("control point arrays differ in length: {0} x values vs {1} y values")]
    MismatchedArrays(usize, usize),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error("projected image center lies behind the camera")]
    CenterBehindCamera,
}

/// Pair up separate x and y coordinate arrays into control points.
pub fn control_points_from_arrays(
    xs: &[Real],
    ys: &[Real],
) -> Result<Vec<Pt2>, CorrectionError> {
    if xs.len() != ys.len() {
        return Err(CorrectionError::MismatchedArrays(xs.len(), ys.len()));
    }
    Ok(xs
        .iter()
        .zip(ys.iter())
        .map(|(&x, &y)| Pt2::new(x, y))
        .collect())
}

/// One solved perspective correction, ready to replay per pixel.
///
/// The first two matrix columns are pre-scaled by the centre mapping scale
/// and the shift is stored divided by it, so the per-pixel path is a single
/// matrix-vector product and one division.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCorrection {
    matrix: Mat3,
    f_normalized: Real,
    shift: Vec2,
}

impl PerspectiveCorrection {
    /// Solve the correction for control points given in pixel coordinates of
    /// the unmodified source image.
    ///
    /// `strength` is clamped to [-1, 1]: -1 leaves the image unchanged, 0 is
    /// the full geometric correction, +1 over-corrects by 25%. On `Err` the
    /// caller's contract is to pass the image through unmodified.
    pub fn new(
        frame: &SensorFrame,
        focal_length_mm: Real,
        points: &[Pt2],
        strength: Real,
    ) -> Result<Self, CorrectionError> {
        if focal_length_mm <= 0.0 {
            return Err(CorrectionError::InvalidFocalLength(focal_length_mm));
        }
        if !(4..=8).contains(&points.len()) {
            return Err(CorrectionError::UnsupportedPointCount(points.len()));
        }
        let d = strength.clamp(-1.0, 1.0);

        let normalized: Vec<Pt2> = points
            .iter()
            .map(|p| frame.pixel_to_normalized(*p))
            .collect();
        let solved = solve_angles(
            &normalized,
            focal_length_mm,
            frame.normalized_in_millimeters(),
        )?;
        let f = solved.f_normalized;

        // If the old image centre ends up behind the camera or magnified
        // beyond reason, anchor on the control-point centroid instead.
        let z_center =
            (pan_tilt_pan(solved.rho, solved.delta, solved.rho_h) * Vec3::new(0.0, 0.0, f)).z;
        let use_centroid = z_center <= 0.0 || f / z_center > MAX_CENTER_MAGNIFICATION;
        if use_centroid {
            debug!("old image center invalid, anchoring on control-point centroid");
        }

        // Forward rotation, for placing the chosen centre.
        let forward = rotation_with_strength(solved.rho, solved.delta, solved.rho_h, d);
        let anchor = if use_centroid {
            forward * Vec3::new(solved.center.x, solved.center.y, f)
        } else {
            forward * Vec3::new(0.0, 0.0, f)
        };
        if anchor.z <= 0.0 {
            return Err(CorrectionError::CenterBehindCamera);
        }

        // Mapping scale at the image centre; shifting by the projected
        // anchor keeps it a fixed point of the correction.
        let mapping_scale = f / anchor.z;
        let shift = Vec2::new(-anchor.x * mapping_scale, -anchor.y * mapping_scale);

        // Backward (lookup) rotation, with the in-plane rotation α appended:
        // R_y(-ρ) · R_x(-δ) · R_y(-ρₕ) · R_z(α).
        let backward = rotation_with_strength(-solved.rho_h, -solved.delta, -solved.rho, d);
        let (sin_a, cos_a) = solved.alpha.sin_cos();
        let rot_z = Mat3::new(cos_a, -sin_a, 0.0, sin_a, cos_a, 0.0, 0.0, 0.0, 1.0);
        let backward = backward * rot_z;
        let shift = Vec2::new(
            cos_a * shift.x + sin_a * shift.y,
            -sin_a * shift.x + cos_a * shift.y,
        );

        // Pre-scale the first two columns and the shift so the per-pixel
        // lookup needs no extra multiplications.
        let matrix = Mat3::from_columns(&[
            backward.column(0) * mapping_scale,
            backward.column(1) * mapping_scale,
            backward.column(2).into_owned(),
        ]);
        Ok(Self {
            matrix,
            f_normalized: f,
            shift: shift / mapping_scale,
        })
    }

    /// Map one destination coordinate (normalized image plane) to its source
    /// coordinate.
    ///
    /// Returns `None` for points behind the virtual camera (z ≤ 0 after
    /// rotation) and for non-finite results of degenerate geometry; both
    /// mean "no source pixel".
    pub fn map(&self, p: Pt2) -> Option<Pt2> {
        let v = self.matrix
            * Vec3::new(
                p.x - self.shift.x,
                p.y - self.shift.y,
                self.f_normalized,
            );
        if v.z > 0.0 {
            let stretch = self.f_normalized / v.z;
            let q = Pt2::new(v.x * stretch, v.y * stretch);
            if q.x.is_finite() && q.y.is_finite() {
                return Some(q);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> SensorFrame {
        SensorFrame::new(1.0, 500, 400)
    }

    /// Control points on two lines converging towards a vanishing point far
    /// above the image, like a building shot with an upward tilt.
    fn converging_points() -> Vec<Pt2> {
        let vp = Pt2::new(250.0, -2000.0);
        let anchors = [Pt2::new(150.0, 300.0), Pt2::new(350.0, 300.0)];
        let mut pts = Vec::new();
        for a in anchors {
            pts.push(a);
            pts.push(a + (vp - a) * 0.1);
        }
        pts
    }

    #[test]
    fn rejects_invalid_focal_length() {
        let err = PerspectiveCorrection::new(&frame(), 0.0, &converging_points(), 0.0);
        assert!(matches!(err, Err(CorrectionError::InvalidFocalLength(_))));
        let err = PerspectiveCorrection::new(&frame(), -35.0, &converging_points(), 0.0);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unsupported_point_counts() {
        for n in [0, 1, 2, 3, 9, 12] {
            let pts = vec![Pt2::new(10.0, 10.0); n];
            assert!(
                matches!(
                    PerspectiveCorrection::new(&frame(), 35.0, &pts, 0.0),
                    Err(CorrectionError::UnsupportedPointCount(_))
                ),
                "count {n} must be rejected"
            );
        }
    }

    #[test]
    fn rejects_mismatched_coordinate_arrays() {
        let err = control_points_from_arrays(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0]);
        assert!(matches!(err, Err(CorrectionError::MismatchedArrays(4, 3))));
    }

    #[test]
    fn center_is_a_fixed_point() {
        let correction =
            PerspectiveCorrection::new(&frame(), 35.0, &converging_points(), 0.0).expect("valid");
        let mapped = correction.map(Pt2::origin()).expect("visible");
        assert_relative_eq!(mapped.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(mapped.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn negative_unit_strength_is_identity() {
        let correction =
            PerspectiveCorrection::new(&frame(), 35.0, &converging_points(), -1.0).expect("valid");
        for p in [
            Pt2::new(0.0, 0.0),
            Pt2::new(0.4, -0.3),
            Pt2::new(-0.6, 0.7),
        ] {
            let mapped = correction.map(p).expect("visible");
            assert_relative_eq!(mapped.x, p.x, epsilon = 1e-9);
            assert_relative_eq!(mapped.y, p.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn strength_is_clamped() {
        let over =
            PerspectiveCorrection::new(&frame(), 35.0, &converging_points(), 7.0).expect("valid");
        let one =
            PerspectiveCorrection::new(&frame(), 35.0, &converging_points(), 1.0).expect("valid");
        assert_eq!(over, one);
    }

    #[test]
    fn coincident_points_invalidate_all_pixels() {
        let pts = vec![
            Pt2::new(100.0, 100.0),
            Pt2::new(100.0, 100.0),
            Pt2::new(300.0, 100.0),
            Pt2::new(320.0, 350.0),
        ];
        let correction = PerspectiveCorrection::new(&frame(), 35.0, &pts, 0.0).expect("no panic");
        assert!(correction.map(Pt2::origin()).is_none());
        assert!(correction.map(Pt2::new(0.3, -0.2)).is_none());
    }
}
