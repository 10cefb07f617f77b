//! Sensor frame: the mapping between pixel coordinates and the normalized
//! image plane used by the solver and the remapper.
//!
//! In normalized coordinates the image centre is the origin and half of the
//! shorter image side is one unit. Focal lengths in millimetres are converted
//! into the same units by dividing by the physical half-diagonal of the
//! sensor, derived from the crop factor relative to the 36×24 mm reference
//! frame.

use crate::math::{Pt2, Real};

/// Geometry of one source image: pixel dimensions, crop factor and the
/// derived normalization constants. Cheap to construct, one per image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    width: u32,
    height: u32,
    crop_factor: Real,
    /// Physical sensor half-height-equivalent in mm; nominal focal lengths
    /// are divided by this to obtain normalized focal lengths.
    normalized_in_millimeters: Real,
    norm_scale: Real,
    norm_unscale: Real,
    center_x: Real,
    center_y: Real,
}

impl SensorFrame {
    /// Build the frame for a `width × height` image taken with the given
    /// crop factor. Both dimensions must be at least 2 pixels.
    pub fn new(crop_factor: Real, width: u32, height: u32) -> Self {
        let size = width.min(height) as Real;
        let (w, h) = (width as Real, height as Real);
        let aspect_ratio = if w > h { w / h } else { h / w };
        let aspect_ratio_correction = (1.0 + aspect_ratio * aspect_ratio).sqrt();
        let normalized_in_millimeters = (36.0_f64 * 36.0 + 24.0 * 24.0).sqrt() / 2.0
            / aspect_ratio_correction
            / crop_factor;
        Self {
            width,
            height,
            crop_factor,
            normalized_in_millimeters,
            norm_scale: 2.0 / (size - 1.0),
            norm_unscale: (size - 1.0) / 2.0,
            center_x: w / size,
            center_y: h / size,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn crop_factor(&self) -> Real {
        self.crop_factor
    }

    /// Normalized focal length for a nominal focal length in millimetres.
    pub fn normalized_focal_length(&self, focal_length_mm: Real) -> Real {
        focal_length_mm / self.normalized_in_millimeters
    }

    /// Sensor half-diagonal equivalent in millimetres.
    pub fn normalized_in_millimeters(&self) -> Real {
        self.normalized_in_millimeters
    }

    /// Map a pixel coordinate into the normalized image plane.
    pub fn pixel_to_normalized(&self, p: Pt2) -> Pt2 {
        Pt2::new(
            p.x * self.norm_scale - self.center_x,
            p.y * self.norm_scale - self.center_y,
        )
    }

    /// Map a normalized image-plane coordinate back to pixels.
    pub fn normalized_to_pixel(&self, p: Pt2) -> Pt2 {
        Pt2::new(
            (p.x + self.center_x) * self.norm_unscale,
            (p.y + self.center_y) * self.norm_unscale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalization_round_trip() {
        let frame = SensorFrame::new(1.5, 200, 100);
        let p = Pt2::new(37.0, 81.0);
        let back = frame.normalized_to_pixel(frame.pixel_to_normalized(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn center_maps_to_origin() {
        let frame = SensorFrame::new(1.0, 101, 101);
        let c = frame.pixel_to_normalized(Pt2::new(50.0, 50.0));
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn full_frame_focal_normalization() {
        // Square crop of a full-frame sensor: half-diagonal scaled by the
        // aspect correction sqrt(2).
        let frame = SensorFrame::new(1.0, 100, 100);
        let expected = (36.0_f64 * 36.0 + 24.0 * 24.0).sqrt() / 2.0 / 2.0_f64.sqrt();
        assert_relative_eq!(frame.normalized_in_millimeters(), expected, epsilon = 1e-12);
        assert_relative_eq!(
            frame.normalized_focal_length(expected),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn shorter_side_spans_two_units() {
        let frame = SensorFrame::new(1.0, 200, 100);
        let top = frame.pixel_to_normalized(Pt2::new(0.0, 0.0));
        let bottom = frame.pixel_to_normalized(Pt2::new(0.0, 99.0));
        assert_relative_eq!(bottom.y - top.y, 2.0, epsilon = 1e-12);
    }
}
