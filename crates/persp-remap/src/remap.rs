//! Destination-to-source coordinate tables.

use persp_core::{Pt2, Real, SensorFrame};

use crate::corrector::PerspectiveCorrection;

/// Per-pixel source coordinates for one destination grid.
///
/// `None` entries have no source data and must be left unfilled by the
/// resampling consumer. Stored coordinates are fractional pixel positions in
/// the source image; bounds checking is the consumer's job.
#[derive(Debug, Clone)]
pub struct RemapTable {
    width: u32,
    height: u32,
    coords: Vec<Option<Pt2>>,
}

impl RemapTable {
    /// Walk the destination grid of `frame` and record, for every pixel, the
    /// source coordinate the correction looks up.
    ///
    /// `scaling` is an independent uniform shrink/grow factor composed before
    /// the rotation lookup, as a multiplicative pre-step on normalized
    /// coordinates.
    pub fn build(frame: &SensorFrame, correction: &PerspectiveCorrection, scaling: Real) -> Self {
        let (width, height) = (frame.width(), frame.height());
        let mut coords = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let p = frame.pixel_to_normalized(Pt2::new(x as Real, y as Real));
                let src = correction
                    .map(Pt2::new(p.x * scaling, p.y * scaling))
                    .map(|q| frame.normalized_to_pixel(q));
                coords.push(src);
            }
        }
        Self {
            width,
            height,
            coords,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Source coordinate for the destination pixel `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<Pt2> {
        self.coords[y as usize * self.width as usize + x as usize]
    }

    /// Iterate over `(x, y, source)` triples in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, Option<Pt2>)> + '_ {
        let width = self.width;
        self.coords
            .iter()
            .enumerate()
            .map(move |(i, &src)| ((i as u32) % width, (i as u32) / width, src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrector::PerspectiveCorrection;
    use approx::assert_relative_eq;

    /// The scenario from the solver contract: two already-vertical parallel
    /// reference lines in a 200×100 image must leave the remap an identity
    /// within rounding.
    #[test]
    fn parallel_verticals_give_identity_remap() {
        let frame = SensorFrame::new(1.5, 200, 100);
        let pts = [
            Pt2::new(10.0, 10.0),
            Pt2::new(10.0, 90.0),
            Pt2::new(190.0, 10.0),
            Pt2::new(190.0, 90.0),
        ];
        let correction = PerspectiveCorrection::new(&frame, 20.0, &pts, 0.0).expect("valid");
        let table = RemapTable::build(&frame, &correction, 1.0);
        for (x, y, src) in table.iter() {
            let src = src.expect("all pixels visible");
            assert_relative_eq!(src.x, x as Real, epsilon = 1e-6);
            assert_relative_eq!(src.y, y as Real, epsilon = 1e-6);
        }
    }

    #[test]
    fn scaling_shrinks_the_lookup() {
        let frame = SensorFrame::new(1.5, 200, 100);
        let pts = [
            Pt2::new(10.0, 10.0),
            Pt2::new(10.0, 90.0),
            Pt2::new(190.0, 10.0),
            Pt2::new(190.0, 90.0),
        ];
        let correction = PerspectiveCorrection::new(&frame, 20.0, &pts, 0.0).expect("valid");
        let table = RemapTable::build(&frame, &correction, 2.0);
        // With a factor of 2, the destination centre pixel region samples a
        // doubled normalized coordinate.
        let p = frame.pixel_to_normalized(Pt2::new(150.0, 75.0));
        let expected = frame.normalized_to_pixel(Pt2::new(p.x * 2.0, p.y * 2.0));
        let src = table.get(150, 75).expect("visible");
        assert_relative_eq!(src.x, expected.x, epsilon = 1e-9);
        assert_relative_eq!(src.y, expected.y, epsilon = 1e-9);
    }

    #[test]
    fn table_dimensions_follow_the_frame() {
        let frame = SensorFrame::new(1.0, 64, 32);
        let pts = [
            Pt2::new(5.0, 2.0),
            Pt2::new(6.0, 30.0),
            Pt2::new(58.0, 2.0),
            Pt2::new(57.0, 30.0),
        ];
        let correction = PerspectiveCorrection::new(&frame, 35.0, &pts, 0.0).expect("valid");
        let table = RemapTable::build(&frame, &correction, 1.0);
        assert_eq!(table.width(), 64);
        assert_eq!(table.height(), 32);
        assert_eq!(table.iter().count(), 64 * 32);
    }
}
