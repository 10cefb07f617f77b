//! Perspective corrector and pixel remapper.
//!
//! [`PerspectiveCorrection`] packages one solved correction as an immutable
//! value: the backward (lookup-direction) rotation matrix, the effective
//! focal length and the centre-anchoring shift. [`RemapTable`] replays it
//! over a destination pixel grid, yielding one optional source coordinate
//! per pixel; `None` marks pixels with no source data (behind the virtual
//! camera, or degenerate geometry).

pub mod corrector;
pub mod remap;

pub use corrector::{control_points_from_arrays, CorrectionError, PerspectiveCorrection};
pub use remap::RemapTable;
