//! Core math and geometry primitives for `perspective-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt2`, `Mat3`, ...),
//! - the sensor frame mapping between pixel and normalized image coordinates,
//! - the rotation algebra used by the perspective corrector, including the
//!   quaternion-based correction-strength rescaling.
//!
//! Coordinate system: right-handed, image centre at the origin of the x-y
//! plane, x to the right, y to the bottom, z into the scene. All rotations are
//! extrinsic and rotate points in the mathematically positive direction.

/// Linear algebra type aliases and helpers.
pub mod math;
/// Pixel to normalized coordinate mapping and sensor geometry.
pub mod frame;
/// Axis rotations and strength-scaled rotation matrices.
pub mod rotation;

pub use frame::*;
pub use math::*;
pub use rotation::*;
