//! Closed-form solvers for perspective control.
//!
//! Given 4 to 8 user-supplied control points in a photograph, this crate
//! computes the camera rotation (pan/tilt/roll) that moves the vertical
//! vanishing point into the zenith and the horizontal one to the side. The
//! building blocks are:
//! - homogeneous line intersection ([`intersect_lines`]),
//! - a five-point conic fit recovering the vertex of a tilted circle
//!   ([`ellipse_vertex`]),
//! - the angle solver combining both ([`solve_angles`]).

pub mod angles;
pub mod ellipse;
pub mod intersect;

pub use angles::{solve_angles, SolveError, SolvedAngles};
pub use ellipse::{ellipse_vertex, EllipseError, EllipseVertex};
pub use intersect::{direction_to, intersect_lines};
