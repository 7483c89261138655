//! Image-math primitives behind the detection and recognition stages.
//!
//! The [`relief`] module operates on dense float grids (the detector's
//! probability maps): binarization, 3x3 morphology, connected components and
//! contour tracing. The [`geometry`] module turns contours into rotated
//! rectangles. [`warp`] lifts oriented rectangles out of the source image.

pub mod geometry;
pub mod relief;
pub mod warp;

pub use relief::{Component, ReliefMap};
pub use warp::perspective_crop;
