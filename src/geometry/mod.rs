//! Geometry utilities: SE3 transforms and the pinhole camera model.

pub mod camera;
pub mod se3;

pub use camera::{CameraInfo, CameraModel};
pub use se3::SE3;
