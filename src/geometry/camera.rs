//! Pinhole camera model and per-camera calibration entries.

use nalgebra::{Vector2, Vector3};

use super::SE3;

/// Undistorted pinhole intrinsics.
///
/// For a 3D point (x, y, z) in camera coordinates the projected pixel is
/// (fx * x / z + cx, fy * y / z + cy).
#[derive(Debug, Clone, Copy)]
pub struct CameraModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraModel {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` when the point is on or behind the image plane.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<Vector2<f64>> {
        if p_cam.z <= 0.0 {
            return None;
        }
        Some(Vector2::new(
            self.fx * p_cam.x / p_cam.z + self.cx,
            self.fy * p_cam.y / p_cam.z + self.cy,
        ))
    }
}

/// Calibration for one camera: mounting extrinsics and intrinsics.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Pose of the camera in the body frame (T_body_cam, the EuRoC T_BS).
    pub body_pose_cam: SE3,
    pub intrinsics: CameraModel,
}
