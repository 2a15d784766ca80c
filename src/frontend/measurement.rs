//! Stereo measurement synthesis from ground-truth geometry.
//!
//! A raw observation from the simulated tracker is validated against the
//! expected projection of its landmark through the ground-truth camera
//! pose; a mismatch means the measurement conventions are misunderstood
//! and the whole run would be corrupted, so it is fatal. Optionally the
//! pixel is corrupted with zero-mean Gaussian noise before it is handed
//! to the estimator.

use nalgebra::{Vector2, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

use crate::error::FrontendError;
use crate::geometry::{CameraModel, SE3};

use super::types::StereoPixel;

/// Maximum Euclidean distance (pixels) between the reprojected and the
/// supplied pixel before the observation is rejected as inconsistent.
pub const REPROJECTION_TOLERANCE_PX: f64 = 1e-2;

/// Pixel noise configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PixelNoise {
    pub enabled: bool,
    /// Standard deviation (pixels) applied independently to u and v.
    pub sigma: f64,
}

impl Default for PixelNoise {
    fn default() -> Self {
        Self {
            enabled: true,
            sigma: 1.0,
        }
    }
}

/// Validate and optionally noise one observation.
///
/// `cam_pose` is the ground-truth pose of the camera in the world frame.
/// Pure given the rng state: a fixed seed reproduces the exact output.
/// With noise disabled the observed pixel is returned unchanged; the
/// right-camera coordinate is always unavailable.
pub fn synthesize<R: Rng>(
    cam_pose: &SE3,
    landmark: &Vector3<f64>,
    observed_px: &Vector2<f64>,
    camera: &CameraModel,
    noise: &PixelNoise,
    rng: &mut R,
) -> Result<StereoPixel, FrontendError> {
    let p_cam = cam_pose.transform_to(landmark);
    let expected_px = camera.project(&p_cam).ok_or_else(|| {
        FrontendError::DataInconsistency(format!(
            "landmark at depth {:.3} is behind the camera",
            p_cam.z
        ))
    })?;

    let residual = (expected_px - observed_px).norm();
    if residual > REPROJECTION_TOLERANCE_PX {
        return Err(FrontendError::DataInconsistency(format!(
            "pixel projection mismatch: expected ({:.4}, {:.4}), observed ({:.4}, {:.4}), \
             distance {:.4} px",
            expected_px.x, expected_px.y, observed_px.x, observed_px.y, residual
        )));
    }

    let mut u_left = observed_px.x;
    let mut v = observed_px.y;
    if noise.enabled {
        let dist = Normal::new(0.0, noise.sigma).map_err(|e| {
            FrontendError::Configuration(format!("invalid pixel noise sigma: {}", e))
        })?;
        u_left += dist.sample(rng);
        v += dist.sample(rng);
    }

    Ok(StereoPixel {
        u_left,
        u_right: None,
        v,
    })
}
