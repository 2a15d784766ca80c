//! Dataset access: parsing and the ground-truth provider interface.

pub mod dataset;

pub use dataset::{GroundTruthEntry, SimDataset, LEFT_CAMERA, RIGHT_CAMERA};

use nalgebra::Vector3;

use crate::error::FrontendError;
use crate::geometry::SE3;
use crate::imu::ImuBias;

/// Full ground-truth navigation state at one timestamp.
#[derive(Debug, Clone)]
pub struct NavState {
    pub pose: SE3,
    pub velocity: Vector3<f64>,
    pub bias: ImuBias,
}

/// Ground-truth trajectory, queryable at arbitrary keyframe timestamps.
pub trait GroundTruthProvider {
    fn state_at(&self, timestamp_ns: u64) -> Result<NavState, FrontendError>;
}
