//! State estimator interface.
//!
//! The nonlinear visual-inertial estimator is an external collaborator:
//! the harness only depends on this trait. A lightweight dead-reckoning
//! implementation is provided so the pipeline can run end-to-end without
//! the real optimizer.

pub mod dead_reckoning;

pub use dead_reckoning::DeadReckoningEstimator;

use nalgebra::{DMatrix, Matrix6xX, Vector3};

use crate::error::FrontendError;
use crate::frontend::types::StereoMeasurement;
use crate::geometry::SE3;
use crate::imu::ImuBias;
use crate::io::NavState;

/// Per-mode tracking verdict attached to a measurement batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    Valid,
    Invalid,
}

/// Front-end status summary: mono tracking is always valid in this
/// harness, stereo is always invalid (no right-camera synthesis).
#[derive(Debug, Clone, Copy)]
pub struct TrackerStatusSummary {
    pub mono: TrackingStatus,
    pub stereo: TrackingStatus,
}

impl TrackerStatusSummary {
    pub fn mono_only() -> Self {
        Self {
            mono: TrackingStatus::Valid,
            stereo: TrackingStatus::Invalid,
        }
    }
}

/// Measurement batch handed to the estimator once per keyframe:
/// continuing tracks first, then the selected new tracks.
#[derive(Debug, Clone)]
pub struct StatusMeasurementBatch {
    pub status: TrackerStatusSummary,
    pub measurements: Vec<StereoMeasurement>,
}

/// Debug counters exposed by the estimator after each update.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatorDebugInfo {
    pub num_factors: usize,
    pub num_valid: usize,
    pub num_degenerate: usize,
    pub mean_pixel_error: f64,
    pub max_pixel_error: f64,
    pub update_time_s: f64,
}

/// Visual-inertial state estimator as seen by the harness.
pub trait StateEstimator {
    /// Set the initial state and priors at the first processed keyframe.
    fn initialize_state(
        &mut self,
        timestamp_ns: u64,
        state: &NavState,
    ) -> Result<(), FrontendError>;

    /// Add one keyframe's measurements and inertial data, then optimize.
    fn add_visual_inertial_state_and_optimize(
        &mut self,
        timestamp_ns: u64,
        measurements: &StatusMeasurementBatch,
        imu_stamps: &[u64],
        imu_samples: &Matrix6xX<f64>,
    ) -> Result<(), FrontendError>;

    /// Latest body pose estimate (world frame).
    fn pose_estimate(&self) -> SE3;

    /// Latest velocity estimate (world frame).
    fn velocity_estimate(&self) -> Vector3<f64>;

    /// Latest IMU bias estimate.
    fn bias_estimate(&self) -> ImuBias;

    /// Covariance of the current state. Fails before the first
    /// optimization (cold start).
    fn state_covariance(&self) -> Result<DMatrix<f64>, FrontendError>;

    fn debug_info(&self) -> EstimatorDebugInfo;
}
