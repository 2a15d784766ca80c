//! IMU dead-reckoning estimator stub.
//!
//! Propagates pose and velocity by Euler integration of the inertial
//! samples and inflates a diagonal covariance over time. Vision
//! measurements only feed the debug counters. Good enough to exercise
//! the harness (including the warm-start selection path) without the
//! real optimizer.

use std::time::Instant;

use nalgebra::{DMatrix, Matrix6xX, UnitQuaternion, Vector3};
use tracing::debug;

use crate::error::FrontendError;
use crate::geometry::SE3;
use crate::imu::{ImuBias, GRAVITY};
use crate::io::NavState;

use super::{EstimatorDebugInfo, StateEstimator, StatusMeasurementBatch};

/// Dimension of the estimator state: pose (6), velocity (3), bias (6).
const STATE_DIM: usize = 15;

/// Dead-reckoning state estimator.
#[derive(Debug)]
pub struct DeadReckoningEstimator {
    pose: SE3,
    velocity: Vector3<f64>,
    bias: ImuBias,
    covariance: DMatrix<f64>,
    /// Diagonal process noise added per second of integration.
    process_noise_per_s: f64,
    initialized: bool,
    did_first_optimization: bool,
    debug_info: EstimatorDebugInfo,
}

impl DeadReckoningEstimator {
    pub fn new() -> Self {
        Self {
            pose: SE3::identity(),
            velocity: Vector3::zeros(),
            bias: ImuBias::zero(),
            covariance: DMatrix::identity(STATE_DIM, STATE_DIM) * 1e-6,
            process_noise_per_s: 1e-4,
            initialized: false,
            did_first_optimization: false,
            debug_info: EstimatorDebugInfo::default(),
        }
    }
}

impl Default for DeadReckoningEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl StateEstimator for DeadReckoningEstimator {
    fn initialize_state(
        &mut self,
        _timestamp_ns: u64,
        state: &NavState,
    ) -> Result<(), FrontendError> {
        self.pose = state.pose.clone();
        self.velocity = state.velocity;
        self.bias = state.bias;
        self.initialized = true;
        Ok(())
    }

    fn add_visual_inertial_state_and_optimize(
        &mut self,
        timestamp_ns: u64,
        measurements: &StatusMeasurementBatch,
        imu_stamps: &[u64],
        imu_samples: &Matrix6xX<f64>,
    ) -> Result<(), FrontendError> {
        if !self.initialized {
            return Err(FrontendError::DataInconsistency(
                "estimator update before initialization".into(),
            ));
        }
        if imu_stamps.len() != imu_samples.ncols() {
            return Err(FrontendError::DataInconsistency(format!(
                "IMU stamps ({}) and sample columns ({}) disagree",
                imu_stamps.len(),
                imu_samples.ncols()
            )));
        }

        let start = Instant::now();
        for i in 0..imu_stamps.len().saturating_sub(1) {
            let dt = (imu_stamps[i + 1] - imu_stamps[i]) as f64 * 1e-9;
            let accel = Vector3::new(
                imu_samples[(0, i)],
                imu_samples[(1, i)],
                imu_samples[(2, i)],
            ) - self.bias.accel;
            let gyro = Vector3::new(
                imu_samples[(3, i)],
                imu_samples[(4, i)],
                imu_samples[(5, i)],
            ) - self.bias.gyro;

            let accel_world = self.pose.rotation * accel + GRAVITY;
            self.pose.translation += self.velocity * dt + 0.5 * accel_world * dt * dt;
            self.velocity += accel_world * dt;
            self.pose.rotation *= UnitQuaternion::from_scaled_axis(gyro * dt);

            for d in 0..STATE_DIM {
                self.covariance[(d, d)] += self.process_noise_per_s * dt;
            }
        }

        self.debug_info.num_factors += measurements.measurements.len();
        self.debug_info.num_valid = measurements.measurements.len();
        self.debug_info.update_time_s = start.elapsed().as_secs_f64();
        self.did_first_optimization = true;
        debug!(
            timestamp_ns,
            n_measurements = measurements.measurements.len(),
            n_imu = imu_stamps.len(),
            "dead-reckoning update"
        );
        Ok(())
    }

    fn pose_estimate(&self) -> SE3 {
        self.pose.clone()
    }

    fn velocity_estimate(&self) -> Vector3<f64> {
        self.velocity
    }

    fn bias_estimate(&self) -> ImuBias {
        self.bias
    }

    fn state_covariance(&self) -> Result<DMatrix<f64>, FrontendError> {
        if !self.did_first_optimization {
            return Err(FrontendError::DataInconsistency(
                "no state covariance before the first optimization".into(),
            ));
        }
        Ok(self.covariance.clone())
    }

    fn debug_info(&self) -> EstimatorDebugInfo {
        self.debug_info
    }
}
