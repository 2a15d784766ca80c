//! Keyframe orchestration loop.
//!
//! Thin driver composing the lifecycle manager, the measurement
//! synthesizer and the budget dispatcher per keyframe, and exchanging
//! data with the external estimator and selector. Processing is strictly
//! keyframe-sequential; the first fatal error ends the run.

use std::collections::HashSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::{FrontendParams, NoiseParams, SimParams};
use crate::error::FrontendError;
use crate::estimator::{StateEstimator, StatusMeasurementBatch, TrackerStatusSummary};
use crate::frontend::measurement::synthesize;
use crate::frontend::selection::{
    BudgetDispatcher, FeatureSelector, TrackedFeatures, WarmState,
};
use crate::frontend::track::TrackLifecycle;
use crate::frontend::types::{StereoMeasurement, TrackId};
use crate::imu::corrupt_measurements;
use crate::io::{GroundTruthProvider, SimDataset, LEFT_CAMERA, RIGHT_CAMERA};

/// Per-keyframe diagnostics.
#[derive(Debug, Clone)]
pub struct KeyframeSummary {
    pub timestamp_ns: u64,
    pub n_tracked: usize,
    pub n_new_before_selection: usize,
    pub n_new_after_selection: usize,
    /// Angle between ground-truth and estimated orientation, radians.
    pub rotation_error_rad: f64,
    /// Distance between ground-truth and estimated position, meters.
    pub translation_error_m: f64,
}

/// Diagnostics for the whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub keyframes: Vec<KeyframeSummary>,
}

/// The simulated front end driving an external estimator and selector
/// over one dataset.
pub struct SimulationPipeline<'a, E, S> {
    dataset: &'a SimDataset,
    frontend: FrontendParams,
    noise: NoiseParams,
    sim: SimParams,
    lifecycle: TrackLifecycle,
    dispatcher: BudgetDispatcher,
    estimator: E,
    selector: S,
    /// Noise stream, separate from the dispatcher's selection stream.
    rng: ChaCha8Rng,
    previous_track_ids: HashSet<TrackId>,
    warm: Option<WarmState>,
}

impl<'a, E: StateEstimator, S: FeatureSelector> SimulationPipeline<'a, E, S> {
    pub fn new(
        dataset: &'a SimDataset,
        frontend: FrontendParams,
        noise: NoiseParams,
        sim: SimParams,
        estimator: E,
        selector: S,
    ) -> Result<Self, FrontendError> {
        frontend.validate()?;
        noise.validate()?;
        sim.validate()?;
        if dataset.num_keyframes() <= sim.warmup_keyframes + sim.trailing_keyframes + 1 {
            return Err(FrontendError::Configuration(format!(
                "dataset has {} keyframes, not enough for a warm-up of {} and a \
                 trailing margin of {}",
                dataset.num_keyframes(),
                sim.warmup_keyframes,
                sim.trailing_keyframes
            )));
        }

        let lifecycle =
            TrackLifecycle::new(frontend.max_feature_age, dataset.max_landmark_id() + 1);
        let dispatcher = BudgetDispatcher::new(&frontend, sim.seed);
        let mut rng = ChaCha8Rng::seed_from_u64(sim.seed);
        rng.set_stream(1);

        Ok(Self {
            dataset,
            frontend,
            noise,
            sim,
            lifecycle,
            dispatcher,
            estimator,
            selector,
            rng,
            previous_track_ids: HashSet::new(),
            warm: None,
        })
    }

    /// Process the whole keyframe sequence.
    pub fn run(&mut self) -> Result<RunSummary, FrontendError> {
        let initial_k = self.sim.warmup_keyframes;
        let final_k = self.dataset.num_keyframes() - self.sim.trailing_keyframes;
        let left = self.dataset.camera_info(LEFT_CAMERA)?.clone();
        let right = self.dataset.camera_info(RIGHT_CAMERA)?.clone();
        let pixel_noise = self.noise.pixel();

        // Start of the IMU warm-up window, one warm-up span before the
        // first processed keyframe.
        let mut timestamp_lkf =
            self.dataset.keyframe_timestamps[initial_k - self.sim.warmup_keyframes];
        let mut summary = RunSummary::default();

        for k in initial_k..final_k {
            let timestamp_k = self.dataset.keyframe_timestamps[k];

            if k == initial_k {
                // Drain the warm-up IMU window and initialize the
                // estimator from ground truth; no measurements yet.
                let (imu_stamps, _) = self
                    .dataset
                    .imu
                    .interpolated_between(timestamp_lkf, timestamp_k)?;
                let initial_state = self.dataset.state_at(timestamp_k)?;
                self.estimator.initialize_state(timestamp_k, &initial_state)?;
                info!(
                    timestamp_k,
                    n_warmup_imu = imu_stamps.len(),
                    "estimator initialized from ground truth"
                );
                timestamp_lkf = timestamp_k;
                continue;
            }

            let gt_state = self.dataset.state_at(timestamp_k)?;
            let cam_pose = gt_state.pose.compose(&left.body_pose_cam);

            // Lifecycle + synthesis for every raw observation.
            let mut tracked = TrackedFeatures::default();
            let mut new_candidates = Vec::new();
            for obs in self.dataset.observations_at(timestamp_k) {
                let update = self
                    .lifecycle
                    .update(obs.landmark_id, &self.previous_track_ids);
                let landmark =
                    self.dataset.landmarks.get(&obs.landmark_id).ok_or_else(|| {
                        FrontendError::DataInconsistency(format!(
                            "observation references unknown landmark {}",
                            obs.landmark_id
                        ))
                    })?;
                let pixel = synthesize(
                    &cam_pose,
                    landmark,
                    &obs.pixel,
                    &left.intrinsics,
                    &pixel_noise,
                    &mut self.rng,
                )?;
                let measurement = StereoMeasurement {
                    track_id: update.active_id,
                    pixel,
                };
                if update.is_new {
                    new_candidates.push(measurement);
                } else {
                    tracked.measurements.push(measurement);
                    tracked.points_camera.push(cam_pose.transform_to(landmark));
                    tracked.ages.push(update.age);
                }
            }

            let n_new_before = new_candidates.len();
            let selected = self.dispatcher.select(
                timestamp_k,
                &tracked,
                new_candidates,
                self.warm.as_ref(),
                self.dataset,
                &left,
                &right,
                &mut self.selector,
            )?;
            debug!(
                n_tracked = tracked.count(),
                n_new_before,
                n_new_after = selected.len(),
                "feature selection done"
            );

            // Continuing tracks first, then the selected new tracks.
            let n_tracked = tracked.measurements.len();
            let mut batch = tracked.measurements;
            batch.extend(selected.iter().cloned());
            self.previous_track_ids = batch.iter().map(|m| m.track_id).collect();

            let (imu_stamps, mut imu_samples) = self
                .dataset
                .imu
                .interpolated_between(timestamp_lkf, timestamp_k)?;
            if self.noise.enabled {
                corrupt_measurements(
                    &mut imu_samples,
                    &self.noise.imu,
                    self.dataset.imu.rate_hz,
                    &mut self.rng,
                )?;
            }

            let status_batch = StatusMeasurementBatch {
                status: TrackerStatusSummary::mono_only(),
                measurements: batch,
            };
            self.estimator.add_visual_inertial_state_and_optimize(
                timestamp_k,
                &status_batch,
                &imu_stamps,
                &imu_samples,
            )?;

            // Estimator feedback for the next keyframe's selection.
            self.warm = Some(WarmState {
                state_covariance: self.estimator.state_covariance()?,
                pose_estimate: self.estimator.pose_estimate(),
                gt_pose_prev: gt_state.pose.clone(),
            });

            let pose_error = gt_state.pose.between(&self.estimator.pose_estimate());
            let keyframe = KeyframeSummary {
                timestamp_ns: timestamp_k,
                n_tracked,
                n_new_before_selection: n_new_before,
                n_new_after_selection: selected.len(),
                rotation_error_rad: pose_error.rotation.angle(),
                translation_error_m: pose_error.translation.norm(),
            };
            info!(
                k,
                timestamp_k,
                n_tracked = keyframe.n_tracked,
                n_new = keyframe.n_new_after_selection,
                rot_error_rad = keyframe.rotation_error_rad,
                tran_error_m = keyframe.translation_error_m,
                "keyframe processed"
            );
            summary.keyframes.push(keyframe);
            timestamp_lkf = timestamp_k;
        }

        Ok(summary)
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }
}
