//! Per-keyframe feature budget and selection strategy dispatch.
//!
//! Given the number of features already being tracked, the dispatcher
//! decides how many new features the frame needs and how to choose them:
//! pass everything through when under budget, draw a seeded random subset
//! when no informative criterion is available (quality placeholder or
//! cold start), or assemble the full selection context and delegate to an
//! external information-based selector.

use nalgebra::{DMatrix, Vector2, Vector3};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::debug;

use crate::config::FrontendParams;
use crate::error::FrontendError;
use crate::geometry::{CameraInfo, CameraModel, SE3};
use crate::io::GroundTruthProvider;

use super::types::StereoMeasurement;

/// Feature selection criterion, mirroring the external selector's modes.
///
/// `Quality` is a placeholder in simulation: there is no detector quality
/// score, so it degenerates to seeded random sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCriterion {
    Quality,
    MinEig,
    LogDet,
}

impl SelectionCriterion {
    /// Map the driver's numeric flag (0/1/2) to a criterion.
    pub fn from_flag(flag: u32) -> Self {
        match flag {
            1 => Self::MinEig,
            2 => Self::LogDet,
            _ => Self::Quality,
        }
    }
}

/// A predicted pose with its timestamp in seconds.
#[derive(Debug, Clone)]
pub struct StampedPose {
    pub pose: SE3,
    pub timestamp_s: f64,
}

/// One new-feature candidate as presented to the external selector.
#[derive(Debug, Clone)]
pub struct CandidateCorner {
    pub pixel: Vector2<f64>,
    /// Probability that the candidate can actually be tracked. Not
    /// available in simulation, defaulted to 1.0.
    pub success_probability: f64,
    /// Distance at which the corner becomes available. Not available in
    /// simulation, defaulted to 0.0.
    pub available_distance: f64,
}

/// Everything the external information-based selector needs for one
/// keyframe. Built fresh per keyframe and discarded after use.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    /// Covariance of the estimator's current state.
    pub state_covariance: DMatrix<f64>,
    /// Predicted poses over the selection horizon, current step included.
    pub poses_at_future_keyframes: Vec<StampedPose>,
    /// 3D points of currently tracked features, in the left camera frame.
    pub tracked_points: Vec<Vector3<f64>>,
    /// Remaining life (keyframes) of each tracked point, parallel to
    /// `tracked_points`.
    pub tracked_point_life: Vec<u32>,
    pub body_pose_left_cam: SE3,
    pub body_pose_right_cam: SE3,
    pub left_intrinsics: CameraModel,
    pub right_intrinsics: CameraModel,
    pub candidates: Vec<CandidateCorner>,
    /// Whether the selector may evaluate gains lazily (upper bounds
    /// first, exact gains only for contenders).
    pub lazy_evaluation: bool,
}

/// What the external selector hands back: candidates reordered by gain,
/// the indices of the chosen ones into the original candidate list, and
/// their information gains.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub corners: Vec<Vector2<f64>>,
    pub selected_indices: Vec<usize>,
    pub selected_gains: Vec<f64>,
}

/// External information-based feature selector.
///
/// The scoring algorithm behind this trait is not part of the harness.
pub trait FeatureSelector {
    fn select(
        &mut self,
        context: &SelectionContext,
        needed: usize,
        criterion: SelectionCriterion,
    ) -> Result<SelectionOutcome, FrontendError>;
}

/// Trivial stand-in selector: keeps the first `needed` candidates with
/// zero gain. Lets the harness run end-to-end when no information-based
/// selector is linked in.
#[derive(Debug, Default)]
pub struct PassthroughSelector;

impl FeatureSelector for PassthroughSelector {
    fn select(
        &mut self,
        context: &SelectionContext,
        needed: usize,
        _criterion: SelectionCriterion,
    ) -> Result<SelectionOutcome, FrontendError> {
        let n = needed.min(context.candidates.len());
        Ok(SelectionOutcome {
            corners: context.candidates.iter().map(|c| c.pixel).collect(),
            selected_indices: (0..n).collect(),
            selected_gains: vec![0.0; n],
        })
    }
}

/// Features already under track at the current keyframe, with the side
/// data the selector needs about them.
#[derive(Debug, Clone, Default)]
pub struct TrackedFeatures {
    pub measurements: Vec<StereoMeasurement>,
    /// 3D position of each tracked landmark in the left camera frame,
    /// parallel to `measurements`.
    pub points_camera: Vec<Vector3<f64>>,
    /// Current track age of each tracked feature, parallel to
    /// `points_camera`.
    pub ages: Vec<u32>,
}

impl TrackedFeatures {
    pub fn count(&self) -> usize {
        self.points_camera.len()
    }
}

/// Estimator feedback available once the first optimization has run.
///
/// Before that (cold start) no covariance exists and information-based
/// selection is impossible.
#[derive(Debug, Clone)]
pub struct WarmState {
    /// Covariance snapshot of the estimator's current state.
    pub state_covariance: DMatrix<f64>,
    /// Estimator's latest body pose estimate (previous keyframe).
    pub pose_estimate: SE3,
    /// Ground-truth body pose at the previous keyframe. Horizon poses are
    /// built from *relative* ground-truth motion on top of the estimate,
    /// never from absolute ground truth.
    pub gt_pose_prev: SE3,
}

/// Decides the per-keyframe feature budget and selection strategy.
#[derive(Debug)]
pub struct BudgetDispatcher {
    max_features_per_frame: usize,
    max_feature_age: u32,
    intra_keyframe_s: f64,
    selection_horizon_s: f64,
    criterion: SelectionCriterion,
    lazy_evaluation: bool,
    rng: ChaCha8Rng,
}

impl BudgetDispatcher {
    pub fn new(params: &FrontendParams, seed: u64) -> Self {
        Self {
            max_features_per_frame: params.max_features_per_frame,
            max_feature_age: params.max_feature_age,
            intra_keyframe_s: params.intra_keyframe_s,
            selection_horizon_s: params.selection_horizon_s,
            criterion: params.criterion,
            lazy_evaluation: params.lazy_evaluation,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Filter the new-feature candidates down to the frame budget.
    ///
    /// Returns at most `max_features_per_frame - tracked.count()`
    /// measurements; when the candidates already fit the budget they are
    /// returned unchanged and in their original order. The external
    /// selector's answer is accepted as-is, even when shorter than the
    /// budget.
    #[allow(clippy::too_many_arguments)]
    pub fn select<S, G>(
        &mut self,
        timestamp_ns: u64,
        tracked: &TrackedFeatures,
        mut new_candidates: Vec<StereoMeasurement>,
        warm: Option<&WarmState>,
        ground_truth: &G,
        left_cam: &CameraInfo,
        right_cam: &CameraInfo,
        selector: &mut S,
    ) -> Result<Vec<StereoMeasurement>, FrontendError>
    where
        S: FeatureSelector,
        G: GroundTruthProvider,
    {
        let needed = self.max_features_per_frame.saturating_sub(tracked.count());
        if new_candidates.len() <= needed {
            return Ok(new_candidates);
        }

        // No detector quality exists in simulation, and before the first
        // optimization there is no covariance either: both cases fall
        // back to a seeded random subset.
        let warm = match warm {
            Some(w) if self.criterion != SelectionCriterion::Quality => w,
            _ => {
                let keyframe_seed = self.rng.gen::<u64>();
                let mut keyframe_rng = ChaCha8Rng::seed_from_u64(keyframe_seed);
                new_candidates.shuffle(&mut keyframe_rng);
                new_candidates.truncate(needed);
                return Ok(new_candidates);
            }
        };
        let context = self.build_context(
            timestamp_ns,
            tracked,
            &new_candidates,
            warm,
            ground_truth,
            left_cam,
            right_cam,
        )?;
        let outcome = selector.select(&context, needed, self.criterion)?;
        debug!(
            n_selected = outcome.selected_indices.len(),
            needed, "external selector returned"
        );

        let mut selected = Vec::with_capacity(outcome.selected_indices.len());
        for &idx in &outcome.selected_indices {
            let m = new_candidates.get(idx).ok_or_else(|| {
                FrontendError::DataInconsistency(format!(
                    "selector returned candidate index {} out of range (have {})",
                    idx,
                    new_candidates.len()
                ))
            })?;
            selected.push(m.clone());
        }
        Ok(selected)
    }

    /// Assemble the per-keyframe context for the external selector.
    #[allow(clippy::too_many_arguments)]
    fn build_context<G: GroundTruthProvider>(
        &self,
        timestamp_ns: u64,
        tracked: &TrackedFeatures,
        new_candidates: &[StereoMeasurement],
        warm: &WarmState,
        ground_truth: &G,
        left_cam: &CameraInfo,
        right_cam: &CameraInfo,
    ) -> Result<SelectionContext, FrontendError> {
        if tracked.points_camera.len() != tracked.ages.len() {
            return Err(FrontendError::DataInconsistency(format!(
                "tracked 3D points ({}) and ages ({}) disagree",
                tracked.points_camera.len(),
                tracked.ages.len()
            )));
        }

        // Future poses: ground truth only contributes *relative* motion on
        // top of the latest estimate, so no absolute ground-truth pose can
        // leak into the state being estimated. A zero-step horizon still
        // yields the current predicted pose.
        let horizon_steps =
            (self.selection_horizon_s / self.intra_keyframe_s).round() as u64;
        let mut poses_at_future_keyframes =
            Vec::with_capacity(horizon_steps as usize + 1);
        for kk in 0..=horizon_steps {
            let t_kk =
                timestamp_ns + (kk as f64 * self.intra_keyframe_s * 1e9).round() as u64;
            let gt_kk = ground_truth.state_at(t_kk)?.pose;
            let rel_prev_kk = warm.gt_pose_prev.between(&gt_kk);
            poses_at_future_keyframes.push(StampedPose {
                pose: warm.pose_estimate.compose(&rel_prev_kk),
                timestamp_s: t_kk as f64 * 1e-9,
            });
        }

        let tracked_point_life = tracked
            .ages
            .iter()
            .map(|&age| self.max_feature_age.saturating_sub(age))
            .collect();

        let candidates = new_candidates
            .iter()
            .map(|m| CandidateCorner {
                pixel: Vector2::new(m.pixel.u_left, m.pixel.v),
                success_probability: 1.0,
                available_distance: 0.0,
            })
            .collect();

        Ok(SelectionContext {
            state_covariance: warm.state_covariance.clone(),
            poses_at_future_keyframes,
            tracked_points: tracked.points_camera.clone(),
            tracked_point_life,
            body_pose_left_cam: left_cam.body_pose_cam.clone(),
            body_pose_right_cam: right_cam.body_pose_cam.clone(),
            left_intrinsics: left_cam.intrinsics,
            right_intrinsics: right_cam.intrinsics,
            candidates,
            lazy_evaluation: self.lazy_evaluation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::types::{StereoPixel, TrackId};
    use crate::io::NavState;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use std::collections::HashSet;

    /// Ground truth moving 1 m/s along +x, identity rotation.
    struct LinearMotionGt;

    impl GroundTruthProvider for LinearMotionGt {
        fn state_at(&self, timestamp_ns: u64) -> Result<NavState, FrontendError> {
            let t = timestamp_ns as f64 * 1e-9;
            Ok(NavState {
                pose: SE3::new(
                    UnitQuaternion::identity(),
                    Vector3::new(t, 0.0, 0.0),
                ),
                velocity: Vector3::new(1.0, 0.0, 0.0),
                bias: crate::imu::ImuBias::zero(),
            })
        }
    }

    /// Selector that records the context it was handed.
    #[derive(Default)]
    struct RecordingSelector {
        last_context: Option<SelectionContext>,
        answer: Vec<usize>,
    }

    impl FeatureSelector for RecordingSelector {
        fn select(
            &mut self,
            context: &SelectionContext,
            _needed: usize,
            _criterion: SelectionCriterion,
        ) -> Result<SelectionOutcome, FrontendError> {
            self.last_context = Some(context.clone());
            Ok(SelectionOutcome {
                corners: context.candidates.iter().map(|c| c.pixel).collect(),
                selected_indices: self.answer.clone(),
                selected_gains: vec![1.0; self.answer.len()],
            })
        }
    }

    /// Selector that must never be consulted.
    struct UnreachableSelector;

    impl FeatureSelector for UnreachableSelector {
        fn select(
            &mut self,
            _context: &SelectionContext,
            _needed: usize,
            _criterion: SelectionCriterion,
        ) -> Result<SelectionOutcome, FrontendError> {
            panic!("selector must not be consulted on this path");
        }
    }

    fn params(criterion: SelectionCriterion) -> FrontendParams {
        FrontendParams {
            max_features_per_frame: 20,
            max_feature_age: 25,
            intra_keyframe_s: 0.4,
            selection_horizon_s: 2.0,
            criterion,
            lazy_evaluation: true,
        }
    }

    fn cam_info() -> CameraInfo {
        CameraInfo {
            body_pose_cam: SE3::identity(),
            intrinsics: CameraModel::new(400.0, 400.0, 320.0, 240.0),
        }
    }

    fn candidates(n: usize) -> Vec<StereoMeasurement> {
        (0..n)
            .map(|i| StereoMeasurement {
                track_id: TrackId(100 + i as u64),
                pixel: StereoPixel {
                    u_left: 10.0 * i as f64,
                    u_right: None,
                    v: 5.0 * i as f64,
                },
            })
            .collect()
    }

    fn tracked(n: usize) -> TrackedFeatures {
        TrackedFeatures {
            measurements: candidates(n),
            points_camera: vec![Vector3::new(0.0, 0.0, 3.0); n],
            ages: vec![1; n],
        }
    }

    fn warm() -> WarmState {
        WarmState {
            state_covariance: DMatrix::identity(15, 15),
            pose_estimate: SE3::new(
                UnitQuaternion::from_euler_angles(0.0, 0.0, 0.3),
                Vector3::new(5.0, 1.0, 0.0),
            ),
            gt_pose_prev: SE3::new(
                UnitQuaternion::identity(),
                Vector3::new(4.9, 0.0, 0.0),
            ),
        }
    }

    #[test]
    fn test_under_budget_passes_through_in_order() {
        // maxFeaturesPerFrame = 20, tracked = 15, candidates = 3:
        // needed = 5 >= 3, all candidates returned untouched.
        let mut dispatcher = BudgetDispatcher::new(&params(SelectionCriterion::Quality), 0);
        let cands = candidates(3);
        let out = dispatcher
            .select(
                0,
                &tracked(15),
                cands.clone(),
                None,
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut UnreachableSelector,
            )
            .unwrap();
        assert_eq!(out, cands);
    }

    #[test]
    fn test_cold_start_samples_randomly_without_context() {
        // 10 candidates, needed = 4: exactly 4 come back, all from the
        // original set, and no selector/context work happens.
        let mut dispatcher = BudgetDispatcher::new(&params(SelectionCriterion::MinEig), 0);
        let cands = candidates(10);
        let pool: HashSet<TrackId> = cands.iter().map(|m| m.track_id).collect();
        let out = dispatcher
            .select(
                0,
                &tracked(16),
                cands,
                None,
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut UnreachableSelector,
            )
            .unwrap();
        assert_eq!(out.len(), 4);
        let chosen: HashSet<TrackId> = out.iter().map(|m| m.track_id).collect();
        assert_eq!(chosen.len(), 4);
        assert!(chosen.is_subset(&pool));
    }

    #[test]
    fn test_random_subset_reproducible_for_same_seed() {
        let run = |seed: u64| {
            let mut d = BudgetDispatcher::new(&params(SelectionCriterion::Quality), seed);
            d.select(
                0,
                &tracked(16),
                candidates(10),
                None,
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut UnreachableSelector,
            )
            .unwrap()
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn test_quality_criterion_ignores_warm_state() {
        let mut dispatcher = BudgetDispatcher::new(&params(SelectionCriterion::Quality), 0);
        let w = warm();
        let out = dispatcher
            .select(
                0,
                &tracked(16),
                candidates(10),
                Some(&w),
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut UnreachableSelector,
            )
            .unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_warm_selection_builds_context_and_applies_indices() {
        let mut dispatcher = BudgetDispatcher::new(&params(SelectionCriterion::MinEig), 0);
        let mut selector = RecordingSelector {
            last_context: None,
            answer: vec![7, 2],
        };
        let w = warm();
        let timestamp_ns = 5_000_000_000;
        let cands = candidates(10);
        let out = dispatcher
            .select(
                timestamp_ns,
                &tracked(16),
                cands.clone(),
                Some(&w),
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut selector,
            )
            .unwrap();

        // Selector's answer applied as-is, even though needed = 4.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], cands[7]);
        assert_eq!(out[1], cands[2]);

        let ctx = selector.last_context.unwrap();
        // round(2.0 / 0.4) = 5 horizon steps, plus the current one.
        assert_eq!(ctx.poses_at_future_keyframes.len(), 6);
        // First predicted pose: estimate composed with gt motion from the
        // previous keyframe (4.9 -> 5.0 along x, rotated by the estimate's
        // yaw).
        let rel = w.gt_pose_prev.between(
            &LinearMotionGt.state_at(timestamp_ns).unwrap().pose,
        );
        let expected = w.pose_estimate.compose(&rel);
        assert_relative_eq!(
            ctx.poses_at_future_keyframes[0].pose.translation,
            expected.translation,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            ctx.poses_at_future_keyframes[0].timestamp_s,
            5.0,
            epsilon = 1e-9
        );
        // Remaining life is max age minus current age.
        assert!(ctx.tracked_point_life.iter().all(|&l| l == 24));
        assert_eq!(ctx.tracked_points.len(), 16);
        // Simulation defaults for candidate side data.
        assert_eq!(ctx.candidates.len(), 10);
        assert!(ctx
            .candidates
            .iter()
            .all(|c| c.success_probability == 1.0 && c.available_distance == 0.0));
    }

    #[test]
    fn test_zero_horizon_still_contains_current_pose() {
        let mut p = params(SelectionCriterion::LogDet);
        p.selection_horizon_s = 0.0;
        let mut dispatcher = BudgetDispatcher::new(&p, 0);
        let mut selector = RecordingSelector {
            last_context: None,
            answer: vec![0],
        };
        dispatcher
            .select(
                1_000_000_000,
                &tracked(16),
                candidates(10),
                Some(&warm()),
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut selector,
            )
            .unwrap();
        let ctx = selector.last_context.unwrap();
        assert_eq!(ctx.poses_at_future_keyframes.len(), 1);
    }

    #[test]
    fn test_mismatched_tracked_arrays_are_fatal() {
        let mut dispatcher = BudgetDispatcher::new(&params(SelectionCriterion::MinEig), 0);
        let mut bad = tracked(16);
        bad.ages.pop();
        let err = dispatcher
            .select(
                0,
                &bad,
                candidates(10),
                Some(&warm()),
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut RecordingSelector::default(),
            )
            .unwrap_err();
        assert!(matches!(err, FrontendError::DataInconsistency(_)));
    }

    #[test]
    fn test_out_of_range_selector_index_is_fatal() {
        let mut dispatcher = BudgetDispatcher::new(&params(SelectionCriterion::MinEig), 0);
        let mut selector = RecordingSelector {
            last_context: None,
            answer: vec![99],
        };
        let err = dispatcher
            .select(
                0,
                &tracked(16),
                candidates(10),
                Some(&warm()),
                &LinearMotionGt,
                &cam_info(),
                &cam_info(),
                &mut selector,
            )
            .unwrap_err();
        assert!(matches!(err, FrontendError::DataInconsistency(_)));
    }

    #[test]
    fn test_passthrough_selector_respects_needed() {
        let ctx = SelectionContext {
            state_covariance: DMatrix::identity(3, 3),
            poses_at_future_keyframes: vec![],
            tracked_points: vec![],
            tracked_point_life: vec![],
            body_pose_left_cam: SE3::identity(),
            body_pose_right_cam: SE3::identity(),
            left_intrinsics: CameraModel::new(1.0, 1.0, 0.0, 0.0),
            right_intrinsics: CameraModel::new(1.0, 1.0, 0.0, 0.0),
            candidates: (0..5)
                .map(|i| CandidateCorner {
                    pixel: Vector2::new(i as f64, 0.0),
                    success_probability: 1.0,
                    available_distance: 0.0,
                })
                .collect(),
            lazy_evaluation: true,
        };
        let outcome = PassthroughSelector
            .select(&ctx, 3, SelectionCriterion::MinEig)
            .unwrap();
        assert_eq!(outcome.selected_indices, vec![0, 1, 2]);
        assert_eq!(outcome.selected_gains.len(), 3);
    }
}
