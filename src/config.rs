//! Run configuration for the simulated front end.

use serde::Deserialize;

use crate::error::FrontendError;
use crate::frontend::measurement::PixelNoise;
use crate::frontend::selection::SelectionCriterion;
use crate::imu::ImuNoise;

/// Minimum warm-up window (keyframes of IMU data before processing
/// starts). A shorter window leaves the IMU bias estimate unbounded.
pub const MIN_WARMUP_KEYFRAMES: usize = 10;

/// Front-end tracker/selector parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrontendParams {
    /// Feature budget per keyframe (tracked + newly selected).
    pub max_features_per_frame: usize,
    /// Maximum consecutive keyframes a track may live before retirement.
    pub max_feature_age: u32,
    /// Nominal time between keyframes, seconds.
    pub intra_keyframe_s: f64,
    /// Look-ahead for information-based selection, seconds.
    pub selection_horizon_s: f64,
    pub criterion: SelectionCriterion,
    /// Lazy evaluation inside the external selector.
    pub lazy_evaluation: bool,
}

impl Default for FrontendParams {
    fn default() -> Self {
        Self {
            max_features_per_frame: 20,
            max_feature_age: 25,
            intra_keyframe_s: 0.4,
            selection_horizon_s: 3.0,
            criterion: SelectionCriterion::Quality,
            lazy_evaluation: true,
        }
    }
}

impl FrontendParams {
    pub fn validate(&self) -> Result<(), FrontendError> {
        if self.max_features_per_frame == 0 {
            return Err(FrontendError::Configuration(
                "max_features_per_frame must be positive".into(),
            ));
        }
        if self.intra_keyframe_s <= 0.0 {
            return Err(FrontendError::Configuration(format!(
                "intra_keyframe_s must be positive, got {}",
                self.intra_keyframe_s
            )));
        }
        if self.selection_horizon_s < 0.0 {
            return Err(FrontendError::Configuration(format!(
                "selection_horizon_s must be non-negative, got {}",
                self.selection_horizon_s
            )));
        }
        Ok(())
    }
}

/// Measurement noise switches for the whole run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Master switch: disables both pixel and inertial noise.
    pub enabled: bool,
    /// Pixel noise sigma applied to left-u and v.
    pub pixel_sigma: f64,
    pub imu: ImuNoise,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            enabled: true,
            pixel_sigma: 1.0,
            imu: ImuNoise::default(),
        }
    }
}

impl NoiseParams {
    pub fn pixel(&self) -> PixelNoise {
        PixelNoise {
            enabled: self.enabled,
            sigma: self.pixel_sigma,
        }
    }

    pub fn validate(&self) -> Result<(), FrontendError> {
        if self.pixel_sigma < 0.0 {
            return Err(FrontendError::Configuration(format!(
                "pixel_sigma must be non-negative, got {}",
                self.pixel_sigma
            )));
        }
        Ok(())
    }
}

/// Simulation run parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Seed for all front-end randomness.
    pub seed: u64,
    /// Keyframes of IMU data consumed before the first processed
    /// keyframe, used for bias initialization.
    pub warmup_keyframes: usize,
    /// Keyframes left unprocessed at the end of the sequence, so the
    /// selector never queries poses beyond the trajectory.
    pub trailing_keyframes: usize,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            seed: 0,
            warmup_keyframes: 10,
            trailing_keyframes: 10,
        }
    }
}

impl SimParams {
    pub fn validate(&self) -> Result<(), FrontendError> {
        if self.warmup_keyframes < MIN_WARMUP_KEYFRAMES {
            return Err(FrontendError::Configuration(format!(
                "warm-up window of {} keyframes is too short to bound IMU bias \
                 initialization (minimum {})",
                self.warmup_keyframes, MIN_WARMUP_KEYFRAMES
            )));
        }
        Ok(())
    }
}
