//! The simulated front end core: track lifecycle, measurement synthesis
//! and budget-constrained feature selection.

pub mod measurement;
pub mod selection;
pub mod track;
pub mod types;

pub use measurement::{synthesize, PixelNoise, REPROJECTION_TOLERANCE_PX};
pub use selection::{
    BudgetDispatcher, FeatureSelector, PassthroughSelector, SelectionContext,
    SelectionCriterion, SelectionOutcome, StampedPose, TrackedFeatures, WarmState,
};
pub use track::{TrackLifecycle, TrackUpdate};
pub use types::{FeatureObservation, LandmarkId, StereoMeasurement, StereoPixel, TrackId};
