//! Core ID and measurement types for the simulated front end.

use nalgebra::Vector2;

/// Stable identifier of a ground-truth landmark, issued by the dataset.
///
/// Immutable once parsed; the front end never mints these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LandmarkId(pub u64);

impl std::fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Identifier currently labeling a landmark's observations in outgoing
/// measurements.
///
/// Starts equal to the landmark id and diverges after a retirement event.
/// Unique among live tracks; a retired id is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Raw per-keyframe observation of one landmark, as parsed from the
/// simulated feature-track table.
#[derive(Debug, Clone)]
pub struct FeatureObservation {
    pub landmark_id: LandmarkId,
    pub pixel: Vector2<f64>,
    /// Measurement uncertainty reported by the simulator.
    pub sigma: f64,
}

/// Stereo pixel triple (left-u, right-u, v).
///
/// `u_right` is always `None` in this harness: no right-camera synthesis
/// is performed, emulating a monocular-only front end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoPixel {
    pub u_left: f64,
    pub u_right: Option<f64>,
    pub v: f64,
}

/// One labeled measurement handed to the estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoMeasurement {
    pub track_id: TrackId,
    pub pixel: StereoPixel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", LandmarkId(42)), "L42");
        assert_eq!(format!("{}", TrackId(7)), "T7");
    }

    #[test]
    fn test_track_id_as_set_member() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(TrackId(1));
        set.insert(TrackId(2));
        assert!(set.contains(&TrackId(1)));
        assert!(!set.contains(&TrackId(3)));
    }
}
