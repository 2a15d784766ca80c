//! Fatal error categories for the simulated front end.
//!
//! There are exactly two: a data inconsistency (mismatched measurement
//! conventions, parallel arrays of different lengths) and a configuration
//! error. Neither is recoverable; core components return them upward and
//! the keyframe loop decides to terminate the run.

use thiserror::Error;

/// Unrecoverable front-end failure.
///
/// Every downstream measurement depends on correct track identity and
/// projected geometry, so any violation invalidates the remainder of the
/// simulated run. There is no retry and no degraded mode.
#[derive(Debug, Error)]
pub enum FrontendError {
    /// Input data contradicts the configured sensor/projection conventions
    /// or an internal parallel-array invariant.
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    /// Parameters that cannot produce a meaningful run.
    #[error("configuration error: {0}")]
    Configuration(String),
}
