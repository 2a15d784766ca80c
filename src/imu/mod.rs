//! Inertial data types and the interpolating measurement buffer.

pub mod buffer;
pub mod sample;

pub use buffer::{corrupt_measurements, ImuBuffer};
pub use sample::{ImuBias, ImuNoise, ImuSample, GRAVITY};
