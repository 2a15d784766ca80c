//! Keyframe-sequential simulation driver.

pub mod pipeline;

pub use pipeline::{KeyframeSummary, RunSummary, SimulationPipeline};
