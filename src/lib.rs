pub mod config;
pub mod error;
pub mod estimator;
pub mod frontend;
pub mod geometry;
pub mod imu;
pub mod io;
pub mod system;
