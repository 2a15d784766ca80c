use nalgebra::Vector3;
use serde::Deserialize;

/// Gravity vector in world frame (m/s^2).
pub const GRAVITY: Vector3<f64> = Vector3::new(0.0, 0.0, -9.81);

/// IMU continuous-time noise densities.
///
/// The discrete 1-sigma used when corrupting samples is
/// `density * sqrt(rate_hz)`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ImuNoise {
    pub gyro_noise_density: f64,
    pub acc_noise_density: f64,
}

impl Default for ImuNoise {
    fn default() -> Self {
        Self {
            // Approximate EuRoC noise values
            gyro_noise_density: 1.7e-4,
            acc_noise_density: 2.0e-3,
        }
    }
}

/// IMU biases.
#[derive(Debug, Clone, Copy)]
pub struct ImuBias {
    pub gyro: Vector3<f64>,
    pub accel: Vector3<f64>,
}

impl ImuBias {
    pub fn zero() -> Self {
        Self {
            gyro: Vector3::zeros(),
            accel: Vector3::zeros(),
        }
    }
}

/// Single IMU measurement.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    pub timestamp_ns: u64,
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
}
