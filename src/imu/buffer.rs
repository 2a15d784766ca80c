//! Inertial measurement buffer with boundary interpolation.
//!
//! The keyframe loop asks for all samples between two keyframe timestamps.
//! Matching the estimator's expected format, samples come back as a 6xN
//! matrix with accelerometer readings in rows 0..3 and gyroscope readings
//! in rows 3..6, plus the matching timestamps. The first and last columns
//! are linearly interpolated at exactly t0 and t1 so consecutive queries
//! tile the timeline without gaps.

use nalgebra::{Matrix6xX, Vector3, Vector6};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::FrontendError;

use super::sample::{ImuNoise, ImuSample};

/// Time-ordered IMU sample buffer.
#[derive(Debug, Clone)]
pub struct ImuBuffer {
    samples: Vec<ImuSample>,
    pub rate_hz: f64,
}

impl ImuBuffer {
    /// Build from time-ordered samples. Ordering is the caller's contract;
    /// a violation shows up as an interpolation failure later.
    pub fn new(samples: Vec<ImuSample>, rate_hz: f64) -> Self {
        Self { samples, rate_hz }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples in (t0, t1), with interpolated boundary samples at
    /// exactly t0 and t1 prepended/appended.
    pub fn interpolated_between(
        &self,
        t0_ns: u64,
        t1_ns: u64,
    ) -> Result<(Vec<u64>, Matrix6xX<f64>), FrontendError> {
        if t0_ns >= t1_ns {
            return Err(FrontendError::DataInconsistency(format!(
                "IMU query interval is empty: t0 = {} >= t1 = {}",
                t0_ns, t1_ns
            )));
        }

        let mut stamps = vec![t0_ns];
        let mut columns = vec![self.value_at(t0_ns)?];
        for s in &self.samples {
            if s.timestamp_ns > t0_ns && s.timestamp_ns < t1_ns {
                stamps.push(s.timestamp_ns);
                columns.push(stack_accgyr(&s.accel, &s.gyro));
            }
        }
        stamps.push(t1_ns);
        columns.push(self.value_at(t1_ns)?);

        Ok((stamps, Matrix6xX::from_columns(&columns)))
    }

    /// Linearly interpolated [accel; gyro] at an arbitrary timestamp
    /// inside the buffered range.
    fn value_at(&self, t_ns: u64) -> Result<Vector6<f64>, FrontendError> {
        let first = self.samples.first();
        let last = self.samples.last();
        match (first, last) {
            (Some(first), Some(last))
                if first.timestamp_ns <= t_ns && t_ns <= last.timestamp_ns => {}
            _ => {
                return Err(FrontendError::DataInconsistency(format!(
                    "IMU timestamp {} outside buffered range",
                    t_ns
                )));
            }
        }

        let hi = self.samples.partition_point(|s| s.timestamp_ns < t_ns);
        let upper = &self.samples[hi.min(self.samples.len() - 1)];
        if upper.timestamp_ns == t_ns || hi == 0 {
            return Ok(stack_accgyr(&upper.accel, &upper.gyro));
        }
        let lower = &self.samples[hi - 1];
        let span = (upper.timestamp_ns - lower.timestamp_ns) as f64;
        let alpha = (t_ns - lower.timestamp_ns) as f64 / span;
        let accel = lower.accel.lerp(&upper.accel, alpha);
        let gyro = lower.gyro.lerp(&upper.gyro, alpha);
        Ok(stack_accgyr(&accel, &gyro))
    }
}

fn stack_accgyr(accel: &Vector3<f64>, gyro: &Vector3<f64>) -> Vector6<f64> {
    Vector6::new(accel.x, accel.y, accel.z, gyro.x, gyro.y, gyro.z)
}

/// Add zero-mean Gaussian noise to an interpolated sample block, with
/// discrete sigmas `density * sqrt(rate_hz)` per axis.
pub fn corrupt_measurements<R: Rng>(
    samples: &mut Matrix6xX<f64>,
    noise: &ImuNoise,
    rate_hz: f64,
    rng: &mut R,
) -> Result<(), FrontendError> {
    let acc_sigma = noise.acc_noise_density * rate_hz.sqrt();
    let gyro_sigma = noise.gyro_noise_density * rate_hz.sqrt();
    let acc_dist = Normal::new(0.0, acc_sigma).map_err(|e| {
        FrontendError::Configuration(format!("invalid accelerometer noise sigma: {}", e))
    })?;
    let gyro_dist = Normal::new(0.0, gyro_sigma).map_err(|e| {
        FrontendError::Configuration(format!("invalid gyroscope noise sigma: {}", e))
    })?;

    for col in 0..samples.ncols() {
        for row in 0..3 {
            samples[(row, col)] += acc_dist.sample(rng);
            samples[(3 + row, col)] += gyro_dist.sample(rng);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn buffer() -> ImuBuffer {
        let samples = (0..=10)
            .map(|i| ImuSample {
                timestamp_ns: i * 100,
                accel: Vector3::new(i as f64, 0.0, 0.0),
                gyro: Vector3::new(0.0, i as f64, 0.0),
            })
            .collect();
        ImuBuffer::new(samples, 200.0)
    }

    #[test]
    fn test_interpolated_between_includes_boundaries() {
        let (stamps, mat) = buffer().interpolated_between(150, 450).unwrap();
        assert_eq!(stamps, vec![150, 200, 300, 400, 450]);
        assert_eq!(mat.ncols(), 5);
        // Boundary columns are linearly interpolated
        assert_relative_eq!(mat[(0, 0)], 1.5, epsilon = 1e-12);
        assert_relative_eq!(mat[(4, 4)], 4.5, epsilon = 1e-12);
        // Interior columns are exact samples
        assert_relative_eq!(mat[(0, 2)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolated_between_exact_boundaries() {
        let (stamps, mat) = buffer().interpolated_between(200, 400).unwrap();
        assert_eq!(stamps, vec![200, 300, 400]);
        assert_relative_eq!(mat[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(mat[(0, 2)], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_interval_rejected() {
        assert!(buffer().interpolated_between(300, 300).is_err());
        assert!(buffer().interpolated_between(400, 300).is_err());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(buffer().interpolated_between(500, 2000).is_err());
    }

    #[test]
    fn test_corrupt_measurements_deterministic() {
        let (_, clean) = buffer().interpolated_between(100, 500).unwrap();
        let noise = ImuNoise::default();

        let mut a = clean.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        corrupt_measurements(&mut a, &noise, 200.0, &mut rng).unwrap();

        let mut b = clean.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        corrupt_measurements(&mut b, &noise, 200.0, &mut rng).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, clean);
    }
}
