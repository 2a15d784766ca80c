//! Simulated dataset parsing (EuRoC directory layout).
//!
//! Expects the dataset root (the `mav0` directory) to contain:
//! - `landmarks.csv`: ground-truth landmark positions (id, x, y, z)
//! - `cam0_tracks.csv`: per-keyframe feature observations
//!   (timestamp, landmark id, u, v, sigma), rows grouped by timestamp
//! - `imu0/data.csv` and `imu0/sensor.yaml`: inertial samples and rate
//! - `state_groundtruth_estimate0/data.csv`: ground-truth states
//! - `cam0/sensor.yaml`, `cam1/sensor.yaml`: extrinsics and intrinsics

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use nalgebra::{Matrix4, Vector2, Vector3};
use serde::Deserialize;
use tracing::info;

use crate::error::FrontendError;
use crate::frontend::types::{FeatureObservation, LandmarkId};
use crate::geometry::{CameraInfo, CameraModel, SE3};
use crate::imu::{ImuBias, ImuBuffer, ImuSample};

use super::{GroundTruthProvider, NavState};

pub const LEFT_CAMERA: &str = "cam0";
pub const RIGHT_CAMERA: &str = "cam1";

/// One row of the ground-truth state table.
#[derive(Debug, Clone)]
pub struct GroundTruthEntry {
    pub timestamp_ns: u64,
    pub pose: SE3,
    pub velocity: Vector3<f64>,
    pub gyro_bias: Vector3<f64>,
    pub accel_bias: Vector3<f64>,
}

/// Parsed simulated dataset.
#[derive(Debug)]
pub struct SimDataset {
    pub landmarks: HashMap<LandmarkId, Vector3<f64>>,
    /// Keyframe timestamps in the order they appear in the track table.
    pub keyframe_timestamps: Vec<u64>,
    pub observations: HashMap<u64, Vec<FeatureObservation>>,
    pub groundtruth: Vec<GroundTruthEntry>,
    pub imu: ImuBuffer,
    pub cameras: HashMap<String, CameraInfo>,
}

impl SimDataset {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let landmarks = parse_landmarks(open(root.join("landmarks.csv"))?)
            .context("failed to parse landmarks.csv")?;
        let (keyframe_timestamps, observations) =
            parse_feature_tracks(open(root.join("cam0_tracks.csv"))?)
                .context("failed to parse cam0_tracks.csv")?;
        let groundtruth =
            parse_groundtruth(open(root.join("state_groundtruth_estimate0/data.csv"))?)
                .context("failed to parse ground truth")?;

        let imu_samples = parse_imu(open(root.join("imu0/data.csv"))?)
            .context("failed to parse imu0/data.csv")?;
        let imu_rate = load_imu_rate(&root.join("imu0/sensor.yaml"))?;
        let imu = ImuBuffer::new(imu_samples, imu_rate);

        let mut cameras = HashMap::new();
        for name in [LEFT_CAMERA, RIGHT_CAMERA] {
            let yaml = root.join(name).join("sensor.yaml");
            cameras.insert(name.to_string(), load_camera_info(&yaml)?);
        }

        info!(
            n_landmarks = landmarks.len(),
            n_keyframes = keyframe_timestamps.len(),
            n_imu = imu.len(),
            n_groundtruth = groundtruth.len(),
            imu_rate,
            "loaded simulated dataset from {}",
            root.display()
        );

        Ok(Self {
            landmarks,
            keyframe_timestamps,
            observations,
            groundtruth,
            imu,
            cameras,
        })
    }

    pub fn num_keyframes(&self) -> usize {
        self.keyframe_timestamps.len()
    }

    /// Observations recorded at a keyframe timestamp, empty if none.
    pub fn observations_at(&self, timestamp_ns: u64) -> &[FeatureObservation] {
        self.observations
            .get(&timestamp_ns)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn camera_info(&self, name: &str) -> Result<&CameraInfo, FrontendError> {
        self.cameras.get(name).ok_or_else(|| {
            FrontendError::Configuration(format!("no calibration for camera {:?}", name))
        })
    }

    /// Largest landmark id in the dataset; fresh track ids are minted
    /// strictly above this.
    pub fn max_landmark_id(&self) -> u64 {
        self.landmarks.keys().map(|l| l.0).max().unwrap_or(0)
    }
}

impl GroundTruthProvider for SimDataset {
    /// Linear interpolation between the two bracketing state entries.
    fn state_at(&self, timestamp_ns: u64) -> Result<NavState, FrontendError> {
        let (first, last) = match (self.groundtruth.first(), self.groundtruth.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(FrontendError::DataInconsistency(
                    "ground truth table is empty".into(),
                ))
            }
        };
        if timestamp_ns < first.timestamp_ns || timestamp_ns > last.timestamp_ns {
            return Err(FrontendError::DataInconsistency(format!(
                "ground truth query {} outside trajectory [{}, {}]",
                timestamp_ns, first.timestamp_ns, last.timestamp_ns
            )));
        }

        let hi = self
            .groundtruth
            .partition_point(|e| e.timestamp_ns < timestamp_ns);
        let upper = &self.groundtruth[hi.min(self.groundtruth.len() - 1)];
        if upper.timestamp_ns == timestamp_ns || hi == 0 {
            return Ok(nav_state(upper));
        }
        let lower = &self.groundtruth[hi - 1];
        let span = (upper.timestamp_ns - lower.timestamp_ns) as f64;
        let alpha = (timestamp_ns - lower.timestamp_ns) as f64 / span;
        Ok(NavState {
            pose: lower.pose.interpolate(&upper.pose, alpha),
            velocity: lower.velocity.lerp(&upper.velocity, alpha),
            bias: ImuBias {
                gyro: lower.gyro_bias.lerp(&upper.gyro_bias, alpha),
                accel: lower.accel_bias.lerp(&upper.accel_bias, alpha),
            },
        })
    }
}

fn nav_state(entry: &GroundTruthEntry) -> NavState {
    NavState {
        pose: entry.pose.clone(),
        velocity: entry.velocity,
        bias: ImuBias {
            gyro: entry.gyro_bias,
            accel: entry.accel_bias,
        },
    }
}

fn open(path: PathBuf) -> Result<File> {
    File::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn parse_landmarks<R: Read>(reader: R) -> Result<HashMap<LandmarkId, Vector3<f64>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut landmarks = HashMap::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() < 4 {
            continue;
        }
        let id: u64 = rec[0].trim().parse()?;
        let position = Vector3::new(
            rec[1].trim().parse()?,
            rec[2].trim().parse()?,
            rec[3].trim().parse()?,
        );
        landmarks.insert(LandmarkId(id), position);
    }
    Ok(landmarks)
}

type FeatureTable = (Vec<u64>, HashMap<u64, Vec<FeatureObservation>>);

fn parse_feature_tracks<R: Read>(reader: R) -> Result<FeatureTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut timestamps = Vec::new();
    let mut observations: HashMap<u64, Vec<FeatureObservation>> = HashMap::new();
    let mut last_timestamp = None;
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() < 5 {
            continue;
        }
        let ts: u64 = rec[0].trim().parse()?;
        let landmark_id = LandmarkId(rec[1].trim().parse()?);
        let pixel = Vector2::new(rec[2].trim().parse()?, rec[3].trim().parse()?);
        let sigma: f64 = rec[4].trim().parse()?;

        // Rows grouped by timestamp define the keyframe sequence.
        if last_timestamp != Some(ts) {
            timestamps.push(ts);
        }
        observations.entry(ts).or_default().push(FeatureObservation {
            landmark_id,
            pixel,
            sigma,
        });
        last_timestamp = Some(ts);
    }
    Ok((timestamps, observations))
}

fn parse_imu<R: Read>(reader: R) -> Result<Vec<ImuSample>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut samples = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() < 7 {
            continue;
        }
        let ts: u64 = rec[0].trim().parse()?;
        // EuRoC order: gyro first, then accel
        let gyro = Vector3::new(
            rec[1].trim().parse()?,
            rec[2].trim().parse()?,
            rec[3].trim().parse()?,
        );
        let accel = Vector3::new(
            rec[4].trim().parse()?,
            rec[5].trim().parse()?,
            rec[6].trim().parse()?,
        );
        samples.push(ImuSample {
            timestamp_ns: ts,
            accel,
            gyro,
        });
    }
    Ok(samples)
}

fn parse_groundtruth<R: Read>(reader: R) -> Result<Vec<GroundTruthEntry>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        // timestamp, p_xyz, q_wxyz, v_xyz, gyro bias xyz, accel bias xyz
        if rec.len() < 17 {
            continue;
        }
        let ts: u64 = rec[0].trim().parse()?;
        let position = Vector3::new(
            rec[1].trim().parse()?,
            rec[2].trim().parse()?,
            rec[3].trim().parse()?,
        );
        let qw: f64 = rec[4].trim().parse()?;
        let qx: f64 = rec[5].trim().parse()?;
        let qy: f64 = rec[6].trim().parse()?;
        let qz: f64 = rec[7].trim().parse()?;
        let velocity = Vector3::new(
            rec[8].trim().parse()?,
            rec[9].trim().parse()?,
            rec[10].trim().parse()?,
        );
        let gyro_bias = Vector3::new(
            rec[11].trim().parse()?,
            rec[12].trim().parse()?,
            rec[13].trim().parse()?,
        );
        let accel_bias = Vector3::new(
            rec[14].trim().parse()?,
            rec[15].trim().parse()?,
            rec[16].trim().parse()?,
        );
        entries.push(GroundTruthEntry {
            timestamp_ns: ts,
            pose: SE3::from_quaternion(qw, qx, qy, qz, position),
            velocity,
            gyro_bias,
            accel_bias,
        });
    }
    Ok(entries)
}

/// EuRoC T_BS transform block: cols, rows, data fields.
#[derive(Debug, Deserialize)]
struct TransformYaml {
    data: Vec<f64>,
}

/// EuRoC camera sensor.yaml.
#[derive(Debug, Deserialize)]
struct CameraYaml {
    #[serde(rename = "T_BS")]
    t_bs: TransformYaml,
    /// [fx, fy, cx, cy]
    intrinsics: Vec<f64>,
}

/// EuRoC IMU sensor.yaml (only the rate is needed).
#[derive(Debug, Deserialize)]
struct ImuYaml {
    rate_hz: f64,
}

fn load_camera_info(path: &Path) -> Result<CameraInfo> {
    let yaml: CameraYaml = serde_yaml::from_reader(
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
    )
    .with_context(|| format!("failed to parse {}", path.display()))?;

    if yaml.intrinsics.len() != 4 {
        bail!(
            "expected 4 intrinsics [fx, fy, cx, cy] in {}, got {}",
            path.display(),
            yaml.intrinsics.len()
        );
    }
    if yaml.t_bs.data.len() != 16 {
        bail!(
            "expected 16-element T_BS in {}, got {}",
            path.display(),
            yaml.t_bs.data.len()
        );
    }

    Ok(CameraInfo {
        body_pose_cam: SE3::from_matrix(Matrix4::from_row_slice(&yaml.t_bs.data)),
        intrinsics: CameraModel::new(
            yaml.intrinsics[0],
            yaml.intrinsics[1],
            yaml.intrinsics[2],
            yaml.intrinsics[3],
        ),
    })
}

fn load_imu_rate(path: &Path) -> Result<f64> {
    let yaml: ImuYaml = serde_yaml::from_reader(
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
    )
    .with_context(|| format!("failed to parse {}", path.display()))?;
    if yaml.rate_hz <= 0.0 {
        bail!("imu rate_hz must be positive, got {}", yaml.rate_hz);
    }
    Ok(yaml.rate_hz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_landmarks() {
        let csv = "id,x,y,z\n0,1.0,2.0,3.0\n5,-1.5,0.0,4.0\n";
        let landmarks = parse_landmarks(csv.as_bytes()).unwrap();
        assert_eq!(landmarks.len(), 2);
        assert_relative_eq!(
            landmarks[&LandmarkId(5)],
            Vector3::new(-1.5, 0.0, 4.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_parse_feature_tracks_groups_by_timestamp() {
        let csv = "timestamp,landmark_id,x,y,sigma\n\
                   1000,0,10.0,20.0,1.0\n\
                   1000,1,30.0,40.0,1.0\n\
                   2000,0,11.0,21.0,1.0\n";
        let (timestamps, obs) = parse_feature_tracks(csv.as_bytes()).unwrap();
        assert_eq!(timestamps, vec![1000, 2000]);
        assert_eq!(obs[&1000].len(), 2);
        assert_eq!(obs[&2000].len(), 1);
        assert_eq!(obs[&1000][1].landmark_id, LandmarkId(1));
        assert_relative_eq!(obs[&2000][0].pixel, Vector2::new(11.0, 21.0));
    }

    #[test]
    fn test_parse_imu_column_order() {
        let csv = "#timestamp,w_x,w_y,w_z,a_x,a_y,a_z\n\
                   100,0.1,0.2,0.3,9.0,0.0,-1.0\n";
        let samples = parse_imu(csv.as_bytes()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_relative_eq!(samples[0].gyro, Vector3::new(0.1, 0.2, 0.3));
        assert_relative_eq!(samples[0].accel, Vector3::new(9.0, 0.0, -1.0));
    }

    #[test]
    fn test_groundtruth_interpolation() {
        let csv = "\
            1000,0.0,0.0,0.0,1.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,0.0,0.0,0.1,0.0,0.0\n\
            2000,2.0,0.0,0.0,1.0,0.0,0.0,0.0,3.0,0.0,0.0,0.0,0.0,0.0,0.3,0.0,0.0\n";
        let entries = parse_groundtruth(csv.as_bytes()).unwrap();
        let dataset = SimDataset {
            landmarks: HashMap::new(),
            keyframe_timestamps: vec![],
            observations: HashMap::new(),
            groundtruth: entries,
            imu: ImuBuffer::new(vec![], 200.0),
            cameras: HashMap::new(),
        };

        let mid = dataset.state_at(1500).unwrap();
        assert_relative_eq!(mid.pose.translation, Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(mid.velocity, Vector3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(mid.bias.accel, Vector3::new(0.2, 0.0, 0.0));

        let exact = dataset.state_at(2000).unwrap();
        assert_relative_eq!(exact.pose.translation, Vector3::new(2.0, 0.0, 0.0));

        assert!(dataset.state_at(500).is_err());
        assert!(dataset.state_at(2500).is_err());
    }
}
