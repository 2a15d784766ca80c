//! SE(3) rigid body transform, stored as unit quaternion + translation.

use nalgebra::{Matrix4, Rotation3, UnitQuaternion, Vector3};

/// A rigid body transform T = (R, t).
///
/// We use the notation `T_target_source`: composing a pose `T_world_body`
/// with `T_body_cam` yields the camera pose in the world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build from a w-first quaternion (EuRoC ground truth convention).
    pub fn from_quaternion(qw: f64, qx: f64, qy: f64, qz: f64, translation: Vector3<f64>) -> Self {
        let q = nalgebra::Quaternion::new(qw, qx, qy, qz);
        Self {
            rotation: UnitQuaternion::from_quaternion(q),
            translation,
        }
    }

    /// Build from a 4x4 homogeneous matrix (row-major T_BS blocks in
    /// EuRoC sensor.yaml files).
    pub fn from_matrix(mat: Matrix4<f64>) -> Self {
        let rot = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = mat.fixed_view::<3, 1>(0, 3).into_owned();
        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot));
        Self {
            rotation,
            translation,
        }
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    /// T_self * other.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Relative transform from `self` to `other`: self^-1 * other.
    pub fn between(&self, other: &SE3) -> Self {
        self.inverse().compose(other)
    }

    /// Map a point expressed in this frame into the parent frame.
    pub fn transform(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Map a parent-frame point into this frame (inverse transform).
    pub fn transform_to(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * (p - self.translation)
    }

    /// Screw-linear interpolation between two transforms, alpha in [0, 1].
    pub fn interpolate(&self, other: &SE3, alpha: f64) -> Self {
        let rotation = self
            .rotation
            .try_slerp(&other.rotation, alpha, 1e-12)
            .unwrap_or(self.rotation);
        let translation = self.translation.lerp(&other.translation, alpha);
        Self {
            rotation,
            translation,
        }
    }
}
