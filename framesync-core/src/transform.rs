//! Rigid 3D transformation utilities

use crate::error::{Error, Result};
use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Rotation3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that a matrix describes a rigid motion
const RIGIDITY_EPSILON: f64 = 1e-6;

/// A rigid (rotation + translation) transformation of 3D space.
///
/// Composition follows matrix multiplication: `a.compose(&b)` applies `b`
/// first and then `a`, so a point `p` maps to `a * (b * p)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub isometry: Isometry3<f64>,
}

impl RigidTransform {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            isometry: Isometry3::identity(),
        }
    }

    /// Create a pure translation
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            isometry: Isometry3::translation(x, y, z),
        }
    }

    /// Create a pure rotation from a quaternion
    pub fn rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            isometry: Isometry3::from_parts(Translation3::identity(), rotation),
        }
    }

    /// Create a rotation of `angle` radians about `axis`
    pub fn from_axis_angle(axis: &Unit<Vector3<f64>>, angle: f64) -> Self {
        Self::rotation(UnitQuaternion::from_axis_angle(axis, angle))
    }

    /// Create a transformation from translation and rotation
    pub fn from_parts(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            isometry: Isometry3::from_parts(translation.into(), rotation),
        }
    }

    /// Create a transformation from a position and roll/pitch/yaw angles in degrees.
    ///
    /// The rotation is `Rz(yaw) * Ry(pitch) * Rx(roll)`.
    pub fn from_position_rpy_degrees(position: [f64; 3], rpy_degrees: [f64; 3]) -> Self {
        let rotation = UnitQuaternion::from_euler_angles(
            rpy_degrees[0].to_radians(),
            rpy_degrees[1].to_radians(),
            rpy_degrees[2].to_radians(),
        );
        Self::from_parts(Vector3::from(position), rotation)
    }

    /// Create a transformation from a homogeneous matrix.
    ///
    /// Fails unless the matrix is a rotation plus translation: orthonormal
    /// upper-left block with determinant 1 and a `[0, 0, 0, 1]` last row.
    pub fn from_matrix(matrix: &Matrix4<f64>) -> Result<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidTransform("matrix contains non-finite values".into()));
        }

        let last_row = matrix.fixed_view::<1, 4>(3, 0);
        let expected_row = nalgebra::RowVector4::new(0.0, 0.0, 0.0, 1.0);
        if (last_row - expected_row).amax() > RIGIDITY_EPSILON {
            return Err(Error::InvalidTransform("matrix is not affine".into()));
        }

        let rotation: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if (rotation.transpose() * rotation - Matrix3::identity()).amax() > RIGIDITY_EPSILON {
            return Err(Error::InvalidTransform(
                "rotation block is not orthonormal (scale or shear present)".into(),
            ));
        }
        if (rotation.determinant() - 1.0).abs() > RIGIDITY_EPSILON {
            return Err(Error::InvalidTransform("rotation block is a reflection".into()));
        }

        let translation: Vector3<f64> = matrix.fixed_view::<3, 1>(0, 3).into_owned();
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
        Ok(Self::from_parts(translation, rotation))
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.isometry.transform_point(point)
    }

    /// Apply only the rotational part to a vector
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.isometry.transform_vector(vector)
    }

    /// Compose this transformation with another (`other` is applied first)
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            isometry: self.isometry * other.isometry,
        }
    }

    /// Get the inverse transformation. Rigid transforms are always invertible.
    pub fn inverse(&self) -> Self {
        Self {
            isometry: self.isometry.inverse(),
        }
    }

    /// Homogeneous 4x4 matrix form
    pub fn to_matrix(&self) -> Matrix4<f64> {
        self.isometry.to_homogeneous()
    }

    /// Translation component
    pub fn position(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    /// Rotation component
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.isometry.rotation
    }

    /// Roll, pitch and yaw in degrees
    pub fn rpy_degrees(&self) -> [f64; 3] {
        let (roll, pitch, yaw) = self.isometry.rotation.euler_angles();
        [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()]
    }

    /// Editable position/orientation representation
    pub fn to_pose(&self) -> Pose {
        let p = self.position();
        Pose {
            position: [p.x, p.y, p.z],
            rpy_degrees: self.rpy_degrees(),
        }
    }

    /// Check whether two transforms have matrices that agree within `epsilon`
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        (self.to_matrix() - other.to_matrix()).amax() <= epsilon
    }

    /// Check if this is approximately the identity transformation
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.approx_eq(&Self::identity(), epsilon)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

impl From<Isometry3<f64>> for RigidTransform {
    fn from(isometry: Isometry3<f64>) -> Self {
        Self { isometry }
    }
}

impl From<RigidTransform> for Isometry3<f64> {
    fn from(transform: RigidTransform) -> Self {
        transform.isometry
    }
}

impl TryFrom<Matrix4<f64>> for RigidTransform {
    type Error = Error;

    fn try_from(matrix: Matrix4<f64>) -> Result<Self> {
        Self::from_matrix(&matrix)
    }
}

/// Position plus roll/pitch/yaw angles, the way a properties panel edits a frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f64; 3],
    pub rpy_degrees: [f64; 3],
}

impl Pose {
    pub fn new(position: [f64; 3], rpy_degrees: [f64; 3]) -> Self {
        Self { position, rpy_degrees }
    }

    pub fn to_transform(&self) -> RigidTransform {
        RigidTransform::from_position_rpy_degrees(self.position, self.rpy_degrees)
    }
}

impl From<Pose> for RigidTransform {
    fn from(pose: Pose) -> Self {
        pose.to_transform()
    }
}

impl From<RigidTransform> for Pose {
    fn from(transform: RigidTransform) -> Self {
        transform.to_pose()
    }
}
