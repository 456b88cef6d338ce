//! Local transforms of scene nodes.
//!
//! A node's world transform is the product of its ancestors' local transforms
//! and its own, composed root-first.

use std::ops::Mul;

use cgmath::{Matrix4, One, Quaternion, Vector3};

/// Translation, rotation (as quaternion) and non-uniform scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_translation(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    /// Builds a transform from a glTF node's decomposed TRS.
    ///
    /// glTF stores quaternions as `[x, y, z, w]`.
    pub fn from_decomposed(
        translation: [f32; 3],
        rotation: [f32; 4],
        scale: [f32; 3],
    ) -> Self {
        Self {
            position: translation.into(),
            rotation: Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
            scale: scale.into(),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Mul<Transform> for Transform {
    type Output = Self;

    /// Parent * child, matching `parent.to_matrix() * child.to_matrix()` for
    /// uniformly scaled parents.
    fn mul(self, rhs: Transform) -> Self::Output {
        let scaled_rhs_pos = Vector3::new(
            self.scale.x * rhs.position.x,
            self.scale.y * rhs.position.y,
            self.scale.z * rhs.position.z,
        );
        Transform {
            position: self.position + (self.rotation * scaled_rhs_pos),
            rotation: self.rotation * rhs.rotation,
            scale: Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Self::from_translation(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Point3, Rotation3, Transform as _};

    #[test]
    fn composition_matches_matrix_product() {
        let parent = Transform {
            position: Vector3::new(1.0, 2.0, 3.0),
            rotation: Quaternion::from_angle_y(Deg(90.0)),
            scale: Vector3::new(2.0, 2.0, 2.0),
        };
        let child = Transform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let composed = (parent * child).to_matrix();
        let expected = parent.to_matrix() * child.to_matrix();
        let p = Point3::new(0.5, -0.5, 0.25);
        let a = composed.transform_point(p);
        let b = expected.transform_point(p);
        assert!((a.x - b.x).abs() < 1e-5);
        assert!((a.y - b.y).abs() < 1e-5);
        assert!((a.z - b.z).abs() < 1e-5);
    }

    #[test]
    fn gltf_quaternion_order_is_xyzw() {
        let t = Transform::from_decomposed([0.0; 3], [0.0, 0.0, 0.0, 1.0], [1.0; 3]);
        assert_eq!(t.rotation, Quaternion::one());
    }
}
