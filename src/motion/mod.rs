//! Motions: per-frame rigid transforms of a channel.
//!
//! A motion holds one `Transform` for every frame of an action. Frame index
//! `i` of a motion lives at host frame `i + 1`, since keyframes are numbered
//! from 1.

pub mod transform_utils;
pub mod filter;
pub mod channel;

use cgmath::{Matrix3, Matrix4, Quaternion, Vector3, InnerSpace, One, Rotation, Zero};
use std::fmt;

/// A translation and a rotation, relative to some reference pose.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f64>,
    pub rotation: Quaternion<f64>,
}

pub type Motion = Vec<Transform>;

impl Transform {
    pub fn identity() -> Transform {
        Transform {
            translation: Vector3::zero(),
            rotation: Quaternion::one(),
        }
    }

    /// Splits an affine matrix into its translation and rotation. Any scale in
    /// the upper 3x3 is discarded.
    pub fn from_matrix(m: Matrix4<f64>) -> Transform {
        let translation = m.w.truncate();
        let basis = Matrix3::from_cols(
            m.x.truncate().normalize(),
            m.y.truncate().normalize(),
            m.z.truncate().normalize(),
        );
        let rotation = Quaternion::from(basis).normalize();
        Transform { translation, rotation }
    }

    /// `self · other`: `other` expressed in the space `self` moves to.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation.rotate_vector(other.translation),
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_translation(self.translation) * Matrix4::from(self.rotation)
    }
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::identity()
    }
}

/// Displays a motion one frame per line, frames numbered from 1.
pub struct MotionFmt<'a>(pub &'a [Transform]);

impl<'a> fmt::Display for MotionFmt<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, xform) in self.0.iter().enumerate() {
            let t = xform.translation;
            let r = xform.rotation;
            writeln!(f, "Frame {}. loc ({:.4}, {:.4}, {:.4}); rot ({:.4}, {:.4}, {:.4}, {:.4})",
                i + 1, t.x, t.y, t.z, r.s, r.v.x, r.v.y, r.v.z,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod test_util {
    use super::Transform;
    use cgmath::{InnerSpace, Quaternion, Vector3};

    pub static EPSILON: f64 = 1e-5;

    pub fn vec_approx_eq(a: Vector3<f64>, b: Vector3<f64>) -> bool {
        (a - b).magnitude() < EPSILON
    }

    /// q and -q are the same rotation.
    pub fn quat_approx_eq(a: Quaternion<f64>, b: Quaternion<f64>) -> bool {
        (a.normalize().dot(b.normalize()).abs() - 1.0).abs() < EPSILON
    }

    pub fn xform_approx_eq(a: &Transform, b: &Transform) -> bool {
        vec_approx_eq(a.translation, b.translation) && quat_approx_eq(a.rotation, b.rotation)
    }
}

#[test]
fn test_matrix_round_trip() {
    use cgmath::{Rad, Rotation3, vec3};
    use self::test_util::xform_approx_eq;

    let xform = Transform {
        translation: vec3(1.0, -2.0, 0.5),
        rotation: Quaternion::from_axis_angle(vec3(1.0, 1.0, 0.0).normalize(), Rad(0.7)),
    };
    let back = Transform::from_matrix(xform.to_matrix());
    assert!(xform_approx_eq(&xform, &back));
}

#[test]
fn test_motion_fmt() {
    let motion = vec![Transform::identity(); 2];
    let s = format!("{}", MotionFmt(&motion));
    assert_eq!(s.lines().count(), 2);
    assert!(s.starts_with("Frame 1. loc (0.0000, 0.0000, 0.0000)"));
    assert!(s.contains("Frame 2."));
}
