//! Motion algebra: relative motion and yaw extraction.

use cgmath::{InnerSpace, Rotation, Vector3};
use errors::{ErrorKind, Result};
use motion::{Motion, Transform};
use motion::filter::Axis;
use report::Report;

/// Below this length the horizontal projection of the forward vector has no
/// usable direction.
static DEGENERATE_LENGTH: f64 = 1e-6;

/// Expresses `child` in the frame that moves along with `root`.
///
/// For each frame, with `inv = normalize(conjugate(root.rotation))`:
///
///     translation = inv · (child.translation - root.translation)
///     rotation    = inv * child.rotation
///
/// so `try_relative_motion(m, m)` is the identity at every frame. Both motions
/// must have the same length.
pub fn try_relative_motion(root: &[Transform], child: &[Transform]) -> Result<Motion> {
    if root.len() != child.len() {
        bail!(ErrorKind::MotionLengthMismatch(root.len(), child.len()));
    }

    let motion = root.iter().zip(child.iter())
        .map(|(root, child)| {
            let inv_root_rot = root.rotation.conjugate().normalize();
            let translation = inv_root_rot.rotate_vector(child.translation - root.translation);
            let rotation = inv_root_rot * child.rotation;
            Transform { translation, rotation }
        })
        .collect();
    Ok(motion)
}

/// Like `try_relative_motion`, but a length mismatch is sent to `report` and
/// an empty motion comes back. Callers must treat the empty motion as a
/// failure.
pub fn relative_motion(root: &[Transform], child: &[Transform], report: &mut dyn Report) -> Motion {
    match try_relative_motion(root, child) {
        Ok(motion) => motion,
        Err(e) => {
            report.error(format!("relative motion: {}", e));
            vec![]
        }
    }
}

/// Signed rotation of `xform` about `up`, in radians, counter-clockwise
/// positive when looking down the up axis.
///
/// The forward vector for `up` is rotated, flattened onto the plane normal to
/// `up` and measured against the unrotated forward vector. When the rotated
/// forward vector points (almost) straight along `up` there is no heading to
/// measure and the yaw is 0.
pub fn yaw(xform: &Transform, up: Axis) -> f64 {
    let up_vec = up.unit();
    let forward = up.forward();

    let rotated = xform.rotation.rotate_vector(forward);
    let flattened = rotated - up_vec * rotated.dot(up_vec);
    if flattened.magnitude() < DEGENERATE_LENGTH {
        debug!("yaw of a rotation taking forward onto the up axis; using 0");
        return 0.0;
    }
    let flattened = flattened.normalize();

    signed_angle(forward, flattened, up_vec)
}

fn signed_angle(from: Vector3<f64>, to: Vector3<f64>, axis: Vector3<f64>) -> f64 {
    let sin = from.cross(to).dot(axis);
    let cos = from.dot(to);
    sin.atan2(cos)
}


#[cfg(test)]
use cgmath::{Quaternion, Rad, Rotation3, vec3};
#[cfg(test)]
use motion::test_util::{xform_approx_eq, EPSILON};
#[cfg(test)]
use log::Level;

#[cfg(test)]
fn wobbly_motion(n: usize) -> Motion {
    (0..n).map(|i| {
        let t = i as f64;
        Transform {
            translation: vec3(t, 0.5 * t * t, -t),
            rotation: Quaternion::from_axis_angle(
                vec3(1.0, 2.0, 3.0).normalize(),
                Rad(0.3 * t),
            ),
        }
    }).collect()
}

#[test]
fn test_self_relative_motion_is_identity() {
    let m = wobbly_motion(12);
    let mut reports: Vec<(Level, String)> = vec![];
    let rel = relative_motion(&m, &m, &mut reports);
    assert!(reports.is_empty());
    assert_eq!(rel.len(), 12);
    for xform in &rel {
        assert!(xform_approx_eq(xform, &Transform::identity()));
    }
}

#[test]
fn test_relative_motion_length_mismatch() {
    let mut reports: Vec<(Level, String)> = vec![];
    let rel = relative_motion(&wobbly_motion(3), &wobbly_motion(4), &mut reports);
    assert!(rel.is_empty());
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, Level::Error);

    match try_relative_motion(&wobbly_motion(3), &wobbly_motion(4)) {
        Err(e) => match *e.kind() {
            ErrorKind::MotionLengthMismatch(3, 4) => (),
            _ => panic!("wrong error: {}", e),
        },
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn test_relative_motion_undoes_root_rotation() {
    // Root turned 90° about Z and moved to (1,0,0); a child at (1,1,0)
    // sits one unit along the root's local X.
    let root = vec![Transform {
        translation: vec3(1.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_z(Rad(::std::f64::consts::FRAC_PI_2)),
    }];
    let child = vec![Transform {
        translation: vec3(1.0, 1.0, 0.0),
        rotation: root[0].rotation,
    }];
    let rel = try_relative_motion(&root, &child).unwrap();
    let expected = Transform {
        translation: vec3(1.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_z(Rad(0.0)),
    };
    assert!(xform_approx_eq(&rel[0], &expected));
}

#[test]
fn test_yaw() {
    use std::f64::consts::{PI, FRAC_PI_2};

    let about_z = |angle: f64| Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_z(Rad(angle)),
    };

    assert!((yaw(&about_z(FRAC_PI_2), Axis::Z) - FRAC_PI_2).abs() < EPSILON);
    assert!((yaw(&about_z(-FRAC_PI_2), Axis::Z) + FRAC_PI_2).abs() < EPSILON);
    assert!((yaw(&about_z(PI), Axis::Z).abs() - PI).abs() < EPSILON);
    assert!(yaw(&about_z(0.0), Axis::Z).abs() < EPSILON);

    // Tilting about the forward axis doesn't change the heading.
    let tilted = Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_z(Rad(0.4)) * Quaternion::from_angle_x(Rad(0.9)),
    };
    assert!((yaw(&tilted, Axis::Z) - 0.4).abs() < EPSILON);
}

#[test]
fn test_yaw_degenerate() {
    use std::f64::consts::FRAC_PI_2;

    // Pitching 90° about Y takes forward (1,0,0) onto the Z axis.
    let straight_up = Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_y(Rad(-FRAC_PI_2)),
    };
    assert_eq!(yaw(&straight_up, Axis::Z), 0.0);
}

#[test]
fn test_yaw_other_up_axes() {
    use std::f64::consts::FRAC_PI_2;

    let about_y = Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_y(Rad(FRAC_PI_2)),
    };
    assert!((yaw(&about_y, Axis::Y) - FRAC_PI_2).abs() < EPSILON);
    let about_x = Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_x(Rad(-0.25)),
    };
    assert!((yaw(&about_x, Axis::X) + 0.25).abs() < EPSILON);
}
