//! Motion channels: things that can be sampled for a motion and have a
//! motion written back onto them.
//!
//! There are two kinds, an object and a bone of an armature. Both sample as
//! `reference⁻¹ · current` at each frame. An object's reference is the
//! identity. A bone's reference is its rest matrix, and the sampled
//! bone-local delta is then turned into armature space by its rest rotation
//! so it composes with object motion; writing a bone undoes exactly that.

use cgmath::{Matrix4, Quaternion, Rotation, SquareMatrix, InnerSpace};
use errors::{ErrorKind, Result};
use motion::{Motion, Transform};
use scene::{bone_data_path, FrameGuard, Host, LOCATION, ROTATION_EULER, ROTATION_QUATERNION};
use scene::action::{Action, Interpolation};
use std::convert::TryFrom;

pub trait MotionChannel {
    /// Name used in messages.
    fn name(&self) -> String;

    /// Data path for a transform property of this channel.
    fn data_path(&self, property: &str) -> String;

    /// Curve group new curves are put in.
    fn group(&self) -> String;

    /// Current matrix of the channel at the host's current frame.
    fn current_matrix<H: Host + ?Sized>(&self, host: &H) -> Result<Matrix4<f64>>;

    /// `reference⁻¹ · current`, split up.
    fn sample_transform<H: Host + ?Sized>(&self, host: &H) -> Result<Transform>;

    /// Converts a sampled transform into the values stored in the channel's
    /// location/rotation curves.
    fn to_curve_space(&self, xform: &Transform) -> Transform;

    /// Samples `frame_count` frames, starting at host frame 1. The host's
    /// frame is restored afterwards, even on error.
    fn sample_motion<H: Host + ?Sized>(&self, host: &mut H, frame_count: usize) -> Result<Motion> {
        let last_frame = match i32::try_from(frame_count) {
            Ok(n) => n,
            Err(_) => {
                bail!(ErrorKind::Validation(format!(
                    "can't sample {} frames from {}", frame_count, self.name()
                )))
            }
        };
        let mut host = FrameGuard::new(host);
        let mut motion = vec![];
        for frame in 1..=last_frame {
            host.set_frame(frame);
            motion.push(self.sample_transform(&*host)?);
        }
        Ok(motion)
    }

    /// Removes all of the channel's location and rotation curves. Removing
    /// when there is nothing there is fine.
    fn delete_motion(&self, action: &mut Action) {
        let location = self.data_path(LOCATION);
        let euler = self.data_path(ROTATION_EULER);
        let quat = self.data_path(ROTATION_QUATERNION);
        let mut removed = 0;
        for i in 0..3 {
            if action.remove_curve(&location, i) { removed += 1; }
            if action.remove_curve(&euler, i) { removed += 1; }
        }
        for i in 0..4 {
            if action.remove_curve(&quat, i) { removed += 1; }
        }
        if removed != 0 {
            trace!("removed {} curves from {}", removed, self.name());
        }
    }

    /// True if the action animates this channel's location or rotation.
    fn has_motion(&self, action: &Action) -> bool {
        action.has_curves_at(&self.data_path(LOCATION)) ||
            action.has_curves_at(&self.data_path(ROTATION_EULER)) ||
            action.has_curves_at(&self.data_path(ROTATION_QUATERNION))
    }

    /// Replaces the channel's curves with `motion`, one linear keyframe per
    /// frame at frames 1, 2, ... Rotation curves are only written when
    /// `include_rotation` is set. An empty motion is refused without
    /// touching the action.
    fn set_motion(&self, action: &mut Action, motion: &[Transform], include_rotation: bool) -> Result<()> {
        if motion.is_empty() {
            bail!(ErrorKind::EmptyMotion(self.name()));
        }

        self.delete_motion(action);

        let values: Vec<Transform> = motion.iter().map(|x| self.to_curve_space(x)).collect();
        let group = self.group();

        let location = self.data_path(LOCATION);
        for i in 0..3 {
            let curve = action.new_curve(&location, i, &group)?;
            for (frame_idx, xform) in values.iter().enumerate() {
                curve.add_keyframe((frame_idx + 1) as f64, xform.translation[i], Interpolation::Linear);
            }
        }

        if include_rotation {
            let quat = self.data_path(ROTATION_QUATERNION);
            let quats = continuous_quats(values.iter().map(|x| x.rotation));
            for i in 0..4 {
                let curve = action.new_curve(&quat, i, &group)?;
                for (frame_idx, q) in quats.iter().enumerate() {
                    let component = match i {
                        0 => q.s,
                        1 => q.v.x,
                        2 => q.v.y,
                        _ => q.v.z,
                    };
                    curve.add_keyframe((frame_idx + 1) as f64, component, Interpolation::Linear);
                }
            }
        }

        debug!("wrote {} frames to {}{}", motion.len(), self.name(),
            if include_rotation { "" } else { " (location only)" });
        Ok(())
    }
}

/// Flips quaternions so neighbours are in the same hemisphere; otherwise
/// interpolating the components between keyframes takes the long way round.
fn continuous_quats<I: Iterator<Item=Quaternion<f64>>>(quats: I) -> Vec<Quaternion<f64>> {
    let mut out: Vec<Quaternion<f64>> = quats.map(|q| q.normalize()).collect();
    for i in 1..out.len() {
        if out[i].dot(out[i-1]) < 0.0 {
            out[i] = -out[i];
        }
    }
    out
}

/// An object's own transform.
pub struct ObjectChannel {
    pub object: String,
}

impl ObjectChannel {
    pub fn new(object: &str) -> ObjectChannel {
        ObjectChannel { object: object.to_string() }
    }
}

impl MotionChannel for ObjectChannel {
    fn name(&self) -> String {
        format!("object {:?}", self.object)
    }

    fn data_path(&self, property: &str) -> String {
        property.to_string()
    }

    fn group(&self) -> String {
        "Object Transforms".to_string()
    }

    fn current_matrix<H: Host + ?Sized>(&self, host: &H) -> Result<Matrix4<f64>> {
        host.object_matrix(&self.object)
    }

    fn sample_transform<H: Host + ?Sized>(&self, host: &H) -> Result<Transform> {
        Ok(Transform::from_matrix(self.current_matrix(host)?))
    }

    fn to_curve_space(&self, xform: &Transform) -> Transform {
        *xform
    }
}

/// A pose bone of an armature.
pub struct BoneChannel {
    pub armature: String,
    pub bone: String,
    rest_inverse: Matrix4<f64>,
    rest_rotation: Quaternion<f64>,
}

impl BoneChannel {
    /// Looks up the bone's rest pose; fails if the bone doesn't exist.
    pub fn new<H: Host + ?Sized>(host: &H, armature: &str, bone: &str) -> Result<BoneChannel> {
        let rest = host.rest_bone_matrix(armature, bone)?;
        let rest_inverse = match rest.invert() {
            Some(inv) => inv,
            None => {
                bail!(ErrorKind::Validation(format!(
                    "bone {:?} has a singular rest matrix", bone
                )))
            }
        };
        let rest_rotation = Transform::from_matrix(rest).rotation;
        Ok(BoneChannel {
            armature: armature.to_string(),
            bone: bone.to_string(),
            rest_inverse,
            rest_rotation,
        })
    }
}

impl MotionChannel for BoneChannel {
    fn name(&self) -> String {
        format!("bone {:?}", self.bone)
    }

    fn data_path(&self, property: &str) -> String {
        bone_data_path(&self.bone, property)
    }

    fn group(&self) -> String {
        self.bone.clone()
    }

    fn current_matrix<H: Host + ?Sized>(&self, host: &H) -> Result<Matrix4<f64>> {
        host.pose_bone_matrix(&self.armature, &self.bone)
    }

    fn sample_transform<H: Host + ?Sized>(&self, host: &H) -> Result<Transform> {
        let local = Transform::from_matrix(self.rest_inverse * self.current_matrix(host)?);
        // Bone curves act in the bone's rest frame; bring the delta into
        // armature space, where object motion lives.
        let qr = self.rest_rotation;
        Ok(Transform {
            translation: qr.rotate_vector(local.translation),
            rotation: (qr * local.rotation * qr.conjugate()).normalize(),
        })
    }

    fn to_curve_space(&self, xform: &Transform) -> Transform {
        let qr = self.rest_rotation;
        let inv = qr.conjugate();
        Transform {
            translation: inv.rotate_vector(xform.translation),
            rotation: (inv * xform.rotation * qr).normalize(),
        }
    }
}


#[cfg(test)]
use cgmath::{Rad, Rotation3, vec3};
#[cfg(test)]
use motion::test_util::{vec_approx_eq, xform_approx_eq};
#[cfg(test)]
use scene::{Document, test_scene::walking_rig};

#[cfg(test)]
fn twisted_rig() -> Document {
    // Like walking_rig, but B's rest pose is turned and B turns as it moves,
    // so the rest-frame conversion actually does something.
    use scene::test_scene::key_vec3;

    let mut doc = walking_rig();
    doc.objects[0].armature.as_mut().unwrap().bones[1].rotation =
        Quaternion::from_axis_angle(vec3(0.0, 0.6, 0.8), Rad(1.1));
    let action = doc.action_mut("Walk").unwrap();
    action.remove_curve(&bone_data_path("B", LOCATION), 0);
    action.remove_curve(&bone_data_path("B", LOCATION), 1);
    action.remove_curve(&bone_data_path("B", LOCATION), 2);
    key_vec3(action, &bone_data_path("B", LOCATION), "B", &[
        (1.0, vec3(0.0, 1.0, 0.0)),
        (10.0, vec3(2.0, -1.0, 3.0)),
    ]);
    let path = bone_data_path("B", ROTATION_EULER);
    for &(axis, angle) in &[(0, 0.3), (2, -0.7)] {
        let c = action.new_curve(&path, axis, "B").unwrap();
        c.add_keyframe(1.0, 0.0, Interpolation::Linear);
        c.add_keyframe(10.0, angle, Interpolation::Linear);
    }
    doc
}

#[test]
fn test_sample_bone_motion() {
    let mut doc = walking_rig();
    doc.frame = 4;
    let a = BoneChannel::new(&doc, "Rig", "A").unwrap();
    let motion = a.sample_motion(&mut doc, 10).unwrap();
    assert_eq!(doc.frame, 4);
    assert_eq!(motion.len(), 10);
    assert!(vec_approx_eq(motion[0].translation, vec3(0.0, 0.0, 0.0)));
    assert!(vec_approx_eq(motion[9].translation, vec3(10.0, 0.0, 0.0)));
    assert!(vec_approx_eq(motion[3].translation, vec3(10.0 / 3.0, 0.0, 0.0)));

    // B is sampled relative to its rest pose, so its head offset vanishes.
    let b = BoneChannel::new(&doc, "Rig", "B").unwrap();
    for xform in b.sample_motion(&mut doc, 10).unwrap() {
        assert!(xform_approx_eq(&xform, &Transform::identity()));
    }
}

#[test]
fn test_round_trip() {
    let mut doc = twisted_rig();
    let b = BoneChannel::new(&doc, "Rig", "B").unwrap();
    let before = b.sample_motion(&mut doc, 10).unwrap();

    b.set_motion(doc.action_mut("Walk").unwrap(), &before, true).unwrap();
    // The Euler curves were replaced by quaternion ones.
    assert!(!doc.action("Walk").unwrap().has_curves_at(&bone_data_path("B", ROTATION_EULER)));

    let after = b.sample_motion(&mut doc, 10).unwrap();
    for (x, y) in before.iter().zip(after.iter()) {
        assert!(xform_approx_eq(x, y));
    }

    let obj = ObjectChannel::new("Rig");
    obj.set_motion(doc.action_mut("Walk").unwrap(), &before, true).unwrap();
    let sampled = obj.sample_motion(&mut doc, 10).unwrap();
    for (x, y) in before.iter().zip(sampled.iter()) {
        assert!(xform_approx_eq(x, y));
    }
}

#[test]
fn test_set_motion_layout() {
    let mut doc = walking_rig();
    let motion = vec![Transform::identity(); 4];
    let obj = ObjectChannel::new("Rig");
    let action = doc.action_mut("Walk").unwrap();

    obj.set_motion(action, &motion, false).unwrap();
    assert!(action.has_curves_at(LOCATION));
    assert!(!action.has_curves_at(ROTATION_QUATERNION));
    let curve = action.find_curve(LOCATION, 1).unwrap();
    assert_eq!(curve.group, Some("Object Transforms".to_string()));
    let frames: Vec<f64> = curve.keyframes.iter().map(|k| k.frame).collect();
    assert_eq!(frames, vec![1.0, 2.0, 3.0, 4.0]);
    assert!(curve.keyframes.iter().all(|k| k.interpolation == Interpolation::Linear));

    // Writing again replaces rather than appends.
    obj.set_motion(action, &motion[..2], true).unwrap();
    assert_eq!(action.find_curve(LOCATION, 1).unwrap().keyframes.len(), 2);
    assert_eq!(action.find_curve(ROTATION_QUATERNION, 0).unwrap().keyframes[0].value, 1.0);
}

#[test]
fn test_empty_motion_refused() {
    let mut doc = walking_rig();
    let before = doc.clone();
    let a = BoneChannel::new(&doc, "Rig", "A").unwrap();
    assert!(a.set_motion(doc.action_mut("Walk").unwrap(), &[], true).is_err());
    assert_eq!(doc, before);
}

#[test]
fn test_delete_motion_idempotent() {
    let mut doc = walking_rig();
    let obj = ObjectChannel::new("Rig");
    let action = doc.action_mut("Walk").unwrap();
    let before = action.clone();
    obj.delete_motion(action);
    obj.delete_motion(action);
    assert_eq!(*action, before);

    let a = BoneChannel::new(&doc, "Rig", "A").unwrap();
    let action = doc.action_mut("Walk").unwrap();
    a.delete_motion(action);
    assert!(!a.has_motion(action));
    a.delete_motion(action);
}

#[test]
fn test_sampling_error_restores_frame() {
    let mut doc = walking_rig();
    doc.frame = 5;
    let a = BoneChannel::new(&doc, "Rig", "A").unwrap();
    doc.objects[0].armature.as_mut().unwrap().bones.remove(0);
    assert!(a.sample_motion(&mut doc, 10).is_err());
    assert_eq!(doc.frame, 5);
}

#[test]
fn test_unknown_bone() {
    let doc = walking_rig();
    assert!(BoneChannel::new(&doc, "Rig", "Nope").is_err());
}

#[test]
fn test_too_many_frames() {
    use scene::action::MAX_FRAMES;

    let mut doc = walking_rig();
    doc.frame = 3;
    let a = BoneChannel::new(&doc, "Rig", "A").unwrap();
    match a.sample_motion(&mut doc, MAX_FRAMES + 1) {
        Err(e) => match *e.kind() {
            ErrorKind::Validation(_) => (),
            _ => panic!("wrong error: {}", e),
        },
        Ok(_) => panic!("expected an error"),
    }
    assert_eq!(doc.frame, 3);
}
