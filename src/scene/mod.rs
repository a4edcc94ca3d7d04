//! The scene the motion is read from and written to.
//!
//! Extraction only talks to a scene through the `Host` trait: the current
//! frame, the objects' actions, the bone hierarchy and the evaluated
//! matrices. `Document` is the in-memory scene that backs the command line
//! tool; it is read from and written to a JSON scene file (see `read` and
//! `write`).

pub mod action;
pub mod read;
pub mod write;

use cgmath::{Matrix4, Quaternion, Rad, Rotation3, SquareMatrix, Vector3, InnerSpace};
use errors::{ErrorKind, Result};
use motion::Transform;
use petgraph::Graph;
use petgraph::graph::NodeIndex;
use self::action::Action;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Armature,
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationData {
    /// Name of the assigned action, if any.
    pub action: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoneInfo {
    pub name: String,
    pub parent: Option<String>,
}

/// What extraction needs from a scene.
///
/// Matrices are always evaluated at the current frame, so changing the frame
/// changes what they return.
pub trait Host {
    fn frame(&self) -> i32;
    fn set_frame(&mut self, frame: i32);

    fn object_kind(&self, object: &str) -> Option<ObjectKind>;
    /// None if the object has never been animated.
    fn animation_data(&self, object: &str) -> Result<Option<AnimationData>>;

    fn action(&self, name: &str) -> Option<&Action>;
    fn action_mut(&mut self, name: &str) -> Option<&mut Action>;

    fn bones(&self, armature: &str) -> Result<Vec<BoneInfo>>;

    /// Local matrix of an object.
    fn object_matrix(&self, object: &str) -> Result<Matrix4<f64>>;
    /// Posed bone matrix, in armature space.
    fn pose_bone_matrix(&self, armature: &str, bone: &str) -> Result<Matrix4<f64>>;
    /// Rest bone matrix, in armature space.
    fn rest_bone_matrix(&self, armature: &str, bone: &str) -> Result<Matrix4<f64>>;
}

/// Holds the host's frame while a caller moves it around. The original frame
/// is put back when the guard is dropped, whichever way the caller leaves.
pub struct FrameGuard<'a, H: Host + ?Sized + 'a> {
    host: &'a mut H,
    saved_frame: i32,
}

impl<'a, H: Host + ?Sized> FrameGuard<'a, H> {
    pub fn new(host: &'a mut H) -> FrameGuard<'a, H> {
        let saved_frame = host.frame();
        FrameGuard { host, saved_frame }
    }
}

impl<'a, H: Host + ?Sized> Drop for FrameGuard<'a, H> {
    fn drop(&mut self) {
        self.host.set_frame(self.saved_frame);
    }
}

impl<'a, H: Host + ?Sized> Deref for FrameGuard<'a, H> {
    type Target = H;
    fn deref(&self) -> &H { &*self.host }
}

impl<'a, H: Host + ?Sized> DerefMut for FrameGuard<'a, H> {
    fn deref_mut(&mut self) -> &mut H { &mut *self.host }
}

/// Data path of a property on a pose bone.
pub fn bone_data_path(bone: &str, property: &str) -> String {
    format!("pose.bones[\"{}\"].{}", bone, property)
}

pub static LOCATION: &str = "location";
pub static ROTATION_QUATERNION: &str = "rotation_quaternion";
pub static ROTATION_EULER: &str = "rotation_euler";


/// An in-memory scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub frame: i32,
    pub objects: Vec<Object>,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub name: String,
    /// Used when the action doesn't animate the location.
    pub location: Vector3<f64>,
    /// Used when the action doesn't animate the rotation.
    pub rotation: Quaternion<f64>,
    pub animation_data: Option<AnimationData>,
    /// None for an empty.
    pub armature: Option<Armature>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Armature {
    pub bones: Vec<Bone>,
}

/// A bone's rest pose. The rest matrix (in armature space) is a translation
/// to the head followed by the rotation.
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<String>,
    pub head: Vector3<f64>,
    pub rotation: Quaternion<f64>,
}

impl Bone {
    pub fn rest_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_translation(self.head) * Matrix4::from(self.rotation)
    }
}

impl Armature {
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// Builds the parent -> child graph of the bones. Node weights are indices
    /// into `bones`. Fails unless the bones form a forest with unique names.
    pub fn hierarchy(&self) -> Result<Graph<usize, ()>> {
        let mut graph = Graph::new();
        let mut by_name: HashMap<&str, NodeIndex> = HashMap::new();
        for (i, bone) in self.bones.iter().enumerate() {
            let node = graph.add_node(i);
            if by_name.insert(bone.name.as_str(), node).is_some() {
                bail!(ErrorKind::BadScene(format!("two bones are named {:?}", bone.name)));
            }
        }
        for (i, bone) in self.bones.iter().enumerate() {
            if let Some(ref parent) = bone.parent {
                let parent_node = match by_name.get(parent.as_str()) {
                    Some(&n) => n,
                    None => {
                        bail!(ErrorKind::BadScene(format!(
                            "bone {:?} has an unknown parent {:?}", bone.name, parent
                        )))
                    }
                };
                graph.add_edge(parent_node, NodeIndex::new(i), ());
            }
        }
        if ::petgraph::algo::is_cyclic_directed(&graph) {
            bail!(ErrorKind::BadScene("bone parents form a cycle".to_string()));
        }
        Ok(graph)
    }
}

impl Document {
    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn object_or_err(&self, name: &str) -> Result<&Object> {
        match self.object(name) {
            Some(o) => Ok(o),
            None => { bail!(ErrorKind::UnknownObject(name.to_string())) }
        }
    }

    fn armature_or_err(&self, name: &str) -> Result<&Armature> {
        match self.object_or_err(name)?.armature {
            Some(ref arm) => Ok(arm),
            None => { bail!(ErrorKind::Validation(format!("{:?} is not an armature", name))) }
        }
    }

    fn bone_or_err<'a>(&'a self, armature: &str, bone: &str) -> Result<&'a Bone> {
        match self.armature_or_err(armature)?.bone(bone) {
            Some(b) => Ok(b),
            None => { bail!(ErrorKind::UnknownBone(armature.to_string(), bone.to_string())) }
        }
    }

    fn object_action(&self, object: &Object) -> Option<&Action> {
        let name = object.animation_data.as_ref()?.action.as_ref()?;
        self.action(name)
    }

    /// Evaluates the location and rotation curves at the current frame.
    /// `path` turns a property name into the channel's data path. Components
    /// without a curve keep their value from `rest`.
    fn evaluate_transform(&self, action: Option<&Action>, path: &dyn Fn(&str) -> String, rest: Transform) -> Transform {
        let action = match action {
            Some(a) => a,
            None => return rest,
        };
        let frame = self.frame as f64;

        let loc_path = path(LOCATION);
        let mut translation = rest.translation;
        for i in 0..3 {
            if let Some(v) = action.evaluate(&loc_path, i, frame) {
                translation[i] = v;
            }
        }

        let quat_path = path(ROTATION_QUATERNION);
        let euler_path = path(ROTATION_EULER);
        let rotation = if action.has_curves_at(&quat_path) {
            let r = rest.rotation;
            let w = action.evaluate(&quat_path, 0, frame).unwrap_or(r.s);
            let x = action.evaluate(&quat_path, 1, frame).unwrap_or(r.v.x);
            let y = action.evaluate(&quat_path, 2, frame).unwrap_or(r.v.y);
            let z = action.evaluate(&quat_path, 3, frame).unwrap_or(r.v.z);
            Quaternion::new(w, x, y, z).normalize()
        } else if action.has_curves_at(&euler_path) {
            let x = action.evaluate(&euler_path, 0, frame).unwrap_or(0.0);
            let y = action.evaluate(&euler_path, 1, frame).unwrap_or(0.0);
            let z = action.evaluate(&euler_path, 2, frame).unwrap_or(0.0);
            // XYZ order: X is applied first.
            Quaternion::from_angle_z(Rad(z)) *
                Quaternion::from_angle_y(Rad(y)) *
                Quaternion::from_angle_x(Rad(x))
        } else {
            rest.rotation
        };

        Transform { translation, rotation }
    }

    fn pose_matrix(&self, object: &Object, armature: &Armature, bone: &Bone) -> Result<Matrix4<f64>> {
        let action = self.object_action(object);
        let basis = self.evaluate_transform(
            action,
            &|prop| bone_data_path(&bone.name, prop),
            Transform::identity(),
        ).to_matrix();

        match bone.parent {
            None => Ok(bone.rest_matrix() * basis),
            Some(ref parent_name) => {
                let parent = match armature.bone(parent_name) {
                    Some(p) => p,
                    None => { bail!(ErrorKind::UnknownBone(object.name.clone(), parent_name.clone())) }
                };
                let parent_rest_inv = invert(parent.rest_matrix())?;
                let parent_pose = self.pose_matrix(object, armature, parent)?;
                Ok(parent_pose * parent_rest_inv * bone.rest_matrix() * basis)
            }
        }
    }
}

fn invert(m: Matrix4<f64>) -> Result<Matrix4<f64>> {
    match m.invert() {
        Some(inv) => Ok(inv),
        None => { bail!(ErrorKind::BadScene("singular rest matrix".to_string())) }
    }
}

impl Host for Document {
    fn frame(&self) -> i32 {
        self.frame
    }

    fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    fn object_kind(&self, object: &str) -> Option<ObjectKind> {
        self.object(object).map(|o| {
            if o.armature.is_some() { ObjectKind::Armature } else { ObjectKind::Empty }
        })
    }

    fn animation_data(&self, object: &str) -> Result<Option<AnimationData>> {
        Ok(self.object_or_err(object)?.animation_data.clone())
    }

    fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    fn action_mut(&mut self, name: &str) -> Option<&mut Action> {
        self.actions.iter_mut().find(|a| a.name == name)
    }

    fn bones(&self, armature: &str) -> Result<Vec<BoneInfo>> {
        let armature = self.armature_or_err(armature)?;
        Ok(armature.bones.iter().map(|b| BoneInfo {
            name: b.name.clone(),
            parent: b.parent.clone(),
        }).collect())
    }

    fn object_matrix(&self, object: &str) -> Result<Matrix4<f64>> {
        let obj = self.object_or_err(object)?;
        let rest = Transform { translation: obj.location, rotation: obj.rotation };
        let xform = self.evaluate_transform(self.object_action(obj), &|prop| prop.to_string(), rest);
        Ok(xform.to_matrix())
    }

    fn pose_bone_matrix(&self, armature: &str, bone: &str) -> Result<Matrix4<f64>> {
        let obj = self.object_or_err(armature)?;
        let arm = self.armature_or_err(armature)?;
        let bone = self.bone_or_err(armature, bone)?;
        self.pose_matrix(obj, arm, bone)
    }

    fn rest_bone_matrix(&self, armature: &str, bone: &str) -> Result<Matrix4<f64>> {
        Ok(self.bone_or_err(armature, bone)?.rest_matrix())
    }
}


#[cfg(test)]
pub mod test_scene {
    //! Small scenes for tests.

    use super::*;
    use super::action::Interpolation;
    use cgmath::{One, vec3};

    pub fn bone(name: &str, parent: Option<&str>, head: Vector3<f64>) -> Bone {
        Bone {
            name: name.to_string(),
            parent: parent.map(|p| p.to_string()),
            head,
            rotation: Quaternion::one(),
        }
    }

    /// Adds linear keyframes for a vector property.
    pub fn key_vec3(action: &mut Action, data_path: &str, group: &str, keys: &[(f64, Vector3<f64>)]) {
        for axis in 0..3 {
            let curve = action.new_curve(data_path, axis, group).unwrap();
            for &(frame, v) in keys {
                curve.add_keyframe(frame, v[axis], Interpolation::Linear);
            }
        }
    }

    /// An armature "Rig" with two root bones. A (the mover) walks from
    /// (0,0,0) to (10,0,0) over 10 frames, B stands still at (5,0,0). A has
    /// a child bone one unit above it.
    pub fn walking_rig() -> Document {
        let mut action = Action::new("Walk".to_string(), (1.0, 10.0));
        key_vec3(&mut action, &bone_data_path("A", LOCATION), "A", &[
            (1.0, vec3(0.0, 0.0, 0.0)),
            (10.0, vec3(10.0, 0.0, 0.0)),
        ]);
        key_vec3(&mut action, &bone_data_path("B", LOCATION), "B", &[
            (1.0, vec3(0.0, 0.0, 0.0)),
        ]);

        Document {
            frame: 1,
            objects: vec![Object {
                name: "Rig".to_string(),
                location: vec3(0.0, 0.0, 0.0),
                rotation: Quaternion::one(),
                animation_data: Some(AnimationData { action: Some("Walk".to_string()) }),
                armature: Some(Armature {
                    bones: vec![
                        bone("A", None, vec3(0.0, 0.0, 0.0)),
                        bone("B", None, vec3(5.0, 0.0, 0.0)),
                        bone("A.child", Some("A"), vec3(0.0, 0.0, 1.0)),
                    ],
                }),
            }],
            actions: vec![action],
        }
    }
}


#[cfg(test)]
use cgmath::vec3;
#[cfg(test)]
use motion::test_util::vec_approx_eq;

#[test]
fn test_frame_guard_restores_frame() {
    let mut doc = test_scene::walking_rig();
    doc.frame = 7;
    {
        let mut guard = FrameGuard::new(&mut doc);
        guard.set_frame(3);
        assert_eq!(guard.frame(), 3);
    }
    assert_eq!(doc.frame, 7);
}

#[test]
fn test_pose_follows_curves() {
    let mut doc = test_scene::walking_rig();
    doc.frame = 10;
    let a = doc.pose_bone_matrix("Rig", "A").unwrap();
    assert!(vec_approx_eq(a.w.truncate(), vec3(10.0, 0.0, 0.0)));

    // B's head is at (5,0,0) and its location curves are all zero.
    let b = doc.pose_bone_matrix("Rig", "B").unwrap();
    assert!(vec_approx_eq(b.w.truncate(), vec3(5.0, 0.0, 0.0)));

    // The child rides along with A.
    let child = doc.pose_bone_matrix("Rig", "A.child").unwrap();
    assert!(vec_approx_eq(child.w.truncate(), vec3(10.0, 0.0, 1.0)));
}

#[test]
fn test_euler_rotation() {
    use self::action::Interpolation;
    use std::f64::consts::FRAC_PI_2;

    let mut doc = test_scene::walking_rig();
    {
        let action = doc.action_mut("Walk").unwrap();
        action.new_curve(ROTATION_EULER, 2, "Object Transforms").unwrap()
            .add_keyframe(1.0, FRAC_PI_2, Interpolation::Constant);
    }
    let m = doc.object_matrix("Rig").unwrap();
    let x_axis = m.x.truncate();
    assert!(vec_approx_eq(x_axis, vec3(0.0, 1.0, 0.0)));
}

#[test]
fn test_unknown_names() {
    let doc = test_scene::walking_rig();
    assert!(doc.bones("Nope").is_err());
    assert!(doc.pose_bone_matrix("Rig", "C").is_err());
    assert_eq!(doc.object_kind("Rig"), Some(ObjectKind::Armature));
    assert_eq!(doc.object_kind("Nope"), None);
}

#[test]
fn test_hierarchy_rejects_cycles() {
    let mut arm = Armature {
        bones: vec![
            test_scene::bone("a", Some("b"), vec3(0.0, 0.0, 0.0)),
            test_scene::bone("b", Some("a"), vec3(0.0, 0.0, 0.0)),
        ],
    };
    assert!(arm.hierarchy().is_err());
    arm.bones[0].parent = None;
    let graph = arm.hierarchy().unwrap();
    assert_eq!(graph.edge_count(), 1);

    arm.bones[1].parent = Some("c".to_string());
    assert!(arm.hierarchy().is_err());
}
