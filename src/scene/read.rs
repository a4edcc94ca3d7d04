//! Reading a `Document` from a JSON scene file.
//!
//! ```text
//! { "frame": 1,
//!   "objects": [
//!     { "name": "Rig", "type": "ARMATURE",
//!       "location": [0, 0, 0], "rotation_quaternion": [1, 0, 0, 0],
//!       "animation_data": { "action": "Walk" },
//!       "bones": [
//!         { "name": "root", "parent": null,
//!           "head": [0, 0, 0], "rotation": [1, 0, 0, 0] } ] } ],
//!   "actions": [
//!     { "name": "Walk", "frame_range": [1, 24],
//!       "curves": [
//!         { "data_path": "pose.bones[\"root\"].location", "index": 0,
//!           "group": "root", "keyframes": [[1, 0.0, "LINEAR"]] } ] } ] }
//! ```
//!
//! Quaternions are stored w first. Missing transforms default to the
//! identity, a missing `frame_range` is the range of the keyframes.

use cgmath::{Quaternion, Vector3, vec3, One, Zero};
use errors::{ErrorKind, Result, ResultExt};
use json::{self, JsonValue};
use scene::{AnimationData, Armature, Bone, Document, Object};
use scene::action::{Action, Curve, Interpolation};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::Path;

pub fn read_document(path: &Path) -> Result<Document> {
    let mut s = String::new();
    fs::File::open(path)?.read_to_string(&mut s)?;
    parse_document(&s)
        .chain_err(|| format!("couldn't read scene {}", path.to_string_lossy()))
}

pub fn parse_document(s: &str) -> Result<Document> {
    let root = json::parse(s)?;

    let frame = match root["frame"].as_i32() {
        Some(f) => f,
        None if root["frame"].is_null() => 1,
        None => { bail!(bad("frame should be an integer")) }
    };

    let mut objects = vec![];
    for obj in root["objects"].members() {
        objects.push(read_object(obj)?);
    }

    let mut actions = vec![];
    for action in root["actions"].members() {
        actions.push(read_action(action)?);
    }

    let doc = Document { frame, objects, actions };
    validate(&doc)?;
    debug!("read scene with {} objects and {} actions", doc.objects.len(), doc.actions.len());
    Ok(doc)
}

fn bad<S: Into<String>>(msg: S) -> ErrorKind {
    ErrorKind::BadScene(msg.into())
}

fn read_str(v: &JsonValue, what: &str) -> Result<String> {
    match v.as_str() {
        Some(s) => Ok(s.to_string()),
        None => { bail!(bad(format!("{} should be a string", what))) }
    }
}

fn read_opt_str(v: &JsonValue, what: &str) -> Result<Option<String>> {
    if v.is_null() { Ok(None) } else { read_str(v, what).map(Some) }
}

fn read_numbers(v: &JsonValue, n: usize, what: &str) -> Result<Vec<f64>> {
    if !v.is_array() || v.len() != n {
        bail!(bad(format!("{} should be a list of {} numbers", what, n)));
    }
    let mut nums = Vec::with_capacity(n);
    for x in v.members() {
        match x.as_f64() {
            Some(x) => nums.push(x),
            None => { bail!(bad(format!("{} should be a list of {} numbers", what, n))) }
        }
    }
    Ok(nums)
}

fn read_vec3(v: &JsonValue, what: &str) -> Result<Vector3<f64>> {
    if v.is_null() { return Ok(Vector3::zero()); }
    let n = read_numbers(v, 3, what)?;
    Ok(vec3(n[0], n[1], n[2]))
}

fn read_quat(v: &JsonValue, what: &str) -> Result<Quaternion<f64>> {
    if v.is_null() { return Ok(Quaternion::one()); }
    let n = read_numbers(v, 4, what)?;
    Ok(Quaternion::new(n[0], n[1], n[2], n[3]))
}

fn read_object(v: &JsonValue) -> Result<Object> {
    let name = read_str(&v["name"], "object name")?;
    let what = |field: &str| format!("{} of object {:?}", field, name);

    let location = read_vec3(&v["location"], &what("location"))?;
    let rotation = read_quat(&v["rotation_quaternion"], &what("rotation_quaternion"))?;

    let animation_data = if v["animation_data"].is_null() {
        None
    } else {
        let action = read_opt_str(&v["animation_data"]["action"], &what("action"))?;
        Some(AnimationData { action })
    };

    let kind = v["type"].as_str().unwrap_or("EMPTY");
    let armature = match kind {
        "ARMATURE" => {
            let mut bones = vec![];
            for b in v["bones"].members() {
                let bone_name = read_str(&b["name"], &what("bone name"))?;
                let what = |field: &str| format!("{} of bone {:?}", field, bone_name);
                bones.push(Bone {
                    parent: read_opt_str(&b["parent"], &what("parent"))?,
                    head: read_vec3(&b["head"], &what("head"))?,
                    rotation: read_quat(&b["rotation"], &what("rotation"))?,
                    name: bone_name.clone(),
                });
            }
            Some(Armature { bones })
        }
        "EMPTY" => None,
        _ => { bail!(bad(format!("unknown object type {:?}", kind))) }
    };

    Ok(Object { name, location, rotation, animation_data, armature })
}

fn read_action(v: &JsonValue) -> Result<Action> {
    let name = read_str(&v["name"], "action name")?;

    let mut curves: Vec<Curve> = vec![];
    for c in v["curves"].members() {
        let data_path = read_str(&c["data_path"], &format!("data_path in action {:?}", name))?;
        let index = match c["index"].as_usize() {
            Some(i) => i,
            None => { bail!(bad(format!("curve {} in action {:?} needs an index", data_path, name))) }
        };
        let group = read_opt_str(&c["group"], "curve group")?;
        let mut curve = Curve::new(data_path, index, group);
        for key in c["keyframes"].members() {
            check!(key.is_array() && key.len() == 3)?;
            let (frame, value) = match (key[0].as_f64(), key[1].as_f64()) {
                (Some(f), Some(v)) => (f, v),
                _ => { bail!(bad(format!("bad keyframe on {}[{}]", curve.data_path, curve.index))) }
            };
            let interpolation = match key[2].as_str().and_then(Interpolation::from_name) {
                Some(i) => i,
                None => { bail!(bad(format!("bad interpolation on {}[{}]", curve.data_path, curve.index))) }
            };
            curve.add_keyframe(frame, value, interpolation);
        }
        curves.push(curve);
    }

    let frame_range = if v["frame_range"].is_null() {
        keyframe_range(&curves)
    } else {
        let n = read_numbers(&v["frame_range"], 2, &format!("frame_range of action {:?}", name))?;
        (n[0], n[1])
    };

    Ok(Action { name, frame_range, curves })
}

/// Frames spanned by all the keyframes, (1, 1) if there are none.
fn keyframe_range(curves: &[Curve]) -> (f64, f64) {
    let mut frames = curves.iter().flat_map(|c| c.keyframes.iter().map(|k| k.frame));
    let first = match frames.next() {
        Some(f) => f,
        None => return (1.0, 1.0),
    };
    frames.fold((first, first), |(lo, hi), f| (lo.min(f), hi.max(f)))
}

/// Checks names are unique and references resolve.
fn validate(doc: &Document) -> Result<()> {
    let mut seen = HashSet::new();
    for action in &doc.actions {
        if !seen.insert(action.name.as_str()) {
            bail!(bad(format!("two actions are named {:?}", action.name)));
        }
        let mut addrs = HashSet::new();
        for c in &action.curves {
            if !addrs.insert((c.data_path.as_str(), c.index)) {
                bail!(bad(format!("action {:?} has two curves at {}[{}]",
                    action.name, c.data_path, c.index)));
            }
        }
    }

    let mut seen = HashSet::new();
    for obj in &doc.objects {
        if !seen.insert(obj.name.as_str()) {
            bail!(bad(format!("two objects are named {:?}", obj.name)));
        }
        if let Some(AnimationData { action: Some(ref action) }) = obj.animation_data {
            if !doc.actions.iter().any(|a| a.name == *action) {
                bail!(ErrorKind::UnknownAction(action.clone()));
            }
        }
        if let Some(ref armature) = obj.armature {
            armature.hierarchy()
                .chain_err(|| format!("in armature {:?}", obj.name))?;
        }
    }

    Ok(())
}


#[cfg(test)]
static SCENE: &str = r#"{
    "frame": 3,
    "objects": [
        { "name": "Rig", "type": "ARMATURE",
          "animation_data": { "action": "Walk" },
          "bones": [
            { "name": "root", "parent": null, "head": [0, 0, 0] },
            { "name": "spine", "parent": "root", "head": [0, 0, 1],
              "rotation": [1, 0, 0, 0] } ] },
        { "name": "Lamp", "location": [1, 2, 3] }
    ],
    "actions": [
        { "name": "Walk",
          "curves": [
            { "data_path": "pose.bones[\"root\"].location", "index": 0,
              "group": "root",
              "keyframes": [[1, 0.0, "LINEAR"], [5, 4.0, "CONSTANT"]] } ] }
    ]
}"#;

#[test]
fn test_parse_document() {
    let doc = parse_document(SCENE).unwrap();
    assert_eq!(doc.frame, 3);
    assert_eq!(doc.objects.len(), 2);

    let rig = &doc.objects[0];
    assert_eq!(rig.animation_data, Some(AnimationData { action: Some("Walk".to_string()) }));
    let bones = &rig.armature.as_ref().unwrap().bones;
    assert_eq!(bones[1].parent, Some("root".to_string()));
    assert_eq!(bones[1].head, vec3(0.0, 0.0, 1.0));

    let lamp = &doc.objects[1];
    assert!(lamp.armature.is_none());
    assert!(lamp.animation_data.is_none());
    assert_eq!(lamp.location, vec3(1.0, 2.0, 3.0));

    let action = &doc.actions[0];
    assert_eq!(action.frame_range, (1.0, 5.0));
    assert_eq!(action.curves[0].keyframes[1].interpolation, Interpolation::Constant);
}

#[test]
fn test_parse_errors() {
    assert!(parse_document("{ nope").is_err());
    assert!(parse_document(r#"{ "objects": [ { "name": "A", "animation_data": { "action": "X" } } ] }"#).is_err());
    assert!(parse_document(r#"{ "objects": [ { "name": "A" }, { "name": "A" } ] }"#).is_err());
    assert!(parse_document(r#"{ "objects": [ { "name": "A", "location": [1, 2] } ] }"#).is_err());
    assert!(parse_document(r#"{ "objects": [ { "name": "A", "type": "ARMATURE",
        "bones": [ { "name": "b", "parent": "b" } ] } ] }"#).is_err());
    assert!(parse_document(r#"{ "actions": [ { "name": "W", "curves": [
        { "data_path": "location", "index": 0, "keyframes": [[1, 0, "BEZIER"]] } ] } ] }"#).is_err());
}
