//! Writing a `Document` back out in the layout `read` understands.

use cgmath::{Quaternion, Vector3};
use errors::Result;
use json::JsonValue;
use scene::{Document, Object};
use scene::action::Action;
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn write_document(doc: &Document, path: &Path) -> Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(to_json(doc).pretty(2).as_bytes())?;
    f.write_all(b"\n")?;
    Ok(())
}

pub fn to_json(doc: &Document) -> JsonValue {
    let mut objects = JsonValue::new_array();
    for obj in &doc.objects {
        let _ = objects.push(object_json(obj));
    }
    let mut actions = JsonValue::new_array();
    for action in &doc.actions {
        let _ = actions.push(action_json(action));
    }
    object!(
        "frame" => doc.frame,
        "objects" => objects,
        "actions" => actions,
    )
}

fn vec3_json(v: Vector3<f64>) -> JsonValue {
    array!(v.x, v.y, v.z)
}

fn quat_json(q: Quaternion<f64>) -> JsonValue {
    array!(q.s, q.v.x, q.v.y, q.v.z)
}

fn opt_str_json(s: &Option<String>) -> JsonValue {
    match *s {
        Some(ref s) => s.as_str().into(),
        None => JsonValue::Null,
    }
}

fn object_json(obj: &Object) -> JsonValue {
    let mut o = object!(
        "name" => obj.name.as_str(),
        "type" => if obj.armature.is_some() { "ARMATURE" } else { "EMPTY" },
        "location" => vec3_json(obj.location),
        "rotation_quaternion" => quat_json(obj.rotation),
    );
    if let Some(ref anim_data) = obj.animation_data {
        o["animation_data"] = object!(
            "action" => opt_str_json(&anim_data.action),
        );
    }
    if let Some(ref armature) = obj.armature {
        let mut bones = JsonValue::new_array();
        for bone in &armature.bones {
            let _ = bones.push(object!(
                "name" => bone.name.as_str(),
                "parent" => opt_str_json(&bone.parent),
                "head" => vec3_json(bone.head),
                "rotation" => quat_json(bone.rotation),
            ));
        }
        o["bones"] = bones;
    }
    o
}

fn action_json(action: &Action) -> JsonValue {
    let mut curves = JsonValue::new_array();
    for curve in &action.curves {
        let mut keyframes = JsonValue::new_array();
        for k in &curve.keyframes {
            let _ = keyframes.push(array!(k.frame, k.value, k.interpolation.name()));
        }
        let _ = curves.push(object!(
            "data_path" => curve.data_path.as_str(),
            "index" => curve.index,
            "group" => opt_str_json(&curve.group),
            "keyframes" => keyframes,
        ));
    }
    object!(
        "name" => action.name.as_str(),
        "frame_range" => array!(action.frame_range.0, action.frame_range.1),
        "curves" => curves,
    )
}


#[test]
fn test_write_then_read() {
    use scene::read::parse_document;
    use scene::test_scene::walking_rig;

    let doc = walking_rig();
    let s = to_json(&doc).dump();
    let back = parse_document(&s).unwrap();
    assert_eq!(back, doc);
}
