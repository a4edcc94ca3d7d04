//! `info` and `dump` subcommands: look at a scene without changing it.

use clap::ArgMatches;
use errors::{ErrorKind, Result};
use motion::MotionFmt;
use motion::channel::{BoneChannel, MotionChannel, ObjectChannel};
use petgraph::Direction;
use petgraph::Graph;
use petgraph::graph::NodeIndex;
use scene::{Armature, Document, Host};
use scene::action::Action;
use scene::read::read_document;
use std::path::PathBuf;

pub fn main(matches: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(matches.value_of_os("INPUT").unwrap());
    let doc = read_document(&input)?;

    println!("Current Frame: {}", doc.frame);
    println!();
    for obj in &doc.objects {
        println!("Object {:?}:", obj.name);
        println!("  Type: {}", if obj.armature.is_some() { "Armature" } else { "Empty" });
        let l = obj.location;
        println!("  Location: ({}, {}, {})", l.x, l.y, l.z);
        match obj.animation_data {
            None => println!("  Animation Data: none"),
            Some(ref anim_data) => match anim_data.action {
                Some(ref action) => println!("  Action: {:?}", action),
                None => println!("  Action: none"),
            },
        }
        if let Some(ref armature) = obj.armature {
            println!("  Bones ({} total):", armature.bones.len());
            let hierarchy = armature.hierarchy()?;
            for node in hierarchy.node_indices() {
                let is_root = hierarchy
                    .neighbors_directed(node, Direction::Incoming)
                    .next().is_none();
                if is_root {
                    print_bone_tree(armature, &hierarchy, node, 2);
                }
            }
        }
        println!();
    }

    for action in &doc.actions {
        action_info(action);
    }

    Ok(())
}

fn print_bone_tree(armature: &Armature, hierarchy: &Graph<usize, ()>, node: NodeIndex, depth: usize) {
    let bone = &armature.bones[hierarchy[node]];
    println!("{:indent$}{:?}{}", "", bone.name,
        if depth == 2 { " (root)" } else { "" },
        indent = 2 * depth,
    );
    // neighbors come out newest edge first
    let mut children: Vec<NodeIndex> = hierarchy
        .neighbors_directed(node, Direction::Outgoing)
        .collect();
    children.reverse();
    for child in children {
        print_bone_tree(armature, hierarchy, child, depth + 1);
    }
}

fn action_info(action: &Action) {
    println!("Action {:?}:", action.name);
    println!("  Frame Range: {} - {}", action.frame_range.0, action.frame_range.1);
    println!("  Frames Sampled: {}", action.frame_count());
    println!("  Curves ({} total):", action.curves.len());
    for curve in &action.curves {
        print!("    {}[{}]: {} keyframes", curve.data_path, curve.index, curve.keyframes.len());
        if let Some(ref group) = curve.group {
            print!(" (group {:?})", group);
        }
        println!();
    }
    println!();
}

/// Prints the motion of a bone, or of the armature object itself when no
/// bone is given.
pub fn dump_main(matches: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(matches.value_of_os("INPUT").unwrap());
    let armature = matches.value_of("ARMATURE").unwrap();
    let mut doc = read_document(&input)?;

    let frames = frame_count(&doc, armature)?;
    match matches.value_of("BONE") {
        Some(bone) => {
            let channel = BoneChannel::new(&doc, armature, bone)?;
            dump(&mut doc, &channel, frames)
        }
        None => dump(&mut doc, &ObjectChannel::new(armature), frames),
    }
}

/// Number of frames in the action assigned to `object`.
fn frame_count(doc: &Document, object: &str) -> Result<usize> {
    let obj = doc.object_or_err(object)?;
    let action = match obj.animation_data {
        None => { bail!(ErrorKind::Validation(format!("{:?} has no animation data", object))) }
        Some(ref anim_data) => match anim_data.action {
            None => { bail!(ErrorKind::Validation(format!("{:?} has no action assigned", object))) }
            Some(ref action) => action,
        },
    };
    match doc.action(action) {
        Some(action) => action.checked_frame_count(),
        None => { bail!(ErrorKind::UnknownAction(action.clone())) }
    }
}

fn dump<C: MotionChannel>(doc: &mut Document, channel: &C, frames: usize) -> Result<()> {
    let motion = channel.sample_motion(doc, frames)?;
    println!("Motion of {}:", channel.name());
    print!("{}", MotionFmt(&motion));
    Ok(())
}


#[cfg(test)]
use scene::test_scene::walking_rig;

#[test]
fn test_dump_frame_count() {
    let mut doc = walking_rig();
    assert_eq!(frame_count(&doc, "Rig").unwrap(), 10);
    assert!(frame_count(&doc, "Nope").is_err());

    doc.action_mut("Walk").unwrap().frame_range = (1.0, 1e18);
    assert!(frame_count(&doc, "Rig").is_err());

    doc.objects[0].animation_data.as_mut().unwrap().action = None;
    assert!(frame_count(&doc, "Rig").is_err());

    doc.objects[0].animation_data = None;
    match frame_count(&doc, "Rig") {
        Err(e) => match *e.kind() {
            ErrorKind::Validation(_) => (),
            _ => panic!("wrong error: {}", e),
        },
        Ok(n) => panic!("expected an error, got {} frames", n),
    }
}
