//! Moves the motion accumulated in a bone onto the armature object.
//!
//! The mover bone's motion is sampled and filtered (see `FilterConfig`), and
//! the filtered motion F is put on top of the object's own motion O. Then
//! every root bone is re-expressed relative to F, so that the pose in world
//! space doesn't change:
//!
//!     world = O · bone = (O · F) · (F⁻¹ · bone)
//!
//! If the mover is itself a root bone it is rewritten too, and what is left on
//! it is exactly what the filter didn't take (eg. the vertical bob).
//!
//! Everything is sampled and computed before the first curve is written, so a
//! failure while sampling leaves the scene untouched.

use clap::ArgMatches;
use errors::{ErrorKind, Result};
use motion::Motion;
use motion::channel::{BoneChannel, MotionChannel, ObjectChannel};
use motion::filter::FilterConfig;
use motion::transform_utils::relative_motion;
use report::{LogReport, Report};
use scene::{bone_data_path, Host, ObjectKind, ROTATION_EULER, ROTATION_QUATERNION};
use scene::read::read_document;
use scene::write::write_document;
use std::path::PathBuf;

pub fn main(matches: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(matches.value_of_os("INPUT").unwrap());
    let output = PathBuf::from(matches.value_of_os("OUTPUT").unwrap());
    let armature = matches.value_of("ARMATURE").unwrap();
    let bone = matches.value_of("BONE").unwrap();
    let config = FilterConfig::from_arg_matches(matches)?;

    let mut doc = read_document(&input)?;

    info!("extracting {} from bone {:?} of {:?}", config, bone, armature);
    let filter = MotionExtractionFilter::new(armature, bone, config);
    let summary = filter.execute(&mut doc, &mut LogReport)?;

    write_document(&doc, &output)?;

    let plural = |x| if x != 1 { "s" } else { "" };
    println!("Extracted {} frame{}, rewrote {} root bone{}.",
        summary.frames, plural(summary.frames),
        summary.rewritten.len(), plural(summary.rewritten.len()),
    );
    if !summary.skipped.is_empty() {
        println!("Skipped: {}", summary.skipped.join(", "));
    }
    Ok(())
}

pub struct MotionExtractionFilter {
    pub armature: String,
    /// Bone currently carrying the motion.
    pub mover: String,
    pub config: FilterConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    pub frames: usize,
    /// Root bones whose motion was rewritten.
    pub rewritten: Vec<String>,
    /// Root bones that were left alone because their motion couldn't be
    /// computed.
    pub skipped: Vec<String>,
}

/// A bone write waiting for the commit.
struct Staged {
    channel: BoneChannel,
    motion: Motion,
    include_rotation: bool,
}

impl MotionExtractionFilter {
    pub fn new(armature: &str, mover: &str, config: FilterConfig) -> MotionExtractionFilter {
        MotionExtractionFilter {
            armature: armature.to_string(),
            mover: mover.to_string(),
            config,
        }
    }

    /// Runs the extraction, sending any failure to `report`. Returns whether
    /// it succeeded.
    pub fn run<H: Host + ?Sized>(&self, host: &mut H, report: &mut dyn Report) -> bool {
        match self.execute(host, report) {
            Ok(_) => true,
            Err(e) => {
                report.error(format!("Extract Motion: {}", e));
                false
            }
        }
    }

    /// Runs the extraction. Errors returned before anything was written
    /// leave the host untouched; problems with single bones are sent to
    /// `report` and those bones are skipped.
    pub fn execute<H: Host + ?Sized>(&self, host: &mut H, report: &mut dyn Report) -> Result<ExtractionSummary> {
        let action_name = self.validate(&*host)?;
        let frames = match host.action(&action_name) {
            Some(action) => action.checked_frame_count()?,
            None => { bail!(ErrorKind::UnknownAction(action_name.clone())) }
        };
        if frames == 0 {
            bail!(ErrorKind::Validation(format!("action {:?} has no frames", action_name)));
        }
        let bones = host.bones(&self.armature)?;

        let mover = BoneChannel::new(&*host, &self.armature, &self.mover)?;
        let mover_motion = mover.sample_motion(host, frames)?;
        let filtered = self.config.filter_motion(&mover_motion);
        debug!("sampled {} frames from {}", frames, mover.name());

        // The object keeps whatever transform it already had and takes the
        // filtered motion on top of it.
        let object = ObjectChannel::new(&self.armature);
        let object_motion: Motion = object.sample_motion(host, frames)?
            .iter()
            .zip(filtered.iter())
            .map(|(o, f)| o.compose(f))
            .collect();

        if bones.iter().any(|b| b.name == self.mover && b.parent.is_some()) {
            debug!("mover {:?} isn't a root bone; its own curves stay as they are", self.mover);
        }

        let (object_had_motion, object_had_rotation) = match host.action(&action_name) {
            Some(action) => (
                object.has_motion(action),
                action.has_curves_at(&object.data_path(ROTATION_QUATERNION)) ||
                    action.has_curves_at(&object.data_path(ROTATION_EULER)),
            ),
            None => (false, false),
        };

        let mut staged = vec![];
        let mut skipped = vec![];
        for bone in bones.iter().filter(|b| b.parent.is_none()) {
            let channel = BoneChannel::new(&*host, &self.armature, &bone.name)?;
            let original = if bone.name == self.mover {
                mover_motion.clone()
            } else {
                channel.sample_motion(host, frames)?
            };

            let motion = relative_motion(&filtered, &original, report);
            if motion.is_empty() {
                report.error(format!("skipping bone {:?}; its motion couldn't be computed", bone.name));
                skipped.push(bone.name.clone());
                continue;
            }

            // Leave bones without rotation curves that way unless rotation is
            // being moved around.
            let had_rotation = host.action(&action_name).map_or(false, |action| {
                action.has_curves_at(&bone_data_path(&bone.name, ROTATION_QUATERNION)) ||
                    action.has_curves_at(&bone_data_path(&bone.name, ROTATION_EULER))
            });
            let include_rotation = had_rotation || self.config.include_rotation;

            staged.push(Staged { channel, motion, include_rotation });
        }

        // Commit.
        let action = match host.action_mut(&action_name) {
            Some(action) => action,
            None => { bail!(ErrorKind::UnknownAction(action_name.clone())) }
        };

        if object_had_motion {
            report.warning(format!("replacing the existing motion of {}", object.name()));
        }
        let include_rotation = object_had_rotation || self.config.include_rotation;
        object.set_motion(action, &object_motion, include_rotation)?;

        let mut rewritten = vec![];
        for s in staged {
            s.channel.set_motion(action, &s.motion, s.include_rotation)?;
            rewritten.push(s.channel.bone.clone());
        }

        Ok(ExtractionSummary { frames, rewritten, skipped })
    }

    /// Checks the request makes sense and returns the name of the action to
    /// work on.
    fn validate<H: Host + ?Sized>(&self, host: &H) -> Result<String> {
        let fail = |msg: String| -> Result<String> { Err(ErrorKind::Validation(msg).into()) };

        if self.armature.is_empty() {
            return fail("no armature object specified".to_string());
        }
        if self.mover.is_empty() {
            return fail("no bone specified as the mover channel".to_string());
        }
        match host.object_kind(&self.armature) {
            Some(ObjectKind::Armature) => (),
            Some(_) => return fail(format!("{:?} is not an armature", self.armature)),
            None => return fail(format!("the armature {:?} doesn't exist", self.armature)),
        }

        let action = match host.animation_data(&self.armature)? {
            None => return fail(format!("{:?} has no animation data", self.armature)),
            Some(anim_data) => match anim_data.action {
                None => return fail(format!("{:?} has no action assigned", self.armature)),
                Some(action) => action,
            },
        };

        if !host.bones(&self.armature)?.iter().any(|b| b.name == self.mover) {
            return fail(format!("{:?} has no bone named {:?}", self.armature, self.mover));
        }

        Ok(action)
    }
}


#[cfg(test)]
use cgmath::{One, Quaternion, Rad, Rotation, Rotation3, vec3};
#[cfg(test)]
use log::Level;
#[cfg(test)]
use motion::Transform;
#[cfg(test)]
use motion::test_util::{quat_approx_eq, vec_approx_eq, xform_approx_eq};
#[cfg(test)]
use scene::{Document, LOCATION};
#[cfg(test)]
use scene::action::Interpolation;
#[cfg(test)]
use scene::test_scene::{key_vec3, walking_rig};

/// Samples a channel at every frame.
#[cfg(test)]
fn sample<C: MotionChannel>(doc: &mut Document, channel: &C) -> Motion {
    channel.sample_motion(doc, 10).unwrap()
}

#[test]
fn test_worldspace_preserved() {
    let mut doc = walking_rig();

    let filter = MotionExtractionFilter::new("Rig", "A", FilterConfig::default());
    let mut reports: Vec<(Level, String)> = vec![];
    let summary = filter.execute(&mut doc, &mut reports).unwrap();
    assert!(reports.is_empty());
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.rewritten, vec!["A".to_string(), "B".to_string()]);
    assert!(summary.skipped.is_empty());

    let a_channel = BoneChannel::new(&doc, "Rig", "A").unwrap();
    let object = sample(&mut doc, &ObjectChannel::new("Rig"));
    let a = sample(&mut doc, &a_channel);

    for i in 0..10 {
        let x = i as f64 * 10.0 / 9.0;
        assert!(vec_approx_eq(object[i].translation, vec3(x, 0.0, 0.0)));
        assert!(quat_approx_eq(object[i].rotation, Quaternion::one()));

        // A has nothing left.
        assert!(xform_approx_eq(&a[i], &Transform::identity()));

        // B still stands at (5,0,0) in world space.
        doc.frame = i as i32 + 1;
        let b_world = doc.object_matrix("Rig").unwrap() * doc.pose_bone_matrix("Rig", "B").unwrap();
        assert!(vec_approx_eq(b_world.w.truncate(), vec3(5.0, 0.0, 0.0)));
    }
}

#[test]
fn test_filtered_out_motion_stays_on_mover() {
    let mut doc = walking_rig();
    {
        let action = doc.action_mut("Walk").unwrap();
        for i in 0..3 {
            action.remove_curve(&bone_data_path("A", LOCATION), i);
        }
        key_vec3(action, &bone_data_path("A", LOCATION), "A", &[
            (1.0, vec3(0.0, 0.0, 0.0)),
            (10.0, vec3(9.0, 3.0, 1.8)),
        ]);
    }

    let filter = MotionExtractionFilter::new("Rig", "A", FilterConfig::default());
    filter.execute(&mut doc, &mut Vec::<(Level, String)>::new()).unwrap();

    let a_channel = BoneChannel::new(&doc, "Rig", "A").unwrap();
    let object = sample(&mut doc, &ObjectChannel::new("Rig"));
    let a = sample(&mut doc, &a_channel);
    for i in 0..10 {
        let t = i as f64 / 9.0;
        assert!(vec_approx_eq(object[i].translation, vec3(9.0 * t, 3.0 * t, 0.0)));
        assert!(vec_approx_eq(a[i].translation, vec3(0.0, 0.0, 1.8 * t)));
    }
}

#[test]
fn test_rotation_extraction_preserves_world() {
    let mut doc = walking_rig();
    {
        let action = doc.action_mut("Walk").unwrap();
        let path = bone_data_path("A", ROTATION_QUATERNION);
        let turned = Quaternion::from_angle_z(Rad(1.2)) * Quaternion::from_angle_x(Rad(0.2));
        let keys = [(1.0, Quaternion::one()), (10.0, turned)];
        for idx in 0..4 {
            let curve = action.new_curve(&path, idx, "A").unwrap();
            for &(frame, q) in &keys {
                let v = [q.s, q.v.x, q.v.y, q.v.z][idx];
                curve.add_keyframe(frame, v, Interpolation::Linear);
            }
        }
    }

    // Bones with heads at the origin keep their world transform exactly.
    let a_channel = BoneChannel::new(&doc, "Rig", "A").unwrap();
    let a_before = sample(&mut doc, &a_channel);

    let config = FilterConfig { include_rotation: true, ..FilterConfig::default() };
    let filter = MotionExtractionFilter::new("Rig", "A", config);
    filter.execute(&mut doc, &mut Vec::<(Level, String)>::new()).unwrap();

    let object = sample(&mut doc, &ObjectChannel::new("Rig"));
    let a_after = sample(&mut doc, &a_channel);
    for i in 0..10 {
        assert!(xform_approx_eq(&object[i].compose(&a_after[i]), &a_before[i]));
        // The object only turns about Z.
        let axis_z = object[i].rotation.rotate_vector(vec3(0.0, 0.0, 1.0));
        assert!(vec_approx_eq(axis_z, vec3(0.0, 0.0, 1.0)));
    }
}

#[test]
fn test_validation_leaves_scene_alone() {
    let cases = [
        ("", "A"),
        ("Rig", ""),
        ("Nope", "A"),
        ("Rig", "Nope"),
    ];
    for &(armature, mover) in &cases {
        let mut doc = walking_rig();
        let before = doc.clone();
        let mut reports: Vec<(Level, String)> = vec![];
        let filter = MotionExtractionFilter::new(armature, mover, FilterConfig::default());
        assert!(!filter.run(&mut doc, &mut reports));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, Level::Error);
        assert_eq!(doc, before);
    }

    let mut doc = walking_rig();
    doc.objects[0].animation_data = None;
    let before = doc.clone();
    let filter = MotionExtractionFilter::new("Rig", "A", FilterConfig::default());
    match filter.execute(&mut doc, &mut Vec::<(Level, String)>::new()) {
        Err(e) => match *e.kind() {
            ErrorKind::Validation(_) => (),
            _ => panic!("wrong error: {}", e),
        },
        Ok(_) => panic!("expected an error"),
    }
    assert_eq!(doc, before);

    let mut doc = walking_rig();
    doc.objects[0].animation_data.as_mut().unwrap().action = None;
    assert!(!filter.run(&mut doc, &mut Vec::<(Level, String)>::new()));
}

#[test]
fn test_existing_object_motion_is_replaced() {
    let mut doc = walking_rig();
    key_vec3(doc.action_mut("Walk").unwrap(), LOCATION, "Object Transforms", &[
        (1.0, vec3(0.0, 0.0, 7.0)),
    ]);
    let mut reports: Vec<(Level, String)> = vec![];
    let filter = MotionExtractionFilter::new("Rig", "A", FilterConfig::default());
    assert!(filter.run(&mut doc, &mut reports));
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, Level::Warn);

    // The old object motion is kept underneath the extracted one.
    let object = sample(&mut doc, &ObjectChannel::new("Rig"));
    assert!(vec_approx_eq(object[9].translation, vec3(10.0, 0.0, 7.0)));
}

#[test]
fn test_child_mover() {
    // Taking the motion off a child bone moves the roots the other way.
    let mut doc = walking_rig();
    key_vec3(doc.action_mut("Walk").unwrap(), &bone_data_path("A.child", LOCATION), "A.child", &[
        (1.0, vec3(0.0, 0.0, 0.0)),
        (10.0, vec3(0.0, 4.5, 0.0)),
    ]);
    let child_world_before: Vec<_> = (1..11).map(|f| {
        doc.frame = f;
        doc.pose_bone_matrix("Rig", "A.child").unwrap().w.truncate()
    }).collect();
    doc.frame = 1;

    let filter = MotionExtractionFilter::new("Rig", "A.child", FilterConfig::default());
    let summary = filter.execute(&mut doc, &mut Vec::<(Level, String)>::new()).unwrap();
    assert_eq!(summary.rewritten.len(), 2);

    for f in 1..11 {
        doc.frame = f;
        let object = doc.object_matrix("Rig").unwrap();
        let child = doc.pose_bone_matrix("Rig", "A.child").unwrap();
        let world = (object * child).w.truncate();
        assert!(vec_approx_eq(world, child_world_before[(f - 1) as usize]));
    }
}

#[test]
fn test_object_transform_kept() {
    // The rig stands turned and off to the side; nothing may move in world
    // space.
    let mut doc = walking_rig();
    doc.objects[0].location = vec3(3.0, 0.0, 0.0);
    doc.objects[0].rotation = Quaternion::from_angle_z(Rad(0.5));
    let world_before: Vec<_> = (1..11).map(|f| {
        doc.frame = f;
        let object = doc.object_matrix("Rig").unwrap();
        ["A", "B", "A.child"].iter()
            .map(|bone| (object * doc.pose_bone_matrix("Rig", bone).unwrap()).w.truncate())
            .collect::<Vec<_>>()
    }).collect();
    doc.frame = 1;

    let filter = MotionExtractionFilter::new("Rig", "A", FilterConfig::default());
    let mut reports: Vec<(Level, String)> = vec![];
    filter.execute(&mut doc, &mut reports).unwrap();
    assert!(reports.is_empty());

    let object = sample(&mut doc, &ObjectChannel::new("Rig"));
    for f in 1..11 {
        // The walk happens along the rig's own X axis.
        let x = (f - 1) as f64 * 10.0 / 9.0;
        let walked = Quaternion::from_angle_z(Rad(0.5)).rotate_vector(vec3(x, 0.0, 0.0));
        assert!(vec_approx_eq(object[f - 1].translation, vec3(3.0, 0.0, 0.0) + walked));
        assert!(quat_approx_eq(object[f - 1].rotation, Quaternion::from_angle_z(Rad(0.5))));

        doc.frame = f as i32;
        let object_matrix = doc.object_matrix("Rig").unwrap();
        for (i, bone) in ["A", "B", "A.child"].iter().enumerate() {
            let world = (object_matrix * doc.pose_bone_matrix("Rig", bone).unwrap()).w.truncate();
            assert!(vec_approx_eq(world, world_before[f - 1][i]));
        }
    }
}

#[test]
fn test_overlong_action_refused() {
    let mut doc = walking_rig();
    doc.action_mut("Walk").unwrap().frame_range = (1.0, 1e18);
    let before = doc.clone();

    let mut reports: Vec<(Level, String)> = vec![];
    let filter = MotionExtractionFilter::new("Rig", "A", FilterConfig::default());
    assert!(!filter.run(&mut doc, &mut reports));
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, Level::Error);
    assert_eq!(doc, before);
}
