//! Actions: the keyframe curves an object is animated with.
//!
//! A curve animates one component (`index`) of one property (`data_path`),
//! eg. `location` index 1 is the Y location of an object and
//! `pose.bones["hips"].rotation_quaternion` index 0 is the W component of the
//! hips bone's rotation.

use errors::{ErrorKind, Result};
use std::cmp::Ordering;

/// Frames are numbered with `i32`s from 1, so no action can be sampled for
/// more frames than this.
pub const MAX_FRAMES: usize = ::std::i32::MAX as usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the value until the next keyframe.
    Constant,
    Linear,
}

impl Interpolation {
    pub fn name(self) -> &'static str {
        match self {
            Interpolation::Constant => "CONSTANT",
            Interpolation::Linear => "LINEAR",
        }
    }

    pub fn from_name(name: &str) -> Option<Interpolation> {
        match name {
            "CONSTANT" => Some(Interpolation::Constant),
            "LINEAR" => Some(Interpolation::Linear),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub frame: f64,
    pub value: f64,
    /// How to get from this keyframe to the next one.
    pub interpolation: Interpolation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    pub data_path: String,
    pub index: usize,
    pub group: Option<String>,
    /// Sorted by frame, no two on the same frame.
    pub keyframes: Vec<Keyframe>,
}

impl Curve {
    pub fn new(data_path: String, index: usize, group: Option<String>) -> Curve {
        Curve { data_path, index, group, keyframes: vec![] }
    }

    /// Adds a keyframe, replacing any keyframe already on that frame.
    pub fn add_keyframe(&mut self, frame: f64, value: f64, interpolation: Interpolation) {
        let key = Keyframe { frame, value, interpolation };
        let pos = self.keyframes.binary_search_by(|k| {
            k.frame.partial_cmp(&frame).unwrap_or(Ordering::Less)
        });
        match pos {
            Ok(i) => self.keyframes[i] = key,
            Err(i) => self.keyframes.insert(i, key),
        }
    }

    /// Value of the curve at `frame`. Outside the keyframes the curve holds
    /// the first/last value. None for a curve without keyframes.
    pub fn evaluate(&self, frame: f64) -> Option<f64> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        if frame <= first.frame { return Some(first.value); }
        if frame >= last.frame { return Some(last.value); }

        // Index of the first keyframe strictly after frame; the one before it
        // is at or before frame.
        let hi = self.keyframes.iter().position(|k| k.frame > frame)?;
        let lo = &self.keyframes[hi - 1];
        let hi = &self.keyframes[hi];
        Some(match lo.interpolation {
            Interpolation::Constant => lo.value,
            Interpolation::Linear => {
                let lam = (frame - lo.frame) / (hi.frame - lo.frame);
                lo.value * (1.0 - lam) + hi.value * lam
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    pub name: String,
    /// (start, end), inclusive.
    pub frame_range: (f64, f64),
    pub curves: Vec<Curve>,
}

impl Action {
    pub fn new(name: String, frame_range: (f64, f64)) -> Action {
        Action { name, frame_range, curves: vec![] }
    }

    /// Number of frames a motion sampled from this action has.
    pub fn frame_count(&self) -> usize {
        let end = self.frame_range.1.floor();
        if end > 0.0 { end as usize } else { 0 }
    }

    /// `frame_count`, refusing actions too long to sample.
    pub fn checked_frame_count(&self) -> Result<usize> {
        let frames = self.frame_count();
        if frames > MAX_FRAMES {
            bail!(ErrorKind::Validation(format!(
                "action {:?} is too long to sample ({} frames, at most {})",
                self.name, frames, MAX_FRAMES,
            )));
        }
        Ok(frames)
    }

    pub fn find_curve(&self, data_path: &str, index: usize) -> Option<&Curve> {
        self.curves.iter().find(|c| c.data_path == data_path && c.index == index)
    }

    /// True if any component of `data_path` is animated.
    pub fn has_curves_at(&self, data_path: &str) -> bool {
        self.curves.iter().any(|c| c.data_path == data_path)
    }

    /// Returns whether there was a curve to remove.
    pub fn remove_curve(&mut self, data_path: &str, index: usize) -> bool {
        let len_before = self.curves.len();
        self.curves.retain(|c| !(c.data_path == data_path && c.index == index));
        self.curves.len() != len_before
    }

    pub fn new_curve(&mut self, data_path: &str, index: usize, group: &str) -> Result<&mut Curve> {
        if self.find_curve(data_path, index).is_some() {
            bail!(ErrorKind::CurveExists(data_path.to_string(), index));
        }
        self.curves.push(Curve::new(data_path.to_string(), index, Some(group.to_string())));
        let last = self.curves.len() - 1;
        Ok(&mut self.curves[last])
    }

    pub fn evaluate(&self, data_path: &str, index: usize, frame: f64) -> Option<f64> {
        self.find_curve(data_path, index).and_then(|c| c.evaluate(frame))
    }
}


#[cfg(test)]
fn ramp() -> Curve {
    let mut c = Curve::new("location".to_string(), 0, None);
    c.add_keyframe(1.0, 0.0, Interpolation::Linear);
    c.add_keyframe(11.0, 10.0, Interpolation::Linear);
    c
}

#[test]
fn test_curve_linear_and_clamped() {
    let c = ramp();
    assert_eq!(c.evaluate(1.0), Some(0.0));
    assert_eq!(c.evaluate(6.0), Some(5.0));
    assert_eq!(c.evaluate(-3.0), Some(0.0));
    assert_eq!(c.evaluate(20.0), Some(10.0));
    assert_eq!(Curve::new("location".to_string(), 0, None).evaluate(1.0), None);
}

#[test]
fn test_curve_constant() {
    let mut c = Curve::new("location".to_string(), 2, None);
    c.add_keyframe(1.0, 3.0, Interpolation::Constant);
    c.add_keyframe(5.0, 7.0, Interpolation::Linear);
    assert_eq!(c.evaluate(4.9), Some(3.0));
    assert_eq!(c.evaluate(5.0), Some(7.0));
}

#[test]
fn test_add_keyframe_keeps_order() {
    let mut c = ramp();
    c.add_keyframe(6.0, 100.0, Interpolation::Linear);
    c.add_keyframe(1.0, -1.0, Interpolation::Linear);
    let frames: Vec<f64> = c.keyframes.iter().map(|k| k.frame).collect();
    assert_eq!(frames, vec![1.0, 6.0, 11.0]);
    assert_eq!(c.keyframes[0].value, -1.0);
}

#[test]
fn test_action_curves() {
    let mut action = Action::new("Walk".to_string(), (1.0, 10.5));
    assert_eq!(action.frame_count(), 10);

    action.new_curve("location", 0, "Object Transforms").unwrap()
        .add_keyframe(1.0, 2.0, Interpolation::Linear);
    assert!(action.new_curve("location", 0, "Object Transforms").is_err());
    assert!(action.has_curves_at("location"));
    assert_eq!(action.evaluate("location", 0, 3.0), Some(2.0));
    assert_eq!(action.evaluate("location", 1, 3.0), None);

    assert!(action.remove_curve("location", 0));
    assert!(!action.remove_curve("location", 0));
    assert!(!action.has_curves_at("location"));
}

#[test]
fn test_frame_count_bounds() {
    let action = Action::new("Walk".to_string(), (1.0, -3.0));
    assert_eq!(action.checked_frame_count().unwrap(), 0);

    let action = Action::new("Walk".to_string(), (1.0, MAX_FRAMES as f64));
    assert_eq!(action.checked_frame_count().unwrap(), MAX_FRAMES);

    let action = Action::new("Forever".to_string(), (1.0, 1e18));
    match action.checked_frame_count() {
        Err(e) => match *e.kind() {
            ErrorKind::Validation(_) => (),
            _ => panic!("wrong error: {}", e),
        },
        Ok(n) => panic!("expected an error, got {} frames", n),
    }
}
