//! Which parts of the mover's motion get extracted.
//!
//! The filter is destructive: whatever it drops is gone, it is not kept
//! anywhere else. By default the horizontal (X/Y) translation is extracted and
//! the vertical translation (jumps, bobbing) stays on the bones.

use cgmath::{Quaternion, Rad, Rotation3, Vector3, vec3, One};
use clap::ArgMatches;
use errors::{ErrorKind, Result};
use motion::{Motion, Transform};
use motion::transform_utils::yaw;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Vector3<f64> {
        match self {
            Axis::X => vec3(1.0, 0.0, 0.0),
            Axis::Y => vec3(0.0, 1.0, 0.0),
            Axis::Z => vec3(0.0, 0.0, 1.0),
        }
    }

    /// The direction yaw is measured from when this is the up axis.
    /// forward × (next axis) = up, so the frame stays right-handed.
    pub fn forward(self) -> Vector3<f64> {
        match self {
            Axis::X => vec3(0.0, 1.0, 0.0),
            Axis::Y => vec3(0.0, 0.0, 1.0),
            Axis::Z => vec3(1.0, 0.0, 0.0),
        }
    }

    pub fn parse(s: &str) -> Result<Axis> {
        match s {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            _ => {
                bail!(ErrorKind::Validation(format!(
                    "bad up axis {:?}, should be one of: x y z", s
                )))
            }
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FilterConfig {
    /// Which translation axes are extracted, X, Y, Z.
    pub translation_axes: [bool; 3],
    /// Extract the heading about `up_axis`. When false the extracted motion
    /// never rotates.
    pub include_rotation: bool,
    pub up_axis: Axis,
}

impl Default for FilterConfig {
    fn default() -> FilterConfig {
        FilterConfig {
            translation_axes: [true, true, false],
            include_rotation: false,
            up_axis: Axis::Z,
        }
    }
}

impl FilterConfig {
    /// Creates a FilterConfig from the CLI arguments.
    pub fn from_arg_matches(matches: &ArgMatches) -> Result<FilterConfig> {
        let mut config = FilterConfig::default();
        if let Some(axes) = matches.value_of("AXES") {
            config.translation_axes = parse_axes(axes)?;
        }
        config.include_rotation = matches.is_present("ROTATION");
        if let Some(up) = matches.value_of("UP") {
            config.up_axis = Axis::parse(up)?;
        }
        Ok(config)
    }

    pub fn filter_transform(&self, xform: &Transform) -> Transform {
        let mut translation = xform.translation;
        for i in 0..3 {
            if !self.translation_axes[i] {
                translation[i] = 0.0;
            }
        }

        let rotation = if self.include_rotation {
            Quaternion::from_axis_angle(self.up_axis.unit(), Rad(yaw(xform, self.up_axis)))
        } else {
            Quaternion::one()
        };

        Transform { translation, rotation }
    }

    pub fn filter_motion(&self, motion: &[Transform]) -> Motion {
        motion.iter().map(|xform| self.filter_transform(xform)).collect()
    }
}

impl fmt::Display for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = ["X", "Y", "Z"];
        write!(f, "translation [")?;
        for i in 0..3 {
            if self.translation_axes[i] {
                write!(f, "{}", names[i])?;
            }
        }
        write!(f, "]")?;
        if self.include_rotation {
            write!(f, ", yaw about {}", self.up_axis)?;
        }
        Ok(())
    }
}

/// Parses an axis set like "xy" or "xz". The empty string extracts no
/// translation at all.
pub fn parse_axes(s: &str) -> Result<[bool; 3]> {
    let mut axes = [false; 3];
    for c in s.chars() {
        let i = match c {
            'x' | 'X' => 0,
            'y' | 'Y' => 1,
            'z' | 'Z' => 2,
            _ => {
                bail!(ErrorKind::Validation(format!(
                    "bad axis {:?} in {:?}, should be made of: x y z", c, s
                )))
            }
        };
        axes[i] = true;
    }
    Ok(axes)
}


#[cfg(test)]
use motion::test_util::{quat_approx_eq, xform_approx_eq};

#[test]
fn test_axis_filtering() {
    let xform = Transform {
        translation: vec3(1.0, 2.0, 3.0),
        rotation: Quaternion::one(),
    };

    let config = FilterConfig { translation_axes: [true, false, true], ..FilterConfig::default() };
    assert_eq!(config.filter_transform(&xform).translation, vec3(1.0, 0.0, 3.0));

    let config = FilterConfig { translation_axes: [false, false, false], ..FilterConfig::default() };
    assert_eq!(config.filter_transform(&xform).translation, vec3(0.0, 0.0, 0.0));

    assert_eq!(FilterConfig::default().filter_transform(&xform).translation, vec3(1.0, 2.0, 0.0));
}

#[test]
fn test_rotation_suppression() {
    let config = FilterConfig::default();
    let motion: Motion = (0..5).map(|i| Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_axis_angle(vec3(0.0, 0.6, 0.8), Rad(i as f64)),
    }).collect();
    for xform in config.filter_motion(&motion) {
        assert_eq!(xform.rotation, Quaternion::one());
    }
}

#[test]
fn test_rotation_keeps_only_yaw() {
    let config = FilterConfig { include_rotation: true, ..FilterConfig::default() };
    let xform = Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_z(Rad(0.5)) * Quaternion::from_angle_y(Rad(0.3)),
    };
    let filtered = config.filter_transform(&xform);
    assert!(quat_approx_eq(filtered.rotation, Quaternion::from_angle_z(Rad(0.5))));

    // A pure yaw passes through unchanged.
    let pure = Transform {
        translation: vec3(0.0, 0.0, 0.0),
        rotation: Quaternion::from_angle_z(Rad(-2.0)),
    };
    let config = FilterConfig { translation_axes: [true; 3], ..config };
    assert!(xform_approx_eq(&config.filter_transform(&pure), &pure));
}

#[test]
fn test_parse_axes() {
    assert_eq!(parse_axes("xy").unwrap(), [true, true, false]);
    assert_eq!(parse_axes("Zx").unwrap(), [true, false, true]);
    assert_eq!(parse_axes("").unwrap(), [false, false, false]);
    assert!(parse_axes("xw").is_err());
    assert_eq!(Axis::parse("y").unwrap(), Axis::Y);
    assert!(Axis::parse("up").is_err());
}

#[test]
fn test_config_display() {
    let config = FilterConfig { include_rotation: true, ..FilterConfig::default() };
    assert_eq!(config.to_string(), "translation [XY], yaw about Z");
}
