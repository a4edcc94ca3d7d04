#![recursion_limit = "1024"] // for error_chain

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate clap;
#[macro_use]
extern crate json;
extern crate atty;
extern crate cgmath;
extern crate petgraph;
extern crate termcolor;

#[macro_use]
mod errors;
mod extract;
mod info;
mod logger;
mod motion;
mod report;
mod scene;
mod version;

use log::Level;
use std::process::exit;

fn main() {
    let app = clap_app!(rootmotion =>
        (@setting SubcommandRequiredElseHelp)
        (@setting VersionlessSubcommands)
        (version: crate_version!())
        (about: "Moves root motion from a bone of an armature onto the armature itself")
        (@arg VERBOSE: -v --verbose +global "Print debugging messages")
        (@subcommand extract =>
            (about: "Extract the motion of a bone to its armature")
            (alias: "x")
            (@arg INPUT: +required "Scene file")
            (@arg OUTPUT: -o --output +takes_value +required "Where to write the changed scene")
            (@arg ARMATURE: -a --armature +takes_value +required "Armature object")
            (@arg BONE: -b --bone +takes_value +required "Bone that currently carries the motion")
            (@arg AXES: --axes +takes_value "Translation axes to extract, eg. xy (the default)")
            (@arg ROTATION: -r --rotation "Also extract the heading about the up axis")
            (@arg UP: --up +takes_value "Up axis: x, y or z (the default)")
        )
        (@subcommand info =>
            (about: "Show the objects, bones and actions in a scene")
            (alias: "i")
            (@arg INPUT: +required "Scene file")
        )
        (@subcommand dump =>
            (about: "Print the motion of a bone, or of the armature when no bone is given")
            (@arg INPUT: +required "Scene file")
            (@arg ARMATURE: -a --armature +takes_value +required "Armature object")
            (@arg BONE: -b --bone +takes_value "Bone to sample")
        )
        (@subcommand version =>
            (about: "Print version and build info")
        )
    );
    let matches = app.get_matches();

    let (subcmd, sub_matches) = matches.subcommand();
    let verbose = matches.is_present("VERBOSE") ||
        sub_matches.map_or(false, |m| m.is_present("VERBOSE"));
    logger::init(if verbose { Level::Debug } else { Level::Info });

    let res = match (subcmd, sub_matches) {
        ("extract", Some(m)) => extract::main(m),
        ("info", Some(m)) => info::main(m),
        ("dump", Some(m)) => info::dump_main(m),
        ("version", _) => {
            version::print_version_info();
            Ok(())
        }
        _ => Ok(()),
    };

    if let Err(e) = res {
        error!("{}", e);
        for cause in e.iter().skip(1) {
            error!("  caused by: {}", cause);
        }
        exit(1);
    }
}
