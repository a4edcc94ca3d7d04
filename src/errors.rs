error_chain! {
    foreign_links {
        Fmt(::std::fmt::Error);
        Io(::std::io::Error);
        Json(::json::Error);
    }

    errors {
        Validation(msg: String) {
            description("invalid extraction request")
            display("{}", msg)
        }
        MotionLengthMismatch(root_len: usize, child_len: usize) {
            description("motions have different numbers of frames")
            display("relative motion needs motions with the same number of frames \
                (got {} and {})", root_len, child_len)
        }
        EmptyMotion(channel: String) {
            description("refusing to write an empty motion")
            display("refusing to write an empty motion to {}", channel)
        }
        UnknownObject(name: String) {
            description("no such object")
            display("no object named {:?}", name)
        }
        UnknownBone(armature: String, bone: String) {
            description("no such bone")
            display("armature {:?} has no bone named {:?}", armature, bone)
        }
        CurveExists(data_path: String, index: usize) {
            description("curve already exists")
            display("there is already a curve at {}[{}]", data_path, index)
        }
        UnknownAction(name: String) {
            description("no such action")
            display("no action named {:?}", name)
        }
        BadScene(msg: String) {
            description("malformed scene document")
            display("bad scene document: {}", msg)
        }
    }
}

macro_rules! check {
    ($b:expr) => {
        if !$b {
            use errors::Error;
            use errors::ErrorKind;
            Err(Error::from_kind(ErrorKind::BadScene(format!(
                "expected: {}",
                stringify!($b)
            ))))
        } else {
            Ok(())
        }
    };
}
