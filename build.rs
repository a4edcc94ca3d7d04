extern crate time;

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;

fn main() {
    write_git_rev();
    write_compile_date();
}

/// Write the current git hash to ${OUT_DIR}/git-commit so the version
/// command can print it.
fn write_git_rev() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dst_path = Path::new(&out_dir).join("git-commit");
    let mut f = File::create(&dst_path).unwrap();

    // Building from a tarball without git is fine, we just don't know the
    // commit.
    let commit_hash = Command::new("git")
        .args(&["rev-parse", "--short", "HEAD"])
        .output();
    let changes_in_working_dir = Command::new("git")
        .args(&["status", "--porcelain"])
        .output();

    match (commit_hash, changes_in_working_dir) {
        (Ok(ref hash), Ok(ref changes))
            if hash.status.success() && changes.status.success() && !hash.stdout.is_empty() =>
        {
            // Drop the trailing newline
            let hash = hash.stdout.split_last().unwrap().1;
            if !changes.stdout.is_empty() {
                f.write_all(b"WIP ").unwrap();
            }
            f.write_all(hash).unwrap();
        }
        _ => f.write_all(b"unknown commit").unwrap(),
    }
}

fn write_compile_date() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dst_path = Path::new(&out_dir).join("compile-date");
    let mut f = File::create(&dst_path).unwrap();

    let now = time::now_utc();
    let date = time::strftime("%Y-%m-%d", &now).unwrap();

    f.write_all(date.as_bytes()).unwrap();
}
