//! CLI tests for the `packer` binary.
//!
//! Spawns the binary in a scratch working directory and checks exit codes,
//! console output and the files left behind.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use packer::exit_codes;
use packer::io::digest::{DIGEST_FILE_NAME, sha256_file};
use packer::test_support::{SourceTree, tool_available};

fn packer(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_packer"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("spawn packer")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

#[test]
fn no_arguments_prints_usage_and_touches_nothing() {
    let cwd = tempfile::tempdir().expect("cwd");
    let output = packer(cwd.path(), &[]);

    assert_eq!(output.status.code(), Some(exit_codes::USAGE));
    assert!(stderr(&output).contains("Usage"));
    assert_eq!(fs::read_dir(cwd.path()).expect("read cwd").count(), 0);
}

#[test]
fn missing_archive_argument_creates_no_output() {
    let src = SourceTree::new().expect("source");
    src.file("a.txt", b"a").expect("a");
    let cwd = tempfile::tempdir().expect("cwd");

    let output = packer(cwd.path(), &[path_arg(src.path()), "out"]);

    assert_ne!(output.status.code(), Some(exit_codes::OK));
    assert!(!cwd.path().join("out").exists());
}

#[test]
fn missing_tool_fails_with_distinct_message() {
    let src = SourceTree::new().expect("source");
    src.file("a.txt", b"a").expect("a");
    let cwd = tempfile::tempdir().expect("cwd");

    let output = packer(
        cwd.path(),
        &[
            path_arg(src.path()),
            "out",
            "pack.zip",
            "--tool",
            "zip",
            "--program",
            "packer-test-no-such-zip",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let err = stderr(&output);
    assert!(err.contains("not found"), "stderr: {err}");
    assert!(err.contains("packer-test-no-such-zip"));
    assert!(!cwd.path().join(DIGEST_FILE_NAME).exists());
}

#[cfg(unix)]
#[test]
fn failing_tool_is_reported_as_failed() {
    let src = SourceTree::new().expect("source");
    let cwd = tempfile::tempdir().expect("cwd");

    let output = packer(
        cwd.path(),
        &[
            path_arg(src.path()),
            "out",
            "pack.zip",
            "--tool",
            "zip",
            "--program",
            "false",
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let err = stderr(&output);
    assert!(err.contains("failed with exit code 1"), "stderr: {err}");
    assert!(!err.contains("not found"));
}

#[cfg(unix)]
#[test]
fn invalid_json_is_skipped_with_warning_and_exit_zero() {
    let src = SourceTree::new().expect("source");
    src.file("bad.json", b"{not valid}").expect("bad");
    src.file("ok.json", b"{ \"x\": 1 }").expect("ok");
    let cwd = tempfile::tempdir().expect("cwd");
    let tools = tempfile::tempdir().expect("tools");
    let fake_zip = packer::test_support::fake_zip_program(tools.path()).expect("fake zip");

    let output = packer(
        cwd.path(),
        &[
            path_arg(src.path()),
            "out",
            "pack.zip",
            "--tool",
            "zip",
            "--program",
            path_arg(&fake_zip),
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("bad.json"));
    assert!(!cwd.path().join("out/bad.json").exists());
    assert_eq!(
        fs::read_to_string(cwd.path().join("out/ok.json")).expect("ok.json"),
        r#"{"x":1}"#
    );
    assert_eq!(
        fs::read(cwd.path().join("pack.zip")).expect("archive"),
        packer::test_support::EMPTY_ZIP
    );
}

#[cfg(unix)]
#[test]
fn prints_progress_digest_and_summary() {
    let src = SourceTree::new().expect("source");
    src.file("a.txt", b"a").expect("a");
    let cwd = tempfile::tempdir().expect("cwd");
    let tools = tempfile::tempdir().expect("tools");
    let fake_zip = packer::test_support::fake_zip_program(tools.path()).expect("fake zip");

    let output = packer(
        cwd.path(),
        &[
            path_arg(src.path()),
            "out",
            "dist/pack.zip",
            "--tool",
            "zip",
            "--program",
            path_arg(&fake_zip),
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    let digest = sha256_file(&cwd.path().join("dist/pack.zip")).expect("hash");
    let zipping = out.find("Zipping").expect("progress notice");
    let digest_at = out.find(&digest).expect("digest printed");
    assert!(zipping < digest_at);
    assert!(out.contains(DIGEST_FILE_NAME));
    assert!(out.contains("Output folder:"));
    assert!(out.contains("pack.zip"));
    assert_eq!(
        fs::read_to_string(cwd.path().join(DIGEST_FILE_NAME)).expect("digest file"),
        format!("{digest}\n")
    );
}

#[test]
fn zip_end_to_end_scenario() {
    if !tool_available("zip") {
        eprintln!("skipping: zip not on PATH");
        return;
    }
    let src = SourceTree::new().expect("source");
    src.file("a.json", br#"{"b": 1,   "c":[1,2]}"#).expect("a.json");
    src.file("notes.txt", b"\x00\x10 free-form \xfe bytes").expect("notes");
    src.file("node_modules/dep/package.json", b"{}").expect("dep");
    let cwd = tempfile::tempdir().expect("cwd");

    let output = packer(
        cwd.path(),
        &[path_arg(src.path()), "out", "pack.zip", "--tool", "zip"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK), "stderr: {}", stderr(&output));
    let out_dir = cwd.path().join("out");
    assert_eq!(
        fs::read_to_string(out_dir.join("a.json")).expect("a.json"),
        r#"{"b":1,"c":[1,2]}"#
    );
    assert_eq!(
        fs::read(out_dir.join("notes.txt")).expect("notes"),
        b"\x00\x10 free-form \xfe bytes"
    );
    assert!(!out_dir.join("node_modules").exists());

    let archive = cwd.path().join("pack.zip");
    let bytes = fs::read(&archive).expect("archive");
    assert_eq!(&bytes[..4], b"PK\x03\x04");

    let recorded = fs::read_to_string(cwd.path().join(DIGEST_FILE_NAME)).expect("digest");
    let hex = recorded.strip_suffix('\n').expect("trailing newline");
    assert_eq!(hex.len(), 64);
    assert_eq!(hex, sha256_file(&archive).expect("hash"));
}

#[test]
fn zip_runs_are_reproducible() {
    if !tool_available("zip") {
        eprintln!("skipping: zip not on PATH");
        return;
    }
    let src = SourceTree::new().expect("source");
    src.file("a.json", b"{ \"k\": [1, 2, 3] }").expect("a");
    src.file("sub/b.txt", b"b").expect("b");
    let cwd = tempfile::tempdir().expect("cwd");
    let args = [path_arg(src.path()), "out", "pack.zip", "--tool", "zip"];

    let first = packer(cwd.path(), &args);
    assert_eq!(first.status.code(), Some(exit_codes::OK), "stderr: {}", stderr(&first));
    let first_digest = fs::read_to_string(cwd.path().join(DIGEST_FILE_NAME)).expect("first");

    let second = packer(cwd.path(), &args);
    assert_eq!(second.status.code(), Some(exit_codes::OK), "stderr: {}", stderr(&second));
    let second_digest = fs::read_to_string(cwd.path().join(DIGEST_FILE_NAME)).expect("second");

    assert_eq!(first_digest, second_digest);
}

#[cfg(unix)]
#[test]
fn packing_from_inside_the_source_leaves_artifacts_out_of_the_tree() {
    let src = SourceTree::new().expect("source");
    src.file("a.json", b"{ \"a\": 1 }").expect("a");
    let tools = tempfile::tempdir().expect("tools");
    let fake_zip = packer::test_support::fake_zip_program(tools.path()).expect("fake zip");
    let args = [".", "out", "pack.zip", "--tool", "zip", "--program", path_arg(&fake_zip)];

    for run in 0..2 {
        let output = packer(src.path(), &args);
        assert_eq!(
            output.status.code(),
            Some(exit_codes::OK),
            "run {run} stderr: {}",
            stderr(&output)
        );
    }

    let out_dir = src.path().join("out");
    assert!(out_dir.join("a.json").exists());
    assert!(!out_dir.join("pack.zip").exists());
    assert!(!out_dir.join(DIGEST_FILE_NAME).exists());
}

#[test]
fn zip_runs_from_inside_the_source_are_reproducible() {
    if !tool_available("zip") {
        eprintln!("skipping: zip not on PATH");
        return;
    }
    let src = SourceTree::new().expect("source");
    src.file("a.json", b"{ \"a\": [1, 2] }").expect("a");
    src.file("docs/readme.txt", b"readme").expect("readme");
    let args = [".", "out", "pack.zip", "--tool", "zip"];

    let mut digests = Vec::new();
    for _ in 0..3 {
        let output = packer(src.path(), &args);
        assert_eq!(output.status.code(), Some(exit_codes::OK), "stderr: {}", stderr(&output));
        digests.push(fs::read_to_string(src.path().join(DIGEST_FILE_NAME)).expect("digest"));
    }

    assert_eq!(digests[0], digests[1]);
    assert_eq!(digests[1], digests[2]);
}
