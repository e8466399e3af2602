use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn write_fixture(root: &Path) {
    fs::write(
        root.join("package.json"),
        "{\n  \"name\": \"fixture-root\",\n  \"workspaces\": [\n    \"packages/*\"\n  ]\n}\n",
    )
    .unwrap();
    let a = root.join("packages/a");
    fs::create_dir_all(&a).unwrap();
    fs::write(a.join("package.json"), "{\n  \"name\": \"a\"\n}\n").unwrap();
}

fn monokit_binary() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop();
    path.join("target").join("debug").join("monokit")
}

#[test]
#[ignore]
fn no_command_prints_banner_and_exits_zero() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let output = Command::new(monokit_binary())
        .current_dir(tmp.path())
        .output()
        .expect("binary runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("monokit v"));
    assert!(stdout.contains("ls"));
}

#[test]
#[ignore]
fn unknown_command_exits_nonzero() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let output = Command::new(monokit_binary())
        .arg("definitely-not-a-command")
        .current_dir(tmp.path())
        .output()
        .expect("binary runs");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown command"));
}

#[test]
#[ignore]
fn ls_lists_located_workspaces() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let output = Command::new(monokit_binary())
        .arg("ls")
        .current_dir(tmp.path())
        .output()
        .expect("binary runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("/packages/a"));
    assert!(stdout.contains("Total: 1 workspaces."));
}
