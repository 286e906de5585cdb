//! E2E tests for the `edit` command, driven by a scripted editor.

mod common;

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn kubevendor() -> Command {
    Command::cargo_bin("kubevendor").unwrap()
}

/// Write a shell script that edits the buffer in place.
fn scripted_editor(dir: &Path, body: &str) -> String {
    let editor = dir.join("editor.sh");
    fs::write(&editor, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&editor, fs::Permissions::from_mode(0o755)).unwrap();
    editor.to_str().unwrap().to_string()
}

#[test]
fn edit_writes_merge_patch_under_patch_tree() {
    let work = TempDir::new().unwrap();
    let vendor_file = work.path().join("_vendor/github.com/example/a/dep.yaml");
    fs::create_dir_all(vendor_file.parent().unwrap()).unwrap();
    fs::write(
        &vendor_file,
        "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 1\n",
    )
    .unwrap();
    let editor = scripted_editor(work.path(), r#"sed -i 's/replicas: 1/replicas: 5/' "$1""#);

    kubevendor()
        .current_dir(&work)
        .env("EDITOR", &editor)
        .args([
            "edit",
            "--src",
            "_vendor/github.com/example/a/dep.yaml",
            "--type",
            "merge",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("patch/github.com/example/a/dep.yaml"));

    let patch: serde_yaml::Value = serde_yaml::from_str(
        &fs::read_to_string(work.path().join("patch/github.com/example/a/dep.yaml")).unwrap(),
    )
    .unwrap();
    assert_eq!(patch["spec"]["replicas"], serde_yaml::Value::from(5));
    assert!(patch.get("kind").is_none());
}

#[test]
fn edit_no_change_writes_empty_patch() {
    let work = TempDir::new().unwrap();
    let vendor_file = work.path().join("_vendor/foo/dep.yaml");
    fs::create_dir_all(vendor_file.parent().unwrap()).unwrap();
    fs::write(&vendor_file, "kind: ConfigMap\n").unwrap();
    let editor = scripted_editor(work.path(), "true");

    kubevendor()
        .current_dir(&work)
        .env("EDITOR", &editor)
        .args(["edit", "--src", "_vendor/foo/dep.yaml", "--type", "merge"])
        .assert()
        .success();

    let patch: serde_yaml::Value = serde_yaml::from_str(
        &fs::read_to_string(work.path().join("patch/foo/dep.yaml")).unwrap(),
    )
    .unwrap();
    assert!(patch.as_mapping().unwrap().is_empty());
}

#[test]
fn edit_failing_editor_aborts() {
    let work = TempDir::new().unwrap();
    let vendor_file = work.path().join("_vendor/foo/dep.yaml");
    fs::create_dir_all(vendor_file.parent().unwrap()).unwrap();
    fs::write(&vendor_file, "kind: ConfigMap\n").unwrap();
    let editor = scripted_editor(work.path(), "exit 3");

    kubevendor()
        .current_dir(&work)
        .env("EDITOR", &editor)
        .args(["edit", "--src", "_vendor/foo/dep.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Editor"));

    assert!(!work.path().join("patch/foo/dep.yaml").exists());
}

#[test]
fn edit_source_outside_vendor_fails() {
    let work = TempDir::new().unwrap();
    fs::write(work.path().join("loose.yaml"), "kind: ConfigMap\n").unwrap();
    let editor = scripted_editor(work.path(), "true");

    kubevendor()
        .current_dir(&work)
        .env("EDITOR", &editor)
        .args(["edit", "--src", "loose.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("_vendor"));
}
