//! Shared fixtures for integration and E2E tests.
//!
//! Tests never touch the network: every "remote" is a local git repository
//! created on the fly and referenced through its filesystem path via the
//! dependency's `fork` field.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a git command in `dir`, panicking with stderr on failure.
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("git not installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Initialise a repository with a deterministic identity.
#[allow(dead_code)]
pub fn init_repo(dir: &Path) {
    git(dir, &["init", "-q", "-b", "master"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test"]);
}

/// Stage and commit everything.
#[allow(dead_code)]
pub fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// Current HEAD commit hash.
#[allow(dead_code)]
pub fn head_sha(dir: &Path) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["rev-parse", "HEAD"])
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create an upstream fixture repository with the given files, committed
/// and tagged. Returns the repo and its clone URL (a local path).
#[allow(dead_code)]
pub fn upstream_repo(files: &[(&str, &str)], tag: &str) -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path());
    for (rel, content) in files {
        let full = dir.path().join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
    commit_all(dir.path(), "fixture");
    git(dir.path(), &["tag", tag]);
    let url = dir.path().to_str().unwrap().to_string();
    (dir, url)
}

/// A minimal schema set with enough of the real swagger shape to validate
/// Deployments and ConfigMaps.
#[allow(dead_code)]
pub const FIXTURE_SWAGGER: &str = r##"{
  "definitions": {
    "io.k8s.api.apps.v1.Deployment": {
      "type": "object",
      "properties": {
        "apiVersion": {"type": "string"},
        "kind": {"type": "string"},
        "metadata": {"$ref": "#/definitions/io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta"},
        "spec": {"$ref": "#/definitions/io.k8s.api.apps.v1.DeploymentSpec"}
      },
      "x-kubernetes-group-version-kind": [
        {"group": "apps", "version": "v1", "kind": "Deployment"}
      ]
    },
    "io.k8s.api.apps.v1.DeploymentSpec": {
      "type": "object",
      "properties": {
        "replicas": {"type": "integer"},
        "selector": {"type": "object", "additionalProperties": true}
      }
    },
    "io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta": {
      "type": "object",
      "properties": {
        "name": {"type": "string"},
        "annotations": {"type": "object", "additionalProperties": {"type": "string"}}
      }
    },
    "io.k8s.api.core.v1.ConfigMap": {
      "type": "object",
      "properties": {
        "apiVersion": {"type": "string"},
        "kind": {"type": "string"},
        "metadata": {"$ref": "#/definitions/io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta"},
        "data": {"type": "object", "additionalProperties": {"type": "string"}}
      },
      "x-kubernetes-group-version-kind": [
        {"group": "", "version": "v1", "kind": "ConfigMap"}
      ]
    }
  }
}"##;
