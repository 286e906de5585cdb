//! Edit workflow: derive a patch file from an interactive edit of a
//! vendored manifest.
//!
//! The source file is copied into a scratch file, the user's editor runs
//! against it, and the difference between the original and the edited
//! buffer becomes a patch under `patch/` at the vendor-relative path. The
//! patch flavour is selectable; whatever the flavour, the file lands as
//! YAML.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::ValueEnum;
use log::debug;

use crate::error::{Error, Result};
use crate::mergepatch;
use crate::vendor::{PATCH_DIR, VENDOR_DIR};

/// Patch flavour produced by the edit workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatchKind {
    /// Kubernetes strategic merge patch; lists of named objects merge by
    /// `name`.
    Strategic,
    /// RFC 7396 JSON Merge Patch.
    Merge,
    /// RFC 6902 JSON Patch operation list.
    Json,
}

/// Run the edit workflow for the vendor file at `src` (a path containing
/// the `_vendor/` segment, relative to `workdir` or absolute).
///
/// Returns the path of the written patch file.
pub fn edit(workdir: &Path, src: &Path, kind: PatchKind) -> Result<PathBuf> {
    let src = if src.is_absolute() {
        src.to_path_buf()
    } else {
        workdir.join(src)
    };
    let rel = vendor_relative(&src)?;

    let original = fs::read_to_string(&src).map_err(|e| Error::fs(&src, e))?;
    let edited = edit_in_scratch_file(&src, &original)?;

    let patch = generate(&original, &edited, kind, &src)?;

    let patch_path = workdir.join(PATCH_DIR).join(&rel);
    if let Some(parent) = patch_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
    }
    fs::write(&patch_path, patch).map_err(|e| Error::fs(&patch_path, e))?;
    Ok(patch_path)
}

/// Compute the patch body turning `original` into `edited`, serialised as
/// YAML.
pub fn generate(original: &str, edited: &str, kind: PatchKind, src: &Path) -> Result<String> {
    let parse = |raw: &str| -> Result<serde_json::Value> {
        let doc: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|e| Error::Merge {
            path: src.display().to_string(),
            message: e.to_string(),
        })?;
        mergepatch::yaml_to_json(&doc)
    };
    let original = parse(original)?;
    let edited = parse(edited)?;

    let patch = match kind {
        PatchKind::Strategic => mergepatch::diff_strategic_patch(&original, &edited),
        PatchKind::Merge => mergepatch::diff_merge_patch(&original, &edited),
        PatchKind::Json => mergepatch::diff_json_patch(&original, &edited),
    };

    serde_yaml::to_string(&mergepatch::json_to_yaml(&patch)).map_err(Error::from)
}

/// The path under `_vendor/` that identifies both the source and the
/// patch destination.
fn vendor_relative(src: &Path) -> Result<PathBuf> {
    let mut components = src.components();
    for component in components.by_ref() {
        if component.as_os_str() == VENDOR_DIR {
            let rel: PathBuf = components.collect();
            if rel.as_os_str().is_empty() {
                break;
            }
            return Ok(rel);
        }
    }
    Err(Error::Filesystem {
        path: src.display().to_string(),
        message: format!("source is not under a {} directory", VENDOR_DIR),
    })
}

/// Seed a scratch file with `original`, run the editor on it, and return
/// the edited buffer.
fn edit_in_scratch_file(src: &Path, original: &str) -> Result<String> {
    let mut scratch = tempfile::Builder::new()
        .prefix("kubevendor-edit-")
        .suffix(".yaml")
        .tempfile()?;
    scratch
        .write_all(original.as_bytes())
        .map_err(|e| Error::fs(scratch.path(), e))?;
    scratch.flush().map_err(|e| Error::fs(scratch.path(), e))?;

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    debug!("editing {} via {}", src.display(), editor);

    // EDITOR may carry arguments; split on whitespace the way git does.
    let mut parts = editor.split_whitespace();
    let program = parts.next().ok_or_else(|| Error::Editor {
        message: "EDITOR is empty".to_string(),
    })?;
    let status = Command::new(program)
        .args(parts)
        .arg(scratch.path())
        .status()
        .map_err(|e| Error::Editor {
            message: format!("failed to launch {}: {}", editor, e),
        })?;
    if !status.success() {
        return Err(Error::Editor {
            message: format!("{} exited with {}", editor, status),
        });
    }

    fs::read_to_string(scratch.path()).map_err(|e| Error::fs(scratch.path(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 1\n";
    const EDITED: &str = "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 3\n";

    #[test]
    fn test_generate_merge_patch() {
        let patch = generate(ORIGINAL, EDITED, PatchKind::Merge, Path::new("dep.yaml")).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&patch).unwrap();
        assert_eq!(parsed["spec"]["replicas"], serde_yaml::Value::from(3));
        // Unchanged fields are absent from a merge patch.
        assert!(parsed.get("kind").is_none());
    }

    #[test]
    fn test_generate_json_patch() {
        let patch = generate(ORIGINAL, EDITED, PatchKind::Json, Path::new("dep.yaml")).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&patch).unwrap();
        let ops = parsed.as_sequence().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["op"], serde_yaml::Value::from("replace"));
        assert_eq!(ops[0]["path"], serde_yaml::Value::from("/spec/replicas"));
    }

    #[test]
    fn test_generate_strategic_patch_for_containers() {
        let original = r#"
kind: Deployment
spec:
  containers:
    - name: app
      image: app:v1
    - name: sidecar
      image: sidecar:v1
"#;
        let edited = r#"
kind: Deployment
spec:
  containers:
    - name: app
      image: app:v2
    - name: sidecar
      image: sidecar:v1
"#;
        let patch =
            generate(original, edited, PatchKind::Strategic, Path::new("dep.yaml")).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&patch).unwrap();
        let containers = parsed["spec"]["containers"].as_sequence().unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0]["name"], serde_yaml::Value::from("app"));
        assert_eq!(containers[0]["image"], serde_yaml::Value::from("app:v2"));
    }

    #[test]
    fn test_generate_no_change_is_empty_mapping() {
        let patch =
            generate(ORIGINAL, ORIGINAL, PatchKind::Merge, Path::new("dep.yaml")).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&patch).unwrap();
        assert!(parsed.as_mapping().unwrap().is_empty());
    }

    #[test]
    fn test_vendor_relative_extraction() {
        let rel = vendor_relative(Path::new("_vendor/github.com/example/a/dep.yaml")).unwrap();
        assert_eq!(rel, PathBuf::from("github.com/example/a/dep.yaml"));

        let rel =
            vendor_relative(Path::new("/work/_vendor/github.com/example/a/dep.yaml")).unwrap();
        assert_eq!(rel, PathBuf::from("github.com/example/a/dep.yaml"));

        assert!(vendor_relative(Path::new("not/vendored.yaml")).is_err());
    }

    #[test]
    fn test_edit_with_scripted_editor() {
        use std::os::unix::fs::PermissionsExt;

        let work = tempfile::TempDir::new().unwrap();
        let vendor_file = work.path().join("_vendor/foo/dep.yaml");
        fs::create_dir_all(vendor_file.parent().unwrap()).unwrap();
        fs::write(&vendor_file, ORIGINAL).unwrap();

        // An "editor" that bumps the replica count in place.
        let editor = work.path().join("editor.sh");
        fs::write(
            &editor,
            "#!/bin/sh\nsed -i 's/replicas: 1/replicas: 3/' \"$1\"\n",
        )
        .unwrap();
        fs::set_permissions(&editor, fs::Permissions::from_mode(0o755)).unwrap();
        env::set_var("EDITOR", editor.to_str().unwrap());

        let patch_path = edit(work.path(), Path::new("_vendor/foo/dep.yaml"), PatchKind::Merge)
            .unwrap();
        env::remove_var("EDITOR");

        assert_eq!(patch_path, work.path().join("patch/foo/dep.yaml"));
        let parsed: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(&patch_path).unwrap()).unwrap();
        assert_eq!(parsed["spec"]["replicas"], serde_yaml::Value::from(3));
    }
}
