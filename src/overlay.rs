//! # Patch Overlay Compiler
//!
//! Walks the `patch/` tree and compiles each overlay against its vendor
//! counterpart into `_outlook/`.
//!
//! For every *file* under `patch/` at relative path `R`, the source is
//! `_vendor/R`; a patch without a source aborts the compile. The two
//! documents are converted to JSON, the patch is applied with JSON Merge
//! Patch semantics, the result is annotated with provenance, and the YAML
//! is emitted to `_outlook/R`. The output directory is truncated first and
//! the walk order is lexicographic, so a compile is reproducible and two
//! runs over unchanged inputs are byte-identical.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::annotate::ProvenanceAnnotator;
use crate::error::{Error, Result};
use crate::mergepatch;
use crate::vendor::{PATCH_DIR, VENDOR_DIR};

/// Directory of compiled, annotated manifests.
pub const OUTLOOK_DIR: &str = "_outlook";

/// Compile every patch under `workdir/patch/` into `workdir/_outlook/`.
///
/// Returns the emitted relative paths, in emission order.
pub fn compile(workdir: &Path, annotator: &ProvenanceAnnotator) -> Result<Vec<PathBuf>> {
    let patch_root = workdir.join(PATCH_DIR);
    let vendor_root = workdir.join(VENDOR_DIR);
    let outlook_root = workdir.join(OUTLOOK_DIR);

    // Fresh output on every compile.
    if outlook_root.exists() {
        fs::remove_dir_all(&outlook_root).map_err(|e| Error::fs(&outlook_root, e))?;
    }
    fs::create_dir_all(&outlook_root).map_err(|e| Error::fs(&outlook_root, e))?;

    let mut emitted = Vec::new();
    if !patch_root.is_dir() {
        return Ok(emitted);
    }

    for entry in WalkDir::new(&patch_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry
            .path()
            .strip_prefix(&patch_root)
            .map_err(|e| Error::fs(entry.path(), e))?
            .to_path_buf();

        let vendor_path = vendor_root.join(&rel);
        if !vendor_path.is_file() {
            return Err(Error::MissingSource {
                patch: entry.path().display().to_string(),
                vendor: vendor_path.display().to_string(),
            });
        }

        let output = compile_one(&vendor_path, entry.path(), annotator)?;
        let out_path = outlook_root.join(&rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }
        fs::write(&out_path, output).map_err(|e| Error::fs(&out_path, e))?;

        debug!("compiled {}", rel.display());
        emitted.push(rel);
    }

    Ok(emitted)
}

fn compile_one(
    vendor_path: &Path,
    patch_path: &Path,
    annotator: &ProvenanceAnnotator,
) -> Result<String> {
    let source = read_yaml(vendor_path)?;
    let patch = read_yaml(patch_path)?;

    let mut merged = mergepatch::apply_to_yaml(&source, &patch).map_err(|e| Error::Merge {
        path: patch_path.display().to_string(),
        message: e.to_string(),
    })?;
    annotator.annotate(&mut merged);

    serde_yaml::to_string(&merged).map_err(Error::from)
}

fn read_yaml(path: &Path) -> Result<serde_yaml::Value> {
    let raw = fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
    serde_yaml::from_str(&raw).map_err(|e| Error::Merge {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let full = root.join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn annotator() -> ProvenanceAnnotator {
        ProvenanceAnnotator::new("feedface")
    }

    #[test]
    fn test_compile_merges_and_annotates() {
        let work = TempDir::new().unwrap();
        write(
            work.path(),
            "_vendor/foo/dep.yaml",
            "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 1\n",
        );
        write(work.path(), "patch/foo/dep.yaml", "spec:\n  replicas: 3\n");

        let emitted = compile(work.path(), &annotator()).unwrap();
        assert_eq!(emitted, vec![PathBuf::from("foo/dep.yaml")]);

        let out: serde_yaml::Value = serde_yaml::from_str(
            &fs::read_to_string(work.path().join("_outlook/foo/dep.yaml")).unwrap(),
        )
        .unwrap();
        assert_eq!(out["spec"]["replicas"], serde_yaml::Value::from(3));
        assert_eq!(
            out["metadata"]["annotations"]["git-commit-hash"],
            serde_yaml::Value::from("feedface")
        );
    }

    #[test]
    fn test_compile_missing_source_aborts() {
        let work = TempDir::new().unwrap();
        fs::create_dir_all(work.path().join("_vendor")).unwrap();
        write(work.path(), "patch/foo/orphan.yaml", "spec: {}\n");

        let err = compile(work.path(), &annotator()).unwrap_err();
        assert!(matches!(err, Error::MissingSource { .. }));
    }

    #[test]
    fn test_compile_unparseable_patch_aborts() {
        let work = TempDir::new().unwrap();
        write(work.path(), "_vendor/foo/dep.yaml", "kind: ConfigMap\n");
        write(work.path(), "patch/foo/dep.yaml", "spec: [unclosed");

        let err = compile(work.path(), &annotator()).unwrap_err();
        assert!(matches!(err, Error::Merge { .. }));
    }

    #[test]
    fn test_compile_truncates_previous_output() {
        let work = TempDir::new().unwrap();
        write(work.path(), "_vendor/foo/dep.yaml", "kind: ConfigMap\n");
        write(work.path(), "patch/foo/dep.yaml", "data:\n  k: v\n");
        write(work.path(), "_outlook/stale/old.yaml", "kind: Old\n");

        compile(work.path(), &annotator()).unwrap();
        assert!(!work.path().join("_outlook/stale").exists());
        assert!(work.path().join("_outlook/foo/dep.yaml").is_file());
    }

    #[test]
    fn test_compile_is_idempotent() {
        let work = TempDir::new().unwrap();
        write(
            work.path(),
            "_vendor/foo/dep.yaml",
            "kind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 1\n",
        );
        write(work.path(), "patch/foo/dep.yaml", "spec:\n  replicas: 3\n");

        compile(work.path(), &annotator()).unwrap();
        let first = fs::read(work.path().join("_outlook/foo/dep.yaml")).unwrap();
        compile(work.path(), &annotator()).unwrap();
        let second = fs::read(work.path().join("_outlook/foo/dep.yaml")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compile_walk_order_is_lexicographic() {
        let work = TempDir::new().unwrap();
        for name in ["b.yaml", "a.yaml", "c/z.yaml"] {
            write(
                work.path(),
                &format!("_vendor/{}", name),
                "kind: ConfigMap\n",
            );
            write(work.path(), &format!("patch/{}", name), "data: {}\n");
        }

        let emitted = compile(work.path(), &annotator()).unwrap();
        assert_eq!(
            emitted,
            vec![
                PathBuf::from("a.yaml"),
                PathBuf::from("b.yaml"),
                PathBuf::from("c/z.yaml"),
            ]
        );
    }

    #[test]
    fn test_empty_patch_directories_ignored() {
        let work = TempDir::new().unwrap();
        fs::create_dir_all(work.path().join("patch/empty/nested")).unwrap();
        fs::create_dir_all(work.path().join("_vendor")).unwrap();

        let emitted = compile(work.path(), &annotator()).unwrap();
        assert!(emitted.is_empty());
    }
}
