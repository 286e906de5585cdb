//! # Vendor Writer
//!
//! Materialises a solved dependency set as the `_vendor/` tree.
//!
//! The whole tree is staged in memory first and only then swapped onto
//! disk: the previous `_vendor/` is removed in one step and rewritten, so
//! no stale file survives a re-run. While staging, each locked project is
//! pruned to its declared sub-folders and any nested vendor directory it
//! ships is stripped -- the solver has already flattened the graph, so
//! transitive vendoring inside a dependency is always redundant.
//!
//! After the copy pass, a patch-folder sweep re-anchors patched files into
//! the vendor tree: every vendored file with a counterpart under `patch/`
//! is merge-patched in place, so downstream consumers see patched content
//! even without a compile step.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::fstree::FileTree;
use crate::mergepatch;
use crate::solver::{Constraint, Solution};
use crate::source::Sources;

/// Directory of materialised dependencies under the project root.
pub const VENDOR_DIR: &str = "_vendor";
/// Directory of user-authored per-file overlays.
pub const PATCH_DIR: &str = "patch";

/// Rebuild `_vendor/` under `workdir` from a solution.
///
/// Returns the number of files written.
pub fn write_vendor_tree(
    workdir: &Path,
    solution: &Solution,
    sources: &dyn Sources,
) -> Result<usize> {
    let mut staged = FileTree::new();

    for locked in solution.iter() {
        let snapshot = sources.acquire(
            &locked.source_url,
            &Constraint::Revision(locked.revision.clone()),
        )?;

        let mut tree = FileTree::load_dir(&snapshot.path)?;
        if let Some(folders) = &locked.folders {
            let prefixes: Vec<&str> = folders.iter().map(String::as_str).collect();
            tree.retain_under(&prefixes);
        }
        let stripped = tree.remove_dirs_named(VENDOR_DIR);
        if stripped > 0 {
            debug!(
                "stripped {} nested vendor files from {}",
                stripped, locked.root
            );
        }

        tree.merge_into(&mut staged, Path::new(locked.root.as_str()));
    }

    // Swap the staged tree onto disk; the old tree goes away wholesale.
    let vendor_path = workdir.join(VENDOR_DIR);
    if vendor_path.exists() {
        fs::remove_dir_all(&vendor_path).map_err(|e| Error::fs(&vendor_path, e))?;
    }
    staged.write_to(&vendor_path)?;

    Ok(staged.len())
}

/// Apply every matching `patch/` file onto its `_vendor/` counterpart in
/// place. Returns the paths that were re-anchored.
pub fn sweep_patch_folder(workdir: &Path) -> Result<Vec<PathBuf>> {
    let vendor_root = workdir.join(VENDOR_DIR);
    let patch_root = workdir.join(PATCH_DIR);
    let mut patched = Vec::new();

    if !vendor_root.is_dir() || !patch_root.is_dir() {
        return Ok(patched);
    }

    for entry in WalkDir::new(&vendor_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry
            .path()
            .strip_prefix(&vendor_root)
            .map_err(|e| Error::fs(entry.path(), e))?;
        let patch_path = patch_root.join(rel);
        if !patch_path.is_file() {
            continue;
        }

        let merged = merge_files(entry.path(), &patch_path)?;
        fs::write(entry.path(), merged).map_err(|e| Error::fs(entry.path(), e))?;
        patched.push(rel.to_path_buf());
    }

    Ok(patched)
}

/// Merge-patch `patch_path` onto `source_path`, returning the serialised
/// result.
pub fn merge_files(source_path: &Path, patch_path: &Path) -> Result<String> {
    let source: serde_yaml::Value = parse_yaml_file(source_path)?;
    let patch: serde_yaml::Value = parse_yaml_file(patch_path)?;
    let merged = mergepatch::apply_to_yaml(&source, &patch).map_err(|e| Error::Merge {
        path: source_path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_yaml::to_string(&merged).map_err(Error::from)
}

fn parse_yaml_file(path: &Path) -> Result<serde_yaml::Value> {
    let raw = fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
    serde_yaml::from_str(&raw).map_err(|e| Error::Merge {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
