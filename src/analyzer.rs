//! Project analysis: deriving solver constraints from a checked-out tree.
//!
//! The analyzer is a capability behind the [`Analyzer`] trait so alternative
//! implementations (for projects that declare dependencies some other way)
//! can be added without touching the solver. The single implementation today
//! reads the project's `manifest.yaml` through the manifest store; a project
//! without one is a leaf.

use std::path::Path;

use crate::error::Result;
use crate::manifest;
use crate::solver::{Constraint, ProjectRoot};

/// One dependency edge contributed by a project's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyConstraint {
    pub root: ProjectRoot,
    pub constraint: Constraint,
    /// Fetch URL override (`fork`/`repo`), when declared.
    pub source: Option<String>,
    /// Sub-folder to retain, when declared.
    pub folder: Option<String>,
}

/// The constraints a checked-out project contributes to the solve.
#[derive(Debug, Clone, Default)]
pub struct ProjectManifest {
    /// Declaration-ordered dependency constraints.
    pub constraints: Vec<DependencyConstraint>,
}

/// Recorded revisions for a project. May be empty or unpopulated; the
/// solver re-resolves from constraints when it is.
#[derive(Debug, Clone, Default)]
pub struct ProjectLock {
    pub pins: Vec<(ProjectRoot, String)>,
}

/// Capability for turning a checked-out project into manifest and lock
/// views.
pub trait Analyzer: Send + Sync {
    /// Derive the manifest and lock views for the project at `path`.
    ///
    /// A project with no manifest file returns an empty pair, marking it a
    /// leaf.
    fn derive_manifest_and_lock(
        &self,
        path: &Path,
        root: &ProjectRoot,
    ) -> Result<(ProjectManifest, ProjectLock)>;

    /// Stable identity used in the solver's memoisation key, so analyzer
    /// changes invalidate prior results.
    fn info(&self) -> (&'static str, u32);
}

/// Analyzer backed by the `manifest.yaml` file format.
pub struct ManifestAnalyzer;

impl Analyzer for ManifestAnalyzer {
    fn derive_manifest_and_lock(
        &self,
        path: &Path,
        root: &ProjectRoot,
    ) -> Result<(ProjectManifest, ProjectLock)> {
        let Some(parsed) = manifest::read_project_manifest(path)? else {
            return Ok((ProjectManifest::default(), ProjectLock::default()));
        };

        let constraints = parsed
            .dependencies
            .iter()
            .filter(|dep| ProjectRoot::new(&dep.package) != *root)
            .map(|dep| DependencyConstraint {
                root: ProjectRoot::new(&dep.package),
                constraint: Constraint::from_dependency(dep),
                source: dep.fork.clone().or_else(|| dep.repo.clone()),
                folder: dep.folder.clone(),
            })
            .collect();

        Ok((ProjectManifest { constraints }, ProjectLock::default()))
    }

    fn info(&self) -> (&'static str, u32) {
        ("manifest", 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_no_manifest_is_leaf() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::new("github.com/example/a");
        let (manifest, lock) = ManifestAnalyzer
            .derive_manifest_and_lock(dir.path(), &root)
            .unwrap();
        assert!(manifest.constraints.is_empty());
        assert!(lock.pins.is_empty());
    }

    #[test]
    fn test_constraints_translated_one_for_one() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(manifest::MANIFEST_FILENAME),
            r#"
package: github.com/example/b
dependencies:
  - package: github.com/example/a
    version: v1.0.0
  - package: github.com/example/c
    branch: release-1.2
    fork: https://github.com/fork/c
    folder: charts/x
  - package: github.com/example/d
"#,
        )
        .unwrap();

        let root = ProjectRoot::new("github.com/example/b");
        let (parsed, _) = ManifestAnalyzer
            .derive_manifest_and_lock(dir.path(), &root)
            .unwrap();

        assert_eq!(parsed.constraints.len(), 3);
        assert_eq!(
            parsed.constraints[0].constraint,
            Constraint::Revision("v1.0.0".to_string())
        );
        assert_eq!(
            parsed.constraints[1].constraint,
            Constraint::Branch("release-1.2".to_string())
        );
        assert_eq!(
            parsed.constraints[1].source.as_deref(),
            Some("https://github.com/fork/c")
        );
        assert_eq!(parsed.constraints[1].folder.as_deref(), Some("charts/x"));
        assert_eq!(parsed.constraints[2].constraint, Constraint::Default);
    }

    #[test]
    fn test_self_reference_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(manifest::MANIFEST_FILENAME),
            r#"
package: github.com/example/b
dependencies:
  - package: github.com/example/b
    version: v1.0.0
  - package: github.com/example/a
"#,
        )
        .unwrap();

        let root = ProjectRoot::new("github.com/example/b");
        let (parsed, _) = ManifestAnalyzer
            .derive_manifest_and_lock(dir.path(), &root)
            .unwrap();
        assert_eq!(parsed.constraints.len(), 1);
        assert_eq!(parsed.constraints[0].root, ProjectRoot::new("github.com/example/a"));
    }

    #[test]
    fn test_info_identity() {
        let (name, version) = ManifestAnalyzer.info();
        assert_eq!(name, "manifest");
        assert!(version >= 1);
    }
}
