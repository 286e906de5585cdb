//! # Manifest Schema and Parsing
//!
//! This module defines the data structures that represent the root
//! `manifest.yaml` file, as well as the logic for reading and writing it.
//! The same schema doubles as the per-dependency manifest format: a checked
//! out dependency may carry its own `manifest.yaml` declaring transitive
//! dependencies, and a dependency without one is a leaf.
//!
//! ## Key Components
//!
//! - **`RootManifest`**: The project identity, its owners, its ordered
//!   dependency list, and an optional patch list.
//! - **`Dependency`**: One declared dependency with its pin (`version` or
//!   `branch`), optional fetch URL override (`fork`/`repo`), and optional
//!   retained sub-folder.
//!
//! Declaration order of dependencies is preserved on parse and used by the
//! solver as a tie-break. Unknown YAML fields are ignored. Duplicate
//! `package` names within one manifest are rejected at read time.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed filename of the manifest relative to a project root.
pub const MANIFEST_FILENAME: &str = "manifest.yaml";

/// A project maintainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    pub email: String,
}

/// One declared dependency record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Canonical source name, e.g. `github.com/example/a`. Unique within a
    /// manifest; also the lookup key.
    pub package: String,

    /// Exact revision pin (tag or commit). Mutually exclusive with
    /// `branch`; wins when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Branch name to follow at its tip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Alternate fetch URL overriding the default derived from `package`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<String>,

    /// Alternate fetch URL; `fork` takes precedence when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// Sub-path within the dependency to retain; everything else is pruned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl Dependency {
    /// The fetch URL for this record: the `fork`/`repo` override when set,
    /// otherwise `https://<package>`.
    pub fn source_url(&self) -> String {
        self.fork
            .clone()
            .or_else(|| self.repo.clone())
            .unwrap_or_else(|| format!("https://{}", self.package))
    }

    /// The effective pin. `version` wins over `branch` when both are set.
    pub fn pin(&self) -> Option<&str> {
        self.version.as_deref().or(self.branch.as_deref())
    }
}

/// The root manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootManifest {
    /// Import-path-like string naming the project itself.
    pub package: String,

    /// Project maintainers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<Owner>,

    /// Ordered dependency records. Order is a solver tie-break.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Optional ordered patch file identifiers applied at compile time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<String>,
}

impl RootManifest {
    /// An empty manifest for a freshly initialised project.
    pub fn empty(package: &str) -> Self {
        RootManifest {
            package: package.to_string(),
            ..Default::default()
        }
    }
}

/// Read and validate the root manifest under `dir`.
///
/// Fails with `ManifestNotFound` when the file is absent, `MalformedManifest`
/// on a parse error, and `DuplicatePackage` when two dependency records share
/// a `package` name.
pub fn read_root(dir: &Path) -> Result<RootManifest> {
    let path = dir.join(MANIFEST_FILENAME);
    if !path.is_file() {
        return Err(Error::ManifestNotFound {
            path: path.display().to_string(),
        });
    }
    parse_manifest(&path)
}

/// Read the optional per-project manifest inside a checked-out dependency.
///
/// Returns `Ok(None)` when no manifest file exists -- dependencies without
/// manifests are leaves, not errors. A manifest that exists but fails to
/// parse is still a hard error: it is user-authored input.
pub fn read_project_manifest(dir: &Path) -> Result<Option<RootManifest>> {
    let path = dir.join(MANIFEST_FILENAME);
    if !path.is_file() {
        return Ok(None);
    }
    parse_manifest(&path).map(Some)
}

/// Serialise a manifest to `dir/manifest.yaml`.
pub fn write(dir: &Path, manifest: &RootManifest) -> Result<()> {
    let path = dir.join(MANIFEST_FILENAME);
    let body = serde_yaml::to_string(manifest)?;
    fs::write(&path, body).map_err(|e| Error::fs(&path, e))?;
    Ok(())
}

fn parse_manifest(path: &Path) -> Result<RootManifest> {
    let raw = fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
    let manifest: RootManifest =
        serde_yaml::from_str(&raw).map_err(|e| Error::MalformedManifest {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    check_duplicates(&manifest, path)?;
    Ok(manifest)
}

/// Reject manifests where two dependency records share a `package`.
fn check_duplicates(manifest: &RootManifest, path: &Path) -> Result<()> {
    let mut seen = HashSet::new();
    for dep in &manifest.dependencies {
        if !seen.insert(dep.package.as_str()) {
            return Err(Error::DuplicatePackage {
                package: dep.package.clone(),
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
package: github.com/example/app
owners:
  - name: Jane Doe
    email: jane@example.com
dependencies:
  - package: github.com/example/a
    version: v1.0.0
  - package: github.com/example/b
    branch: master
    folder: charts/x
  - package: github.com/example/c
    fork: https://github.com/fork/c
patches:
  - patch/github.com/example/a/deploy.yaml
"#;

    fn write_manifest(dir: &Path, content: &str) {
        fs::write(dir.join(MANIFEST_FILENAME), content).unwrap();
    }

    #[test]
    fn test_read_root_parses_all_fields() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), SAMPLE);

        let manifest = read_root(dir.path()).unwrap();
        assert_eq!(manifest.package, "github.com/example/app");
        assert_eq!(manifest.owners.len(), 1);
        assert_eq!(manifest.owners[0].email, "jane@example.com");
        assert_eq!(manifest.dependencies.len(), 3);
        assert_eq!(manifest.dependencies[0].version.as_deref(), Some("v1.0.0"));
        assert_eq!(manifest.dependencies[1].branch.as_deref(), Some("master"));
        assert_eq!(manifest.dependencies[1].folder.as_deref(), Some("charts/x"));
        assert_eq!(manifest.patches.len(), 1);
    }

    #[test]
    fn test_read_root_preserves_declaration_order() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), SAMPLE);

        let manifest = read_root(dir.path()).unwrap();
        let names: Vec<&str> = manifest
            .dependencies
            .iter()
            .map(|d| d.package.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "github.com/example/a",
                "github.com/example/b",
                "github.com/example/c"
            ]
        );
    }

    #[test]
    fn test_read_root_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_root(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound { .. }));
    }

    #[test]
    fn test_read_root_malformed() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), "package: [unclosed");
        let err = read_root(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedManifest { .. }));
    }

    #[test]
    fn test_read_root_rejects_duplicate_package() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            r#"
package: github.com/example/app
dependencies:
  - package: github.com/example/a
    version: v1.0.0
  - package: github.com/example/a
    version: v2.0.0
"#,
        );
        let err = read_root(dir.path()).unwrap_err();
        match err {
            Error::DuplicatePackage { package, .. } => {
                assert_eq!(package, "github.com/example/a");
            }
            other => panic!("expected DuplicatePackage, got {:?}", other),
        }
    }

    #[test]
    fn test_read_root_ignores_unknown_fields() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            r#"
package: github.com/example/app
future_field: ignored
dependencies:
  - package: github.com/example/a
    version: v1.0.0
    comment: also ignored
"#,
        );
        let manifest = read_root(dir.path()).unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
    }

    #[test]
    fn test_read_project_manifest_absent_is_leaf() {
        let dir = TempDir::new().unwrap();
        assert!(read_project_manifest(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_read_project_manifest_present() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), SAMPLE);
        let manifest = read_project_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.dependencies.len(), 3);
    }

    #[test]
    fn test_write_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut manifest = RootManifest::empty("github.com/example/app");
        manifest.dependencies.push(Dependency {
            package: "github.com/example/a".to_string(),
            version: Some("v1.0.0".to_string()),
            ..Default::default()
        });

        write(dir.path(), &manifest).unwrap();
        let loaded = read_root(dir.path()).unwrap();
        assert_eq!(loaded.package, manifest.package);
        assert_eq!(loaded.dependencies, manifest.dependencies);
    }

    #[test]
    fn test_source_url_derivation() {
        let dep = Dependency {
            package: "github.com/example/a".to_string(),
            ..Default::default()
        };
        assert_eq!(dep.source_url(), "https://github.com/example/a");

        let forked = Dependency {
            package: "github.com/example/a".to_string(),
            fork: Some("https://github.com/fork/a".to_string()),
            repo: Some("https://github.com/other/a".to_string()),
            ..Default::default()
        };
        // fork wins over repo
        assert_eq!(forked.source_url(), "https://github.com/fork/a");
    }

    #[test]
    fn test_pin_version_wins_over_branch() {
        let dep = Dependency {
            package: "github.com/example/a".to_string(),
            version: Some("v1.0.0".to_string()),
            branch: Some("master".to_string()),
            ..Default::default()
        };
        assert_eq!(dep.pin(), Some("v1.0.0"));
    }
}
