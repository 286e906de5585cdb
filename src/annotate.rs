//! Provenance annotation: stamping the working tree's commit hash onto
//! compiled manifests.
//!
//! The annotator is shape-preserving. It touches only
//! `metadata.annotations` of a Kubernetes-style mapping and never
//! round-trips the document through a typed struct, so unknown kinds and
//! unknown fields survive untouched.

use std::path::Path;

use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{Error, Result};
use crate::vcs::{self, GitDriver, VcsDriver};

/// Annotation key carrying the VCS commit hash.
pub const COMMIT_ANNOTATION: &str = "git-commit-hash";

/// Stamps compiled documents with the commit hash of the working copy
/// they were compiled from.
#[derive(Debug, Clone)]
pub struct ProvenanceAnnotator {
    commit: String,
}

impl ProvenanceAnnotator {
    /// Resolve the current commit of the repository enclosing `workdir`.
    pub fn from_workdir(workdir: &Path) -> Result<Self> {
        let repo_root = vcs::find_repo_root(workdir).ok_or_else(|| Error::Filesystem {
            path: workdir.display().to_string(),
            message: "not inside a version-controlled working tree".to_string(),
        })?;
        let driver = GitDriver;
        let current = driver.current(&repo_root)?;
        let info = driver.commit_info(&repo_root, &current)?;
        Ok(ProvenanceAnnotator { commit: info.hash })
    }

    /// Build an annotator with a known commit hash.
    pub fn new(commit: impl Into<String>) -> Self {
        ProvenanceAnnotator {
            commit: commit.into(),
        }
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Set `metadata.annotations[git-commit-hash]` on a Kubernetes-style
    /// mapping. Documents of any other shape pass through unchanged.
    pub fn annotate(&self, doc: &mut YamlValue) {
        let Some(root) = doc.as_mapping_mut() else {
            return;
        };
        let Some(metadata) = root
            .get_mut(YamlValue::String("metadata".to_string()))
            .and_then(YamlValue::as_mapping_mut)
        else {
            return;
        };

        let annotations_key = YamlValue::String("annotations".to_string());
        if !metadata
            .get(&annotations_key)
            .map(YamlValue::is_mapping)
            .unwrap_or(false)
        {
            metadata.insert(annotations_key.clone(), YamlValue::Mapping(Mapping::new()));
        }
        let annotations = metadata
            .get_mut(&annotations_key)
            .and_then(YamlValue::as_mapping_mut)
            .expect("annotations mapping inserted above");

        annotations.insert(
            YamlValue::String(COMMIT_ANNOTATION.to_string()),
            YamlValue::String(self.commit.clone()),
        );
    }
}
