//! Centralized error handling for kubevendor.
//!
//! A single `Error` enum covers every anticipated failure mode of the
//! resolver and compiler pipeline, from manifest parsing through OpenAPI
//! validation. Variants carry the path, URL, or ref that triggered them so
//! the CLI can report a failure once, with context, and exit non-zero.

use thiserror::Error;

/// Main error type for kubevendor operations
#[derive(Error, Debug)]
pub enum Error {
    /// The root manifest file does not exist at the expected location.
    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: String },

    /// A manifest file exists but could not be parsed or fails schema
    /// validation.
    #[error("Malformed manifest {path}: {message}")]
    MalformedManifest { path: String, message: String },

    /// The same `package` name appears twice within a single manifest.
    #[error("Duplicate package '{package}' in {path}")]
    DuplicatePackage { package: String, path: String },

    /// Two parents pin incompatible exact revisions for the same project
    /// root. Names both parents so the user can fix either side.
    #[error(
        "Revision conflict for '{root}': {left_parent} wants {left_rev}, {right_parent} wants {right_rev}"
    )]
    Conflict {
        root: String,
        left_parent: String,
        left_rev: String,
        right_parent: String,
        right_rev: String,
    },

    /// A remote fetch failed at the network level.
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// A VCS command failed.
    #[error("VCS command failed for {url}: {command} - {stderr}")]
    Vcs {
        command: String,
        url: String,
        stderr: String,
    },

    /// The requested revision or branch does not exist in the remote.
    #[error("Unknown ref '{reference}' for {url}")]
    UnknownRef { url: String, reference: String },

    /// The resolver exceeded its deadline.
    #[error("Solve timed out after {minutes} minutes")]
    Timeout { minutes: u64 },

    /// A patch file has no matching vendor file.
    #[error("Patch {patch} has no matching vendor file {vendor}")]
    MissingSource { patch: String, vendor: String },

    /// A declared sub-folder does not exist in the fetched dependency.
    #[error("Folder '{folder}' declared for '{root}' does not exist in the source")]
    MissingFolder { root: String, folder: String },

    /// Applying a JSON Merge Patch failed.
    #[error("Merge failed for {path}: {message}")]
    Merge { path: String, message: String },

    /// An output file does not satisfy the OpenAPI schema.
    #[error("Validation failed for {path}: {message}")]
    Validation { path: String, message: String },

    /// The OpenAPI schema set could not be fetched or parsed.
    #[error("Schema error for Kubernetes {version}: {message}")]
    Schema { version: String, message: String },

    /// The external editor could not be launched or exited abnormally.
    #[error("Editor error: {message}")]
    Editor { message: String },

    /// Any filesystem operation failure, wrapped with the path involved.
    #[error("Filesystem error for {path}: {message}")]
    Filesystem { path: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub fn fs(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        Error::Filesystem {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
