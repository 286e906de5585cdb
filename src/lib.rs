//! # kubevendor
//!
//! Core library for the `kubevendor` command-line tool: a package manager
//! for Kubernetes YAML bundles.
//!
//! Given a root `manifest.yaml` of declared dependencies, the library
//! resolves the transitive graph across remote source repositories,
//! materialises a locked and deduplicated `_vendor/` tree of raw
//! manifests, compiles the `patch/` overlay tree into an annotated
//! `_outlook/` tree, and validates the result against the Kubernetes
//! OpenAPI schema for a target version.
//!
//! ## Pipeline
//!
//! 1.  **Manifest** (`manifest`): parse the root manifest and the optional
//!     per-dependency manifests.
//! 2.  **Solve** (`solver`): walk the transitive graph, apply overrides,
//!     detect conflicts, and bind each project root to one revision. The
//!     solver drives the source manager (`source`) and analyzer
//!     (`analyzer`) on demand.
//! 3.  **Vendor** (`vendor`): rebuild `_vendor/` from the solution,
//!     pruning declared folders, stripping nested vendor directories, and
//!     re-anchoring patched files.
//! 4.  **Compile** (`overlay`): merge each `patch/` file onto its vendor
//!     counterpart, stamp provenance (`annotate`), and emit `_outlook/`.
//! 5.  **Validate** (`schema`): check every compiled file against the
//!     cached OpenAPI schema set.
//!
//! The `editpatch` module hosts the independent edit workflow that
//! produces patch files, and `mergepatch` holds the shared patch algebra.

pub mod analyzer;
pub mod annotate;
pub mod editpatch;
pub mod error;
pub mod fstree;
pub mod manifest;
pub mod mergepatch;
pub mod output;
pub mod overlay;
pub mod schema;
pub mod solver;
pub mod source;
pub mod vcs;
pub mod vendor;
