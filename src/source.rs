//! # Source Manager
//!
//! Fetches remote source repositories into a run-scoped disk cache and
//! exposes read-only snapshot paths at requested revisions.
//!
//! ## Design
//!
//! One clone per URL lives under a private temp directory for the lifetime
//! of the manager; requesting a revision checks it out in the existing
//! clone. `acquire` is idempotent and safe for concurrent callers: a
//! per-URL lock serialises fetches against the same remote while distinct
//! URLs proceed in parallel. Dropping the manager (or calling `release`)
//! removes the entire cache directory, on every exit path.
//!
//! The [`Sources`] trait is the seam the solver and vendor writer depend
//! on, so tests can substitute prepared local directories for real clones.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::debug;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::solver::Constraint;
use crate::vcs::{self, VcsDriver};

/// A read-only view of a repository at a resolved revision.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Local directory holding the checked-out contents.
    pub path: PathBuf,
    /// The commit hash the contents are at.
    pub revision: String,
}

/// Capability the solver and vendor writer use to obtain source snapshots.
pub trait Sources: Send + Sync {
    /// Provide a local snapshot of `url` at `constraint`. Idempotent;
    /// concurrent calls for the same URL serialise to a single fetch.
    fn acquire(&self, url: &str, constraint: &Constraint) -> Result<Snapshot>;

    /// Best-effort check that `revision` is reachable from `branch` in the
    /// clone of `url`. Answers `true` when the question cannot be decided.
    fn branch_contains(&self, _url: &str, _revision: &str, _branch: &str) -> Result<bool> {
        Ok(true)
    }
}

struct CloneState {
    path: PathBuf,
    driver: &'static dyn VcsDriver,
    /// Ref of the default branch recorded at clone time.
    default_ref: String,
    /// Last constraint checked out, to skip redundant checkouts.
    checked_out: Option<Constraint>,
    /// Whether remote refs have been refreshed since the clone.
    updated: bool,
}

/// Run-scoped source repository cache.
///
/// The clone table is only ever locked briefly; clone, fetch and checkout
/// all run under the per-URL state lock so distinct URLs proceed in
/// parallel.
pub struct SourceManager {
    cache: TempDir,
    clones: Mutex<HashMap<String, Arc<Mutex<Option<CloneState>>>>>,
    locking: bool,
}

impl SourceManager {
    /// Create a manager with a fresh private cache directory.
    pub fn new() -> Result<Self> {
        let cache = tempfile::Builder::new()
            .prefix("kubevendor-src-")
            .tempdir()?;
        Ok(SourceManager {
            cache,
            clones: Mutex::new(HashMap::new()),
            locking: true,
        })
    }

    /// Create a manager with per-URL fetch locking disabled, for
    /// single-threaded runs.
    pub fn without_locking() -> Result<Self> {
        let mut manager = Self::new()?;
        manager.locking = false;
        Ok(manager)
    }

    /// The cache directory owned by this manager.
    pub fn cache_dir(&self) -> &Path {
        self.cache.path()
    }

    /// Remove the cache directory. Equivalent to dropping the manager;
    /// provided so call sites can make the release explicit.
    pub fn release(self) {
        drop(self);
    }

    fn clone_dir(&self, url: &str) -> PathBuf {
        // Hash the URL for a filesystem-safe, collision-free directory name.
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let tail = url
            .rsplit('/')
            .next()
            .unwrap_or("repo")
            .trim_end_matches(".git");
        self.cache
            .path()
            .join(format!("{}-{:x}", tail, hasher.finish()))
    }

    /// Per-URL entry in the clone table. The table lock is held only long
    /// enough to fetch or insert the `Arc`.
    fn entry(&self, url: &str) -> Result<Arc<Mutex<Option<CloneState>>>> {
        let mut clones = self.clones.lock().map_err(|_| Error::LockPoisoned {
            context: "source clone table".to_string(),
        })?;
        Ok(clones.entry(url.to_string()).or_default().clone())
    }

    fn ensure_clone(&self, url: &str, slot: &mut Option<CloneState>) -> Result<()> {
        if slot.is_some() {
            return Ok(());
        }

        let driver = vcs::open_repo(url)?;
        let path = self.clone_dir(url);
        debug!("cloning {} into {}", url, path.display());
        driver.clone_repo(url, &path)?;
        let default_ref = driver.current(&path)?;

        *slot = Some(CloneState {
            path,
            driver,
            default_ref,
            checked_out: None,
            updated: false,
        });
        Ok(())
    }

    fn checkout(state: &mut CloneState, url: &str, constraint: &Constraint) -> Result<String> {
        if state.checked_out.as_ref() != Some(constraint) {
            let target = match constraint {
                Constraint::Revision(rev) => rev.clone(),
                Constraint::Branch(branch) => {
                    // Branch tips live on the remote; refresh before
                    // following them.
                    if !state.updated {
                        state.driver.update(&state.path)?;
                        state.updated = true;
                    }
                    let remote_ref = format!("origin/{}", branch);
                    if state.driver.checkout(&state.path, &remote_ref).is_ok() {
                        state.checked_out = Some(constraint.clone());
                        return state.driver.resolve(&state.path, "HEAD");
                    }
                    branch.clone()
                }
                Constraint::Default => state.default_ref.clone(),
            };

            if state.driver.checkout(&state.path, &target).is_err() {
                // The ref may have appeared upstream since the clone.
                if !state.updated {
                    state.driver.update(&state.path)?;
                    state.updated = true;
                }
                state
                    .driver
                    .checkout(&state.path, &target)
                    .map_err(|_| Error::UnknownRef {
                        url: url.to_string(),
                        reference: target.clone(),
                    })?;
            }
            state.checked_out = Some(constraint.clone());
        }

        state.driver.resolve(&state.path, "HEAD")
    }
}

impl Sources for SourceManager {
    fn acquire(&self, url: &str, constraint: &Constraint) -> Result<Snapshot> {
        let entry = self.entry(url)?;

        // Serialise fetches against the same remote; distinct URLs hold
        // distinct entry locks and proceed in parallel.
        let mut slot = if self.locking {
            entry.lock().map_err(|_| Error::LockPoisoned {
                context: format!("fetch lock for {}", url),
            })?
        } else {
            entry.try_lock().map_err(|_| Error::LockPoisoned {
                context: format!("fetch lock for {}", url),
            })?
        };

        self.ensure_clone(url, &mut slot)?;
        let state = slot.as_mut().expect("clone state populated above");
        let revision = Self::checkout(state, url, constraint)?;
        Ok(Snapshot {
            path: state.path.clone(),
            revision,
        })
    }

    fn branch_contains(&self, url: &str, revision: &str, branch: &str) -> Result<bool> {
        let entry = self.entry(url)?;
        let slot = entry.lock().map_err(|_| Error::LockPoisoned {
            context: format!("fetch lock for {}", url),
        })?;
        match slot.as_ref() {
            Some(state) => state.driver.is_reachable(&state.path, revision, branch),
            None => Ok(true),
        }
    }
}
