//! # Dependency Solver
//!
//! Walks the transitive dependency graph declared by the root manifest,
//! applies overrides, and binds every project root to exactly one revision.
//!
//! ## Algorithm
//!
//! A FIFO work list is seeded with the root manifest's dependencies in
//! declaration order. Popping an item either locks a new project root --
//! acquire the source, analyse its own manifest, enqueue what it declares --
//! or merges the item's constraint into an already-locked root. Each root
//! is visited once, which also makes cycles in the graph harmless.
//!
//! Constraint intersection rules:
//!
//! - two exact revisions must be equal, otherwise the solve fails with a
//!   conflict naming both parents;
//! - an exact revision and a branch only warn, after a best-effort
//!   reachability check through the VCS driver;
//! - a branch and a different branch warn; the first lock stands;
//! - `Default` (no pin) intersects with anything.
//!
//! Source URL selection is first-wins: because the work list is FIFO and
//! seeded in declaration order, the dependency listed earlier in its
//! parent's manifest wins. A `fork`/`repo` declared in the root manifest is
//! an override and beats any transitive choice for that root.
//!
//! The solve aborts with `Timeout` when its deadline elapses; the source
//! cache is released by the caller's `SourceManager` on every exit path.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rayon::prelude::*;

use crate::analyzer::Analyzer;
use crate::error::{Error, Result};
use crate::manifest::{Dependency, RootManifest};
use crate::source::Sources;

/// Parent name used for edges contributed by the root manifest itself.
pub const ROOT_PARENT: &str = "root manifest";

/// Canonical key for a dependency; the unit of deduplication across the
/// transitive graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectRoot(String);

impl ProjectRoot {
    /// Normalise a package string: surrounding whitespace, trailing
    /// slashes, and a `.git` suffix are insignificant.
    pub fn new(package: &str) -> Self {
        let trimmed = package.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        ProjectRoot(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The fetch URL derived from the package name when no override is
    /// declared.
    pub fn default_url(&self) -> String {
        format!("https://{}", self.0)
    }
}

impl fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A version constraint contributed by one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Exact revision pin: tag or commit hash.
    Revision(String),
    /// Tip of a named branch.
    Branch(String),
    /// No pin; the remote's default branch tip.
    Default,
}

impl Constraint {
    /// Translate a manifest dependency record. `version` wins over
    /// `branch` when both are set.
    pub fn from_dependency(dep: &Dependency) -> Self {
        if let Some(version) = &dep.version {
            Constraint::Revision(version.clone())
        } else if let Some(branch) = &dep.branch {
            Constraint::Branch(branch.clone())
        } else {
            Constraint::Default
        }
    }

    fn describe(&self) -> String {
        match self {
            Constraint::Revision(rev) => rev.clone(),
            Constraint::Branch(branch) => format!("branch {}", branch),
            Constraint::Default => "default branch".to_string(),
        }
    }
}

/// The solver's binding of a project root to a revision, source URL, and
/// retained sub-folder set.
#[derive(Debug, Clone)]
pub struct LockedProject {
    pub root: ProjectRoot,
    /// Resolved commit hash.
    pub revision: String,
    pub source_url: String,
    /// Sub-folders to retain; `None` keeps the whole project.
    pub folders: Option<BTreeSet<String>>,
}

/// The set of locked projects produced by one solver run; exactly one per
/// project root, iterated in deterministic order.
#[derive(Debug, Default)]
pub struct Solution {
    projects: BTreeMap<ProjectRoot, LockedProject>,
}

impl Solution {
    pub fn iter(&self) -> impl Iterator<Item = &LockedProject> {
        self.projects.values()
    }

    pub fn get(&self, root: &ProjectRoot) -> Option<&LockedProject> {
        self.projects.get(root)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    fn contains(&self, root: &ProjectRoot) -> bool {
        self.projects.contains_key(root)
    }

    fn insert(&mut self, locked: LockedProject) {
        self.projects.insert(locked.root.clone(), locked);
    }

    fn get_mut(&mut self, root: &ProjectRoot) -> Option<&mut LockedProject> {
        self.projects.get_mut(root)
    }

    /// Direct insertion for tests that need a solution without a solve.
    #[cfg(test)]
    pub(crate) fn insert_for_tests(&mut self, locked: LockedProject) {
        self.insert(locked);
    }
}

/// Solver tunables.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Deadline for the whole solve.
    pub timeout: Duration,
    /// Prefetch the root's direct dependencies in parallel before the
    /// sequential walk.
    pub prefetch: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            // User-configurable; fifty minutes covers cold caches on large
            // graphs.
            timeout: Duration::from_secs(50 * 60),
            prefetch: true,
        }
    }
}

struct WorkItem {
    root: ProjectRoot,
    constraint: Constraint,
    source: Option<String>,
    folder: Option<String>,
    parent: String,
}

pub struct Solver<'a> {
    sources: &'a dyn Sources,
    analyzer: &'a dyn Analyzer,
    options: SolveOptions,
}

impl<'a> Solver<'a> {
    pub fn new(sources: &'a dyn Sources, analyzer: &'a dyn Analyzer) -> Self {
        Solver {
            sources,
            analyzer,
            options: SolveOptions::default(),
        }
    }

    pub fn with_options(
        sources: &'a dyn Sources,
        analyzer: &'a dyn Analyzer,
        options: SolveOptions,
    ) -> Self {
        Solver {
            sources,
            analyzer,
            options,
        }
    }

    /// Produce a [`Solution`] for the root manifest.
    pub fn solve(&self, manifest: &RootManifest) -> Result<Solution> {
        let deadline = Instant::now() + self.options.timeout;
        let (analyzer_name, analyzer_version) = self.analyzer.info();
        debug!(
            "solving {} direct dependencies with analyzer {} v{}",
            manifest.dependencies.len(),
            analyzer_name,
            analyzer_version
        );

        // Fetch-URL overrides declared in the root manifest beat any
        // transitive choice for the same root.
        let mut source_overrides: HashMap<ProjectRoot, String> = HashMap::new();
        for dep in &manifest.dependencies {
            if let Some(url) = dep.fork.clone().or_else(|| dep.repo.clone()) {
                source_overrides.insert(ProjectRoot::new(&dep.package), url);
            }
        }

        let mut work: VecDeque<WorkItem> = manifest
            .dependencies
            .iter()
            .map(|dep| WorkItem {
                root: ProjectRoot::new(&dep.package),
                constraint: Constraint::from_dependency(dep),
                source: dep.fork.clone().or_else(|| dep.repo.clone()),
                folder: dep.folder.clone(),
                parent: ROOT_PARENT.to_string(),
            })
            .collect();

        if self.options.prefetch {
            self.prefetch(&work, &source_overrides);
        }

        let self_root = ProjectRoot::new(&manifest.package);
        let mut solution = Solution::default();
        // Pin bookkeeping per root: the constraint that locked it and the
        // parent that contributed it, for conflict messages.
        let mut pins: HashMap<ProjectRoot, (Constraint, String)> = HashMap::new();

        while let Some(item) = work.pop_front() {
            if Instant::now() >= deadline {
                return Err(Error::Timeout {
                    minutes: self.options.timeout.as_secs() / 60,
                });
            }

            // The root project never vendors itself, even through a cycle.
            if item.root == self_root {
                continue;
            }

            if solution.contains(&item.root) {
                self.merge_visited(&item, &mut solution, &mut pins)?;
                continue;
            }

            let url = source_overrides
                .get(&item.root)
                .cloned()
                .or_else(|| item.source.clone())
                .unwrap_or_else(|| item.root.default_url());

            debug!(
                "locking {} at {} from {} (wanted by {})",
                item.root,
                item.constraint.describe(),
                url,
                item.parent
            );
            let snapshot = self.sources.acquire(&url, &item.constraint)?;

            if let Some(folder) = &item.folder {
                if !snapshot.path.join(folder).is_dir() {
                    return Err(Error::MissingFolder {
                        root: item.root.to_string(),
                        folder: folder.clone(),
                    });
                }
            }

            let (project_manifest, _lock) = self
                .analyzer
                .derive_manifest_and_lock(&snapshot.path, &item.root)?;
            for constraint in project_manifest.constraints {
                work.push_back(WorkItem {
                    root: constraint.root,
                    constraint: constraint.constraint,
                    source: constraint.source,
                    folder: constraint.folder,
                    parent: item.root.to_string(),
                });
            }

            pins.insert(item.root.clone(), (item.constraint.clone(), item.parent));
            solution.insert(LockedProject {
                root: item.root,
                revision: snapshot.revision,
                source_url: url,
                folders: item.folder.map(|f| BTreeSet::from([f])),
            });
        }

        debug!("solved: {} locked projects", solution.len());
        Ok(solution)
    }

    /// Merge a late-arriving constraint into an already-locked root.
    fn merge_visited(
        &self,
        item: &WorkItem,
        solution: &mut Solution,
        pins: &mut HashMap<ProjectRoot, (Constraint, String)>,
    ) -> Result<()> {
        let (pinned, pinned_by) = pins
            .get(&item.root)
            .cloned()
            .unwrap_or((Constraint::Default, ROOT_PARENT.to_string()));

        match (&pinned, &item.constraint) {
            (Constraint::Revision(a), Constraint::Revision(b)) if a != b => {
                return Err(Error::Conflict {
                    root: item.root.to_string(),
                    left_parent: pinned_by,
                    left_rev: a.clone(),
                    right_parent: item.parent.clone(),
                    right_rev: b.clone(),
                });
            }
            (Constraint::Revision(rev), Constraint::Branch(branch))
            | (Constraint::Branch(branch), Constraint::Revision(rev)) => {
                let locked = solution.get(&item.root);
                let reachable = locked
                    .map(|l| {
                        self.sources
                            .branch_contains(&l.source_url, rev, branch)
                            .unwrap_or(true)
                    })
                    .unwrap_or(true);
                if !reachable {
                    warn!(
                        "'{}': revision {} is not reachable from branch {} ({} vs {})",
                        item.root, rev, branch, pinned_by, item.parent
                    );
                }
            }
            (Constraint::Branch(a), Constraint::Branch(b)) if a != b => {
                warn!(
                    "'{}': branch constraints differ ({} from {}, {} from {}); keeping {}",
                    item.root, a, pinned_by, b, item.parent, a
                );
            }
            _ => {}
        }

        // A stronger pin than the recorded one is kept for later conflict
        // checks; Default never displaces an exact pin.
        if matches!(pinned, Constraint::Default)
            && !matches!(item.constraint, Constraint::Default)
        {
            pins.insert(
                item.root.clone(),
                (item.constraint.clone(), item.parent.clone()),
            );
        }

        // Union the retained folders; any parent wanting the whole project
        // wins.
        if let Some(locked) = solution.get_mut(&item.root) {
            locked.folders = match (locked.folders.take(), item.folder.clone()) {
                (Some(mut set), Some(folder)) => {
                    set.insert(folder);
                    Some(set)
                }
                _ => None,
            };
        }
        Ok(())
    }

    /// Warm the source cache for the first wave in parallel. Failures are
    /// ignored here; the sequential walk surfaces them with full context.
    fn prefetch(&self, work: &VecDeque<WorkItem>, overrides: &HashMap<ProjectRoot, String>) {
        let targets: Vec<(String, Constraint)> = work
            .iter()
            .map(|item| {
                let url = overrides
                    .get(&item.root)
                    .cloned()
                    .or_else(|| item.source.clone())
                    .unwrap_or_else(|| item.root.default_url());
                (url, item.constraint.clone())
            })
            .collect();

        targets.par_iter().for_each(|(url, constraint)| {
            if let Err(e) = self.sources.acquire(url, constraint) {
                debug!("prefetch of {} failed: {}", url, e);
            }
        });
    }
}
