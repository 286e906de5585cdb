//! VCS driver abstraction and the git implementation.
//!
//! The capability set `{clone, update, checkout, current, commit_info,
//! remote}` is expressed as the [`VcsDriver`] trait so alternative backends
//! (mercurial, bzr, svn) can be added behind the same `open_repo` probing
//! factory. Only git ships today.
//!
//! All drivers shell out to the system binary, which automatically handles
//! SSH keys, credential helpers, and personal access tokens configured in
//! the user's environment.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Commit metadata returned by [`VcsDriver::commit_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// Author line, when the backend reports one.
    pub author: Option<String>,
    /// Commit date, when the backend reports one.
    pub date: Option<String>,
}

/// Capability set implemented by each VCS backend.
pub trait VcsDriver: Send + Sync {
    /// Short backend name, e.g. `"git"`.
    fn name(&self) -> &'static str;

    /// Whether `url` looks like a remote this backend can serve.
    fn probe(&self, url: &str) -> bool;

    /// Clone `url` into `dest`. `dest` must not already contain a clone.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Refresh remote refs in an existing clone.
    fn update(&self, workdir: &Path) -> Result<()>;

    /// Check out `reference` (tag, commit, or branch) in an existing clone.
    fn checkout(&self, workdir: &Path, reference: &str) -> Result<()>;

    /// The current ref of a working copy: branch name, or the detached
    /// commit hash.
    fn current(&self, workdir: &Path) -> Result<String>;

    /// Commit metadata at `reference`.
    fn commit_info(&self, workdir: &Path, reference: &str) -> Result<CommitInfo>;

    /// The fetch URL of the working copy's default remote.
    fn remote(&self, workdir: &Path) -> Result<String>;

    /// Whether `revision` is reachable from `branch`. Used for the
    /// exact-pin-vs-branch warning; failure to answer is not fatal.
    fn is_reachable(&self, workdir: &Path, revision: &str, branch: &str) -> Result<bool>;

    /// Resolve a reference to a full commit hash.
    fn resolve(&self, workdir: &Path, reference: &str) -> Result<String>;
}

/// Git backend shelling out to the system `git` binary.
pub struct GitDriver;

impl GitDriver {
    fn run(&self, workdir: Option<&Path>, args: &[&str], url: &str) -> Result<String> {
        let mut cmd = Command::new("git");
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        let output = cmd.args(args).output().map_err(|e| Error::Vcs {
            command: format!("git {}", args.join(" ")),
            url: url.to_string(),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::Vcs {
                command: format!("git {}", args.join(" ")),
                url: url.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn context(workdir: &Path) -> String {
        workdir.display().to_string()
    }
}

impl VcsDriver for GitDriver {
    fn name(&self) -> &'static str {
        "git"
    }

    fn probe(&self, url: &str) -> bool {
        Command::new("git")
            .args(["ls-remote", "--heads", url])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }

        let output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(dest)
            .output()
            .map_err(|e| Error::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            // Surface a pointed message for the common auth failures
            let message = if stderr.contains("Authentication failed")
                || stderr.contains("Permission denied")
                || stderr.contains("Could not read from remote repository")
            {
                format!(
                    "Authentication failed. For private repos, ensure an SSH key, \
                     credential helper, or access token is configured.\nError: {}",
                    stderr
                )
            } else {
                stderr.to_string()
            };

            return Err(Error::Network {
                url: url.to_string(),
                message,
            });
        }

        Ok(())
    }

    fn update(&self, workdir: &Path) -> Result<()> {
        self.run(
            Some(workdir),
            &["fetch", "--tags", "origin"],
            &Self::context(workdir),
        )?;
        Ok(())
    }

    fn checkout(&self, workdir: &Path, reference: &str) -> Result<()> {
        // Detached checkout so tags, commits and remote branches all work
        // through the same path.
        self.run(
            Some(workdir),
            &["checkout", "--detach", "--force", reference],
            &Self::context(workdir),
        )?;
        Ok(())
    }

    fn current(&self, workdir: &Path) -> Result<String> {
        let branch = self.run(
            Some(workdir),
            &["rev-parse", "--abbrev-ref", "HEAD"],
            &Self::context(workdir),
        )?;
        if branch != "HEAD" {
            return Ok(branch);
        }
        // Detached HEAD: fall back to the commit hash.
        self.run(
            Some(workdir),
            &["rev-parse", "HEAD"],
            &Self::context(workdir),
        )
    }

    fn commit_info(&self, workdir: &Path, reference: &str) -> Result<CommitInfo> {
        let raw = self.run(
            Some(workdir),
            &["log", "-1", "--format=%H%n%an <%ae>%n%aI", reference],
            &Self::context(workdir),
        )?;
        let mut lines = raw.lines();
        let hash = lines
            .next()
            .ok_or_else(|| Error::Vcs {
                command: "git log -1".to_string(),
                url: Self::context(workdir),
                stderr: "empty log output".to_string(),
            })?
            .to_string();
        Ok(CommitInfo {
            hash,
            author: lines.next().map(str::to_string),
            date: lines.next().map(str::to_string),
        })
    }

    fn remote(&self, workdir: &Path) -> Result<String> {
        self.run(
            Some(workdir),
            &["remote", "get-url", "origin"],
            &Self::context(workdir),
        )
    }

    fn is_reachable(&self, workdir: &Path, revision: &str, branch: &str) -> Result<bool> {
        let status = Command::new("git")
            .current_dir(workdir)
            .args(["merge-base", "--is-ancestor", revision, branch])
            .output()
            .map_err(|e| Error::Vcs {
                command: "git merge-base --is-ancestor".to_string(),
                url: Self::context(workdir),
                stderr: e.to_string(),
            })?;
        Ok(status.status.success())
    }

    fn resolve(&self, workdir: &Path, reference: &str) -> Result<String> {
        // `^{commit}` peels annotated tags down to the commit they point at.
        self.run(
            Some(workdir),
            &["rev-parse", &format!("{}^{{commit}}", reference)],
            &Self::context(workdir),
        )
    }
}

/// Probe the remote and return the driver that can serve it.
///
/// Drivers are probed in a fixed order; the first backend that answers for
/// `url` wins. An unreachable remote surfaces as a `Network` error naming
/// the URL.
pub fn open_repo(url: &str) -> Result<&'static dyn VcsDriver> {
    static DRIVERS: &[&dyn VcsDriver] = &[&GitDriver];

    for driver in DRIVERS {
        if driver.probe(url) {
            return Ok(*driver);
        }
    }
    Err(Error::Network {
        url: url.to_string(),
        message: "no VCS backend recognises this remote".to_string(),
    })
}

/// Walk upward from `start` to the enclosing repository root.
///
/// Stops at the user's home directory (the `HOME`-like boundary) or the
/// filesystem root, whichever comes first.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let home = dirs::home_dir();
    let mut current = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(start)
    };

    loop {
        if current.join(".git").exists() {
            return Some(current);
        }
        if Some(current.as_path()) == home.as_deref() {
            return None;
        }
        if !current.pop() {
            return None;
        }
    }
}
