//! Init command: create an empty root manifest.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use kubevendor::manifest::{self, RootManifest, MANIFEST_FILENAME};
use kubevendor::vcs::{GitDriver, VcsDriver};

/// Create an empty manifest.yaml if absent
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Package name for the new manifest; derived from the git remote or
    /// the directory name when omitted
    #[arg(short, long, value_name = "NAME")]
    pub package: Option<String>,
}

/// Execute the `init` command.
///
/// Creating a manifest and finding one already present are both success;
/// only an I/O failure exits non-zero.
pub fn execute(args: InitArgs) -> Result<()> {
    let dir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    if dir.join(MANIFEST_FILENAME).exists() {
        println!("{} already exists", MANIFEST_FILENAME);
        return Ok(());
    }

    let package = args.package.unwrap_or_else(|| derive_package(&dir));
    manifest::write(&dir, &RootManifest::empty(&package))?;
    println!("Created {}", MANIFEST_FILENAME);
    println!("Run `kubevendor pull` after declaring dependencies");
    Ok(())
}

/// Best-effort package name: the origin remote shorn of its scheme, else
/// the directory name.
fn derive_package(dir: &std::path::Path) -> String {
    if let Some(package) = GitDriver.remote(dir).ok().and_then(|r| package_from_remote(&r)) {
        return package;
    }
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

/// Turn a remote URL into an import-path-like package name.
fn package_from_remote(remote: &str) -> Option<String> {
    let path = if let Ok(url) = url::Url::parse(remote) {
        format!("{}{}", url.host_str()?, url.path())
    } else {
        // scp-style remotes: git@host:owner/repo.git
        remote.strip_prefix("git@")?.replacen(':', "/", 1)
    };
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    (!path.is_empty()).then(|| path.to_string())
}
