//! Pull command: run the resolver and rebuild the vendor tree.
//!
//! Drives the full front half of the pipeline: parse the root manifest,
//! solve the transitive graph, materialise `_vendor/`, and re-anchor
//! patched files with the patch-folder sweep. `--raw` skips the sweep for
//! consumers that want the unpatched tree.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use kubevendor::analyzer::ManifestAnalyzer;
use kubevendor::manifest;
use kubevendor::output::{emoji, OutputConfig};
use kubevendor::solver::{SolveOptions, Solver};
use kubevendor::source::SourceManager;
use kubevendor::vendor;

/// Resolve dependencies and rebuild the _vendor/ tree
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Solver deadline in minutes
    #[arg(long, value_name = "MINUTES", default_value_t = 50)]
    pub timeout: u64,

    /// Skip the patch-folder sweep and leave the vendor tree unpatched
    #[arg(long)]
    pub raw: bool,

    /// Fetch sources one at a time instead of in parallel
    #[arg(long)]
    pub serial: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `pull` command.
pub fn execute(args: PullArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let start = Instant::now();

    let workdir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let root = manifest::read_root(&workdir)?;

    if !args.quiet {
        println!(
            "{} Resolving {} ({} direct dependencies)",
            emoji(&out, "🔍", "[SOLVE]"),
            root.package,
            root.dependencies.len()
        );
    }

    let spinner = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("static template"));
        bar.set_message("fetching sources");
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    };

    let sources = if args.serial {
        SourceManager::without_locking()?
    } else {
        SourceManager::new()?
    };
    let analyzer = ManifestAnalyzer;
    let options = SolveOptions {
        timeout: Duration::from_secs(args.timeout * 60),
        prefetch: !args.serial,
    };

    // The source cache is released when `sources` drops, on success and
    // on every error path below.
    let solution = Solver::with_options(&sources, &analyzer, options).solve(&root)?;
    spinner.set_message("writing vendor tree");

    let written = vendor::write_vendor_tree(&workdir, &solution, &sources)?;
    let swept = if args.raw {
        Vec::new()
    } else {
        vendor::sweep_patch_folder(&workdir)?
    };
    spinner.finish_and_clear();
    sources.release();

    if !args.quiet {
        println!(
            "{} Locked {} projects, wrote {} files in {:.2}s",
            emoji(&out, "✅", "[OK]"),
            solution.len(),
            written,
            start.elapsed().as_secs_f64()
        );
        for locked in solution.iter() {
            println!("   {} @ {}", locked.root, &locked.revision[..locked.revision.len().min(12)]);
        }
        if !swept.is_empty() {
            println!("   {} vendored files re-anchored from patch/", swept.len());
        }
    }

    Ok(())
}
