//! Compile command: overlay patches onto vendored manifests.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use kubevendor::annotate::ProvenanceAnnotator;
use kubevendor::output::{emoji, OutputConfig};
use kubevendor::overlay::{self, OUTLOOK_DIR};

/// Compile patch/ overlays into the _outlook/ tree
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `compile` command.
pub fn execute(args: CompileArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let workdir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let annotator = ProvenanceAnnotator::from_workdir(&workdir)?;
    let emitted = overlay::compile(&workdir, &annotator)?;

    if !args.quiet {
        for rel in &emitted {
            println!(
                "{} {}/{}",
                emoji(&out, "📦", "[OUT]"),
                OUTLOOK_DIR,
                rel.display()
            );
        }
        println!(
            "{} Compiled {} files at commit {}",
            emoji(&out, "✅", "[OK]"),
            emitted.len(),
            annotator.commit()
        );
    }

    Ok(())
}
