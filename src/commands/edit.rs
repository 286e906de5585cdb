//! Edit command: interactively derive a patch from a vendored file.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use kubevendor::editpatch::{self, PatchKind};

/// Edit a vendored file and record the change as a patch
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Vendored source file to edit (a path under _vendor/)
    #[arg(long, value_name = "PATH")]
    pub src: PathBuf,

    /// Patch flavour to generate
    #[arg(long = "type", value_enum, value_name = "KIND", default_value = "strategic")]
    pub kind: PatchKind,

    /// Project directory (defaults to the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,
}

/// Execute the `edit` command.
pub fn execute(args: EditArgs) -> Result<()> {
    let workdir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let patch_path = editpatch::edit(&workdir, &args.src, args.kind)?;
    println!("Wrote {}", patch_path.display());
    println!("Run `kubevendor compile` to emit the patched manifests");
    Ok(())
}
