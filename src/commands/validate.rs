//! Validate command: check compiled manifests against the OpenAPI schema.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use kubevendor::output::{emoji, OutputConfig};
use kubevendor::overlay::OUTLOOK_DIR;
use kubevendor::schema::Validator;

/// Validate _outlook/ against the Kubernetes OpenAPI schema
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Target Kubernetes version (e.g. v1.30.0); probed from the stable
    /// release channel when omitted
    #[arg(long, value_name = "VERSION")]
    pub kube_version: Option<String>,

    /// Project directory (defaults to the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,
}

/// Execute the `validate` command.
///
/// Prints one line per valid file; the first invalid file aborts the walk
/// with a non-zero exit.
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let workdir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let outlook = workdir.join(OUTLOOK_DIR);
    if !outlook.is_dir() {
        anyhow::bail!(
            "{} does not exist; run `kubevendor compile` first",
            outlook.display()
        );
    }

    let validator = Validator::new(args.kube_version)?;
    println!(
        "{} Validating against Kubernetes {}",
        emoji(&out, "🔍", "[CHECK]"),
        validator.version()
    );

    let checked = validator.validate_tree(&outlook, |path| {
        println!("{} {} is valid", emoji(&out, "✅", "[OK]"), path.display());
    })?;

    println!("{} {} files valid", emoji(&out, "✅", "[OK]"), checked);
    Ok(())
}
