//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// kubevendor - Resolve, compile and validate Kubernetes YAML bundles
#[derive(Parser, Debug)]
#[command(name = "kubevendor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Enable solver and fetch tracing
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty manifest.yaml in the current directory
    Init(commands::init::InitArgs),

    /// Resolve dependencies and rebuild the _vendor/ tree
    #[command(alias = "dep")]
    Pull(commands::pull::PullArgs),

    /// Edit a vendored file and record the change as a patch
    Edit(commands::edit::EditArgs),

    /// Compile patch/ overlays into the _outlook/ tree
    #[command(alias = "up")]
    Compile(commands::compile::CompileArgs),

    /// Validate _outlook/ against the Kubernetes OpenAPI schema
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // RUST_LOG wins when set; --verbose raises the default to debug.
        let default_level = if self.verbose { "debug" } else { "warn" };
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(default_level),
        )
        .init();

        match self.command {
            Commands::Init(args) => commands::init::execute(args),
            Commands::Pull(args) => commands::pull::execute(args, &self.color),
            Commands::Edit(args) => commands::edit::execute(args),
            Commands::Compile(args) => commands::compile::execute(args, &self.color),
            Commands::Validate(args) => commands::validate::execute(args, &self.color),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
