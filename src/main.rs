//! Binary entry point for the `kubevendor` command-line tool.
//!
//! Parses arguments with `clap`, dispatches to the command modules, and
//! converts errors into a single printed message and a non-zero exit code.
//! The core logic lives in the library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
