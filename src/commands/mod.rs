//! # CLI Command Implementations
//!
//! One module per subcommand. Each module defines an `Args` struct derived
//! with `clap` and an `execute` function that drives the library to
//! perform the command's work, returning `anyhow::Result` for the binary
//! layer to convert into an exit code.

pub mod compile;
pub mod completions;
pub mod edit;
pub mod init;
pub mod pull;
pub mod validate;
