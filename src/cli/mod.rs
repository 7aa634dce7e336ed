//! Command-line interface for docrestore.
//!
//! # Commands
//!
//! - `restore` - restore the dependencies declared in a docset's
//!   `docrestore.toml`, write `docrestore.lock.json`, and register the lock
//! - `gc` - prune unreferenced cached versions of URL dependencies
//!
//! ```bash
//! docrestore restore ./docs
//! docrestore restore ./docs --locked ./docs/docrestore.lock.json
//! docrestore --verbose restore --implicit
//! docrestore gc https://example.com/schema.json
//! ```
//!
//! Logging goes to stderr. `RUST_LOG` is respected unless `--verbose` or
//! `--quiet` is given.

mod gc;
mod restore;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::RestoreConfig;

/// Root command and global options.
#[derive(Parser, Debug)]
#[command(
    name = "docrestore",
    about = "Restore git and URL dependencies of documentation builds",
    version,
    long_about = "docrestore fetches the git branches and URL artifacts a docset depends on into a \
                  shared cache, checks branches out as worktrees, and records the exact commits \
                  and content hashes in a lock file."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (same as `RUST_LOG=debug`).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// User config file instead of `~/.docrestore/config.toml`.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Restore the dependencies of a docset.
    Restore(restore::RestoreCommand),

    /// Prune unreferenced cached versions of URL dependencies.
    Gc(gc::GcCommand),
}

impl Cli {
    /// Installs logging, loads the user config, and runs the subcommand.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let config = match &self.config {
            Some(path) => RestoreConfig::load_from(path).await?,
            None => RestoreConfig::load().await?,
        };

        match self.command {
            Commands::Restore(cmd) => cmd.execute(&config).await,
            Commands::Gc(cmd) => cmd.execute(&config).await,
        }
    }

    fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else if self.quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    }

    fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(self.verbose)
            .try_init();
    }
}
