//! Command-line interface for claude-slash.
//!
//! # Commands
//!
//! - `update` - install the latest release, rolling back on failure
//! - `status` - show the installation and the latest release
//! - `rollback` - restore a backup by hand
//! - `backups` - list or prune backups
//! - `version` - print the tool version
//!
//! # Global Options
//!
//! ```bash
//! claude-slash --verbose update          # debug logging
//! claude-slash --quiet update            # errors only
//! claude-slash --config ./c.toml status  # alternate configuration file
//! claude-slash --project-dir ../app update
//! claude-slash --no-progress update      # no spinners, for CI
//! ```

mod backups;
mod common;
mod rollback;
mod status;
mod update;


pub use common::CommandContext;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: &'static str,

    /// Whether spinners are shown.
    pub show_progress: bool,

    /// Configuration file to load instead of the default.
    pub config_path: Option<PathBuf>,

    /// Project whose local installation is checked first.
    pub project_dir: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "claude-slash",
    about = "Manage installed Claude Code slash commands",
    version,
    long_about = "claude-slash keeps an installed set of Claude Code slash commands up to date. \
                  Updates are staged next to the installation and swapped in atomically; a \
                  backup is taken first and restored if anything goes wrong."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file (default: ~/.claude-slash/config.toml)
    #[arg(short, long, global = true, env = "CLAUDE_SLASH_CONFIG")]
    config: Option<PathBuf>,

    /// Project directory used to find a local installation (default: current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Disable spinners and animated output (also CLAUDE_SLASH_NO_PROGRESS)
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the installed commands to the latest release
    Update(update::UpdateCommand),

    /// Show the installation and the latest available release
    Status(status::StatusCommand),

    /// Restore the installation from a backup
    Rollback(rollback::RollbackCommand),

    /// Manage backups of the installation
    Backups(backups::BackupsCommand),

    /// Print the claude-slash version
    Version,
}

impl Cli {
    /// Build the runtime settings for this invocation.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level,
            show_progress: !self.no_progress && !self.quiet,
            config_path: self.config.clone(),
            project_dir: self.project_dir.clone(),
        }
    }

    /// Run the selected command with explicit settings.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        if let Commands::Version = self.command {
            println!("{} {}", "claude-slash".bold(), env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let ctx = CommandContext::load(&config).await?;
        match self.command {
            Commands::Update(cmd) => cmd.execute(&ctx).await,
            Commands::Status(cmd) => cmd.execute(&ctx).await,
            Commands::Rollback(cmd) => cmd.execute(&ctx).await,
            Commands::Backups(cmd) => cmd.execute(&ctx).await,
            Commands::Version => Ok(()),
        }
    }
}
