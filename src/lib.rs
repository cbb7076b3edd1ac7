//! claude-slash - slash-command manager for Claude Code
//!
//! Keeps an installed set of Claude Code slash commands (markdown files under
//! `.claude/commands`) in step with the latest published release, without
//! ever leaving the installation half-updated.
//!
//! # Architecture Overview
//!
//! An update runs as a small state machine:
//!
//! 1. Locate the installation (project scope, then the home directory)
//! 2. Ask the release index for the latest tag
//! 3. Back the installation up to a timestamped sibling directory
//! 4. Download and unpack the release archive into a sibling staging directory
//! 5. Check the archive holds the expected resource directory
//! 6. Swap the staged directory into place with renames
//!
//! Any failure in steps 4-6 restores the backup and verifies the restored
//! tree against it.
//!
//! # Core Modules
//!
//! - [`cli`] - Command-line interface
//! - [`config`] - Global configuration (`~/.claude-slash/config.toml`)
//! - [`core`] - Error types and user-facing error reports
//! - [`update`] - Installation discovery, releases, backups and the updater
//! - [`utils`] - Filesystem primitives and progress spinners
//!
//! # Example
//!
//! ```rust,no_run
//! use claude_slash::config::GlobalConfig;
//! use claude_slash::update::UpdateManager;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GlobalConfig::load().await?;
//! let manager = UpdateManager::from_config(&config, Path::new("."))?;
//! let status = manager.check().await?;
//! if status.update_available {
//!     println!("{} is available", status.latest.tag);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod update;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
