//! State shared by all commands.

use crate::cli::CliConfig;
use crate::config::GlobalConfig;
use crate::core::SlashError;
use crate::update::{Installation, UpdateManager};
use crate::utils::Spinner;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Loaded configuration plus the invocation's global flags.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Parsed configuration file (or defaults)
    pub config: GlobalConfig,
    /// Directory searched for a project-local installation
    pub project_dir: PathBuf,
    /// Whether spinners are shown
    pub show_progress: bool,
}

impl CommandContext {
    /// Load the configuration named by `cli` and resolve the project directory.
    pub async fn load(cli: &CliConfig) -> Result<Self> {
        let config = GlobalConfig::load_with_optional(cli.config_path.clone()).await?;
        let project_dir = match &cli.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };

        Ok(Self {
            config,
            project_dir,
            show_progress: cli.show_progress,
        })
    }

    /// Update manager built from this context.
    pub fn manager(&self) -> Result<UpdateManager, SlashError> {
        UpdateManager::from_config(&self.config, &self.project_dir)
    }

    /// The active installation.
    pub fn installation(&self) -> Result<Installation, SlashError> {
        self.manager()?.locate_installation()
    }

    /// Spinner honoring `--no-progress`.
    pub fn spinner(&self, msg: impl Into<String>) -> Spinner {
        Spinner::new(msg, self.show_progress)
    }
}
