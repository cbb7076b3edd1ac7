//! `claude-slash status`: describe the installation.

use crate::cli::CommandContext;
use crate::update::{BackupManager, UpdateStatus};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::debug;

/// Arguments for `claude-slash status`.
#[derive(Args, Debug, Clone, Default)]
pub struct StatusCommand {
    /// Do not query the release index
    #[arg(long)]
    pub offline: bool,
}

impl StatusCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let manager = ctx.manager()?;
        let installation = manager.locate_installation()?;

        let resources = installation.resources()?;
        let installed = installation.installed_version()?;
        let backups = BackupManager::new(installation.clone()).list()?;

        println!("{} {}", "Installation:".bold(), installation.root().display());
        println!("{} {}", "Scope:".bold(), installation.scope());
        println!("{} {}", "Commands:".bold(), resources.len());
        println!("{} {}", "Installed:".bold(), installed.as_deref().unwrap_or("unknown"));
        println!("{} {}", "Backups:".bold(), backups.len());

        if self.offline {
            return Ok(());
        }

        let spinner = ctx.spinner("Checking for updates...");
        let status = manager.check().await;
        spinner.finish_and_clear();

        match status {
            Ok(UpdateStatus {
                latest,
                update_available,
                ..
            }) => {
                let line = format!("{} {}", "Latest:".bold(), latest.tag);
                if update_available {
                    println!("{line} {}", "(update available)".yellow());
                } else {
                    println!("{line} {}", "(up to date)".green());
                }
            }
            Err(e) => {
                debug!("Latest release lookup failed: {e}");
                println!("{} {}", "Latest:".bold(), format!("unavailable ({e})").dimmed());
            }
        }
        Ok(())
    }
}
