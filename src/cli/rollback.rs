//! `claude-slash rollback`: restore a backup by hand.

use crate::cli::CommandContext;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Arguments for `claude-slash rollback`.
#[derive(Args, Debug, Clone, Default)]
pub struct RollbackCommand {
    /// Backup directory to restore (default: the newest backup)
    pub backup: Option<PathBuf>,
}

impl RollbackCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let manager = ctx.manager()?;
        let installation = manager.locate_installation()?;

        println!("{}", "Restoring from backup...".yellow());
        let spinner = ctx.spinner("Restoring...");
        let restored = manager.restore_backup(&installation, self.backup.as_deref()).await;
        spinner.finish_and_clear();
        let backup = restored?;

        println!(
            "{}",
            format!(
                "Restored {} from {}",
                installation.root().display(),
                backup.path.display()
            )
            .green()
        );
        println!("The backup was kept; run `claude-slash update` to return to the latest release");
        Ok(())
    }
}
