//! `claude-slash backups`: inspect and clean up backups.
//!
//! Backups are never removed automatically after a successful update.

use crate::cli::CommandContext;
use crate::update::BackupManager;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

/// Arguments for `claude-slash backups`.
#[derive(Args, Debug, Clone)]
pub struct BackupsCommand {
    #[command(subcommand)]
    command: BackupsSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
enum BackupsSubcommand {
    /// List backups, newest first
    List,

    /// Delete all but the newest backups
    Prune {
        /// Number of backups to keep
        #[arg(long, default_value_t = 1)]
        keep: usize,
    },
}

impl BackupsCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let backups = BackupManager::new(ctx.installation()?);

        match self.command {
            BackupsSubcommand::List => {
                let list = backups.list()?;
                if list.is_empty() {
                    println!("No backups found");
                    return Ok(());
                }
                for backup in list {
                    let created = backup.created_at.map_or_else(
                        || "unknown time".to_string(),
                        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
                    );
                    println!("{}  {}", created.cyan(), backup.path.display());
                }
            }
            BackupsSubcommand::Prune {
                keep,
            } => {
                let removed = backups.prune(keep).await?;
                if removed.is_empty() {
                    println!("Nothing to prune");
                }
                for path in &removed {
                    println!("{} {}", "Removed".yellow(), path.display());
                }
            }
        }
        Ok(())
    }
}
