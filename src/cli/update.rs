//! `claude-slash update`: install the latest release.
//!
//! ```bash
//! claude-slash update           # install the latest release unless it is installed
//! claude-slash update --check   # only report whether one exists
//! claude-slash update --force   # re-install even when current
//! ```
//!
//! A failed update is rolled back automatically; the command then reports
//! the phase that failed, why, whether the rollback succeeded and where the
//! backup is, and exits non-zero.

use crate::cli::CommandContext;
use crate::update::{RunOutcome, UpdatePhase, UpdateProgress, UpdateResult};
use crate::utils::Spinner;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Arguments for `claude-slash update`.
#[derive(Args, Debug, Clone, Default)]
pub struct UpdateCommand {
    /// Only check whether the latest release is installed
    #[arg(long, conflicts_with = "force")]
    pub check: bool,

    /// Install the latest release even if it is already installed
    #[arg(long)]
    pub force: bool,
}

/// Mirrors update phases onto a spinner.
struct SpinnerProgress(Spinner);

impl UpdateProgress for SpinnerProgress {
    fn phase_changed(&self, phase: UpdatePhase, detail: &str) {
        match phase {
            UpdatePhase::Succeeded | UpdatePhase::Failed => {}
            UpdatePhase::RollingBack => {
                self.0.println(format!("{}", "Update failed, restoring backup...".yellow()));
                self.0.set_message(detail.to_string());
            }
            _ => self.0.set_message(format!("{detail}...")),
        }
    }
}

impl UpdateCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        if self.check {
            return check(ctx).await;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupt received, cancelling update");
                let _ = cancel_tx.send(true);
            }
        });

        let spinner = ctx.spinner("Starting update...");
        let manager = ctx
            .manager()?
            .with_cancellation(cancel_rx)
            .with_progress(Arc::new(SpinnerProgress(spinner.clone())));

        let outcome = manager.run(self.force).await;
        spinner.finish_and_clear();
        ctrl_c.abort();

        match outcome? {
            RunOutcome::AlreadyCurrent {
                installation,
                release,
            } => {
                println!(
                    "{}",
                    format!(
                        "Already up to date ({}) at {}",
                        release.tag,
                        installation.root().display()
                    )
                    .green()
                );
                Ok(())
            }
            RunOutcome::Completed {
                installation,
                result:
                    UpdateResult::Succeeded {
                        release,
                        backup_path,
                    },
            } => {
                let count = installation.resources().map(|r| r.len()).unwrap_or_default();
                println!(
                    "{}",
                    format!(
                        "Updated {} to {} ({count} command files)",
                        installation.root().display(),
                        release.tag
                    )
                    .green()
                );
                println!("Previous version backed up to {}", backup_path.display());
                println!(
                    "{}",
                    "Run `claude-slash backups prune --keep 1` to remove older backups".dimmed()
                );
                Ok(())
            }
            RunOutcome::Completed {
                result: UpdateResult::Failed(failure),
                ..
            } => Err(failure.to_error_context().into()),
        }
    }
}

async fn check(ctx: &CommandContext) -> Result<()> {
    let spinner = ctx.spinner("Checking for updates...");
    let status = ctx.manager()?.check().await;
    spinner.finish_and_clear();
    let status = status?;

    let installed = status.installed.as_deref().unwrap_or("unknown");
    if status.update_available {
        println!(
            "{}",
            format!("Update available: {installed} -> {}", status.latest.tag).green()
        );
        println!("Run `claude-slash update` to install it");
    } else {
        println!("{}", format!("You are on the latest version ({installed})").green());
    }
    Ok(())
}
