//! The update state machine.
//!
//! [`UpdateManager`] drives an update from discovery to either a fully
//! installed release or a restored backup:
//!
//! ```text
//! Locating -> FetchingRelease -> BackingUp -> Downloading -> Verifying -> Replacing -> Succeeded
//!                                                  \______________\____________\-> RollingBack -> Failed
//! ```
//!
//! Failures before the backup exists are returned as errors and leave the
//! installation untouched. Failures after it are recovered by restoring the
//! backup and reported as [`UpdateResult::Failed`].

use crate::config::GlobalConfig;
use crate::core::{ErrorContext, SlashError};
use crate::update::archive::{extract_stripped, locate_resources};
use crate::update::backup::{Backup, BackupManager};
use crate::update::installation::{Installation, InstallationLocator};
use crate::update::lock::UpdateLock;
use crate::update::release::{ReleaseClient, ReleaseDescriptor};
use crate::utils::fs::swap_dir_into_place;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// States of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Finding the installation
    Locating,
    /// Querying the release index
    FetchingRelease,
    /// Copying the installation to a backup
    BackingUp,
    /// Downloading and unpacking the release archive
    Downloading,
    /// Checking the unpacked archive for the resource directory
    Verifying,
    /// Swapping the new resources into place
    Replacing,
    /// Restoring the backup after a failure
    RollingBack,
    /// New release installed
    Succeeded,
    /// Update failed; see the rollback outcome
    Failed,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Locating => "locating installation",
            Self::FetchingRelease => "fetching release",
            Self::BackingUp => "backing up",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Replacing => "replacing",
            Self::RollingBack => "rolling back",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Observer for phase transitions, used by the CLI to drive a spinner.
pub trait UpdateProgress: Send + Sync {
    /// Called when the update enters `phase`.
    fn phase_changed(&self, phase: UpdatePhase, detail: &str) {
        let _ = (phase, detail);
    }
}

/// What happened to the installation after a failed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The backup was restored and verified.
    ///
    /// `backup_path` is set only if the consumed backup could not be
    /// deleted afterwards.
    Restored {
        /// Leftover backup, if any
        backup_path: Option<PathBuf>,
    },
    /// Restoring failed; the backup is kept.
    RestoreFailed {
        /// Why the restore failed
        error: SlashError,
        /// Backup to restore manually
        backup_path: PathBuf,
    },
}

impl RollbackOutcome {
    /// Whether the installation is back in its pre-update state.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Restored { .. })
    }

    /// Backup directory still on disk, if any.
    #[must_use]
    pub fn backup_path(&self) -> Option<&Path> {
        match self {
            Self::Restored {
                backup_path,
            } => backup_path.as_deref(),
            Self::RestoreFailed {
                backup_path,
                ..
            } => Some(backup_path),
        }
    }
}

/// A failed, rolled-back update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFailure {
    /// Release that was being installed
    pub release: ReleaseDescriptor,
    /// Phase that failed
    pub phase: UpdatePhase,
    /// Why it failed
    pub reason: SlashError,
    /// What the rollback did
    pub rollback: RollbackOutcome,
}

impl UpdateFailure {
    /// Summarize as a single error for command-level reporting.
    #[must_use]
    pub fn to_error(&self) -> SlashError {
        SlashError::UpdateFailed {
            version: self.release.tag.to_string(),
            phase: self.phase.to_string(),
            reason: self.reason.to_string(),
        }
    }

    /// The summary with the rollback outcome attached, as shown to the user.
    #[must_use]
    pub fn to_error_context(&self) -> ErrorContext {
        let rollback = match &self.rollback {
            RollbackOutcome::Restored {
                ..
            } => "previous files restored".to_string(),
            RollbackOutcome::RestoreFailed {
                error,
                ..
            } => format!("rollback failed: {error}"),
        };
        let details = match self.rollback.backup_path() {
            Some(path) => format!("{rollback}; backup kept at {}", path.display()),
            None => rollback,
        };

        ErrorContext::new(self.to_error())
            .with_details(details)
            .with_suggestion("Retry later; run with --verbose for more information")
    }
}

/// Result of [`UpdateManager::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// The release is installed; the pre-update backup is kept.
    Succeeded {
        /// Installed release
        release: ReleaseDescriptor,
        /// Backup of the previous installation
        backup_path: PathBuf,
    },
    /// The update failed after the backup was taken.
    Failed(UpdateFailure),
}

/// Result of [`UpdateManager::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The installed version already matches the latest release.
    AlreadyCurrent {
        /// Installation checked
        installation: Installation,
        /// Latest release
        release: ReleaseDescriptor,
    },
    /// An update was attempted.
    Completed {
        /// Installation updated
        installation: Installation,
        /// How it went
        result: UpdateResult,
    },
}

/// Installed and latest versions, from [`UpdateManager::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    /// Installation checked
    pub installation: Installation,
    /// Tag recorded by the last successful update
    pub installed: Option<String>,
    /// Latest published release
    pub latest: ReleaseDescriptor,
    /// Whether `latest` should be installed
    pub update_available: bool,
}

type PhaseError = (UpdatePhase, SlashError);

/// Locates the installation, fetches releases and applies updates.
///
/// # Examples
///
/// ```rust,no_run
/// use claude_slash::config::GlobalConfig;
/// use claude_slash::update::{RunOutcome, UpdateManager, UpdateResult};
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = GlobalConfig::load().await?;
/// let manager = UpdateManager::from_config(&config, Path::new("."))?;
///
/// match manager.run(false).await? {
///     RunOutcome::AlreadyCurrent { release, .. } => println!("Already at {}", release.tag),
///     RunOutcome::Completed { result: UpdateResult::Succeeded { release, .. }, .. } => {
///         println!("Updated to {}", release.tag);
///     }
///     RunOutcome::Completed { result: UpdateResult::Failed(failure), .. } => {
///         eprintln!("{}", failure.to_error());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpdateManager {
    locator: InstallationLocator,
    client: ReleaseClient,
    resource_path: String,
    cancel: Option<watch::Receiver<bool>>,
    progress: Option<Arc<dyn UpdateProgress>>,
}

impl UpdateManager {
    /// Create a manager from its parts.
    ///
    /// `resource_path` is the directory inside the unpacked archive (after
    /// the leading component is stripped) that replaces the installation.
    pub fn new(
        locator: InstallationLocator,
        client: ReleaseClient,
        resource_path: impl Into<String>,
    ) -> Self {
        Self {
            locator,
            client,
            resource_path: resource_path.into(),
            cancel: None,
            progress: None,
        }
    }

    /// Create a manager from configuration, resolving the local scope
    /// against `project_dir`.
    pub fn from_config(config: &GlobalConfig, project_dir: &Path) -> Result<Self, SlashError> {
        let locator = InstallationLocator::from_config(&config.install, project_dir)?;
        let client = ReleaseClient::from_config(&config.update)?;
        Ok(Self::new(locator, client, config.update.archive_resource_path.clone()))
    }

    /// Abort an in-flight update (with rollback) once `cancel` becomes `true`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Report phase transitions to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn UpdateProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn enter(&self, phase: UpdatePhase, detail: &str) {
        info!(%phase, "{detail}");
        if let Some(progress) = &self.progress {
            progress.phase_changed(phase, detail);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn check_cancelled(&self, phase: UpdatePhase) -> Result<(), PhaseError> {
        if self.is_cancelled() {
            return Err((phase, SlashError::Cancelled));
        }
        Ok(())
    }

    /// Resolves once cancellation is requested; never if it cannot be.
    async fn cancelled(&self) {
        let Some(mut rx) = self.cancel.clone() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Find the installation, local scope first.
    ///
    /// # Errors
    ///
    /// [`SlashError::InstallationNotFound`] if no scope has one.
    pub fn locate_installation(&self) -> Result<Installation, SlashError> {
        self.enter(UpdatePhase::Locating, "Looking for an installation");
        let installation = self.locator.locate()?;
        debug!(
            "Found {} installation at {}",
            installation.scope(),
            installation.root().display()
        );
        Ok(installation)
    }

    /// Query the release index for the latest release.
    ///
    /// # Errors
    ///
    /// [`SlashError::Network`] or [`SlashError::ReleaseNotFound`].
    pub async fn fetch_latest_release(&self) -> Result<ReleaseDescriptor, SlashError> {
        self.enter(UpdatePhase::FetchingRelease, "Checking for the latest release");
        let release = tokio::select! {
            release = self.client.fetch_latest() => release?,
            () = self.cancelled() => return Err(SlashError::Cancelled),
        };
        Ok(release)
    }

    /// Compare the installed version with the latest release.
    pub async fn check(&self) -> Result<UpdateStatus, SlashError> {
        let installation = self.locate_installation()?;
        let latest = self.fetch_latest_release().await?;
        let installed = installed_version(&installation)?;
        let update_available =
            installed.as_deref().is_none_or(|current| !latest.tag.matches_installed(current));

        Ok(UpdateStatus {
            installation,
            installed,
            latest,
            update_available,
        })
    }

    /// Locate, fetch and update unless already current.
    ///
    /// With `force`, the latest release is installed even when the version
    /// marker says it already is.
    pub async fn run(&self, force: bool) -> Result<RunOutcome, SlashError> {
        let installation = self.locate_installation()?;
        let release = self.fetch_latest_release().await?;

        let installed = installed_version(&installation)?;
        let is_current =
            installed.as_deref().is_some_and(|current| release.tag.matches_installed(current));
        if !force && is_current {
            info!("Installation is already at {}", release.tag);
            return Ok(RunOutcome::AlreadyCurrent {
                installation,
                release,
            });
        }

        let result = self.update(&installation, &release).await?;
        Ok(RunOutcome::Completed {
            installation,
            result,
        })
    }

    /// Replace `installation` with `release`, rolling back on failure.
    ///
    /// # Errors
    ///
    /// Only failures that happen before anything is modified:
    /// [`SlashError::ConcurrentUpdate`] if another update holds the lock and
    /// [`SlashError::Backup`] if the backup cannot be made. Everything later
    /// is reported through [`UpdateResult::Failed`].
    pub async fn update(
        &self,
        installation: &Installation,
        release: &ReleaseDescriptor,
    ) -> Result<UpdateResult, SlashError> {
        let _lock = UpdateLock::try_acquire(installation).await?;

        self.enter(UpdatePhase::BackingUp, &format!("Backing up {}", installation.root().display()));
        let backups = BackupManager::new(installation.clone());
        let backup = backups.create().await?;
        debug!("Backup of the current installation at {}", backup.path.display());

        match self.apply(installation, release).await {
            Ok(()) => {
                if let Err(e) = installation.record_version(release.tag.as_str()) {
                    warn!("Installed {} but could not record the version: {e:#}", release.tag);
                }
                self.enter(UpdatePhase::Succeeded, &format!("Installed {}", release.tag));
                Ok(UpdateResult::Succeeded {
                    release: release.clone(),
                    backup_path: backup.path,
                })
            }
            Err((phase, reason)) => {
                error!(%phase, "Update to {} failed: {reason}", release.tag);
                let rollback = self.roll_back(&backups, backup).await;
                self.enter(UpdatePhase::Failed, &format!("Update to {} failed", release.tag));
                Ok(UpdateResult::Failed(UpdateFailure {
                    release: release.clone(),
                    phase,
                    reason,
                    rollback,
                }))
            }
        }
    }

    /// Steps 2-5 of an update. The staging directory is removed on return.
    async fn apply(
        &self,
        installation: &Installation,
        release: &ReleaseDescriptor,
    ) -> Result<(), PhaseError> {
        use UpdatePhase::{Downloading, Replacing, Verifying};

        self.check_cancelled(Downloading)?;
        self.enter(Downloading, &format!("Downloading {}", release.tag));
        let staging = create_staging(installation).map_err(|e| (Downloading, e))?;
        let archive_path = staging.path().join("release.zip");
        let extracted = staging.path().join("extracted");

        tokio::select! {
            downloaded = self.client.download_archive(release, &archive_path) => {
                downloaded.map_err(|e| (Downloading, e))?;
            }
            () = self.cancelled() => return Err((Downloading, SlashError::Cancelled)),
        }
        self.check_cancelled(Downloading)?;

        let (archive, dest) = (archive_path.clone(), extracted.clone());
        tokio::task::spawn_blocking(move || extract_stripped(&archive, &dest))
            .await
            .map_err(|e| (Downloading, SlashError::archive(format!("extraction task failed: {e}"))))?
            .map_err(|e| (Downloading, e))?;

        self.check_cancelled(Verifying)?;
        self.enter(Verifying, "Verifying release contents");
        let resources =
            locate_resources(&extracted, &self.resource_path).map_err(|e| (Verifying, e))?;

        self.check_cancelled(Replacing)?;
        self.enter(Replacing, &format!("Installing {}", release.tag));
        let target = installation.root().to_path_buf();
        let aside = staging.path().join("previous");
        tokio::task::spawn_blocking(move || swap_dir_into_place(&resources, &target, &aside))
            .await
            .map_err(|e| (Replacing, SlashError::Other { message: format!("swap task failed: {e}") }))?
            .map_err(|e| {
                (Replacing, SlashError::fs("replace", installation.root(), format!("{e:#}")))
            })?;

        discard_staging(staging).await;
        Ok(())
    }

    async fn roll_back(&self, backups: &BackupManager, backup: Backup) -> RollbackOutcome {
        self.enter(
            UpdatePhase::RollingBack,
            &format!("Restoring from backup {}", backup.path.display()),
        );

        match backups.restore(&backup).await {
            Ok(()) => match backups.remove(&backup).await {
                Ok(()) => RollbackOutcome::Restored {
                    backup_path: None,
                },
                Err(e) => {
                    warn!("Restored installation but could not remove the backup: {e}");
                    RollbackOutcome::Restored {
                        backup_path: Some(backup.path),
                    }
                }
            },
            Err(e) => {
                error!("Rollback failed; backup kept at {}: {e}", backup.path.display());
                RollbackOutcome::RestoreFailed {
                    error: e,
                    backup_path: backup.path,
                }
            }
        }
    }

    /// Restore a backup by hand: `backup` if given, else the newest one.
    ///
    /// `backup` must be one of this installation's listed backups. Runs
    /// under the update lock and clears the version marker. The backup
    /// itself is kept.
    ///
    /// # Errors
    ///
    /// [`SlashError::Backup`] if there is no such backup or the restore fails,
    /// [`SlashError::ConcurrentUpdate`] if an update is running.
    pub async fn restore_backup(
        &self,
        installation: &Installation,
        backup: Option<&Path>,
    ) -> Result<Backup, SlashError> {
        let _lock = UpdateLock::try_acquire(installation).await?;
        let backups = BackupManager::new(installation.clone());

        let backup = match backup {
            Some(path) => {
                let not_a_backup = || SlashError::Backup {
                    path: path.display().to_string(),
                    reason: format!("not a backup of {}", installation.root().display()),
                };
                let wanted = path.canonicalize().map_err(|_| not_a_backup())?;
                backups
                    .list()?
                    .into_iter()
                    .find(|b| b.path.canonicalize().is_ok_and(|p| p == wanted))
                    .ok_or_else(not_a_backup)?
            }
            None => backups.latest()?.ok_or_else(|| SlashError::Backup {
                path: installation.parent().display().to_string(),
                reason: format!("no backups of '{}' found", installation.name()),
            })?,
        };

        self.enter(
            UpdatePhase::RollingBack,
            &format!("Restoring from backup {}", backup.path.display()),
        );
        backups.restore(&backup).await?;
        if let Err(e) = installation.clear_version() {
            warn!("Restored backup but could not clear the version marker: {e:#}");
        }
        Ok(backup)
    }
}

fn installed_version(installation: &Installation) -> Result<Option<String>, SlashError> {
    installation.installed_version().map_err(|e| SlashError::Other {
        message: format!("{e:#}"),
    })
}

fn create_staging(installation: &Installation) -> Result<TempDir, SlashError> {
    tempfile::Builder::new()
        .prefix(&installation.staging_prefix())
        .tempdir_in(installation.parent())
        .map_err(|e| SlashError::fs("create staging directory", installation.parent(), e))
}

async fn discard_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    match tokio::task::spawn_blocking(move || staging.close()).await {
        Ok(Ok(())) => debug!("Removed staging directory {}", path.display()),
        Ok(Err(e)) => warn!("Could not remove staging directory {}: {e}", path.display()),
        Err(e) => warn!("Staging cleanup task failed: {e}"),
    }
}
