use crate::constants::{BACKUP_INFIX, BACKUP_TIMESTAMP_FORMAT};
use crate::core::SlashError;
use crate::update::installation::Installation;
use crate::utils::fs::{copy_dir, dir_digest, remove_dir_all, swap_dir_into_place};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A timestamped copy of an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Backup directory
    pub path: PathBuf,
    /// Installation the backup was taken from
    pub source: PathBuf,
    /// When the backup was created, parsed from its name
    pub created_at: Option<NaiveDateTime>,
}

/// Creates, restores, lists and prunes backups of one installation.
///
/// Backups are sibling directories named
/// `<name>.backup.<YYYYMMDD-HHMMSS-ffffff>` next to the installation. They
/// are only ever deleted by [`prune`](Self::prune), by
/// [`remove`](Self::remove), or after a verified rollback consumed them.
///
/// # Examples
///
/// ```rust,no_run
/// use claude_slash::update::{BackupManager, InstallScope, Installation};
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let installation =
///     Installation::new(PathBuf::from("/home/me/.claude/commands"), InstallScope::Global)?;
/// let manager = BackupManager::new(installation);
///
/// let backup = manager.create().await?;
/// println!("Backup at {}", backup.path.display());
///
/// for backup in manager.list()? {
///     println!("{}", backup.path.display());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupManager {
    installation: Installation,
}

impl BackupManager {
    /// Manager for `installation`'s backups.
    #[must_use]
    pub const fn new(installation: Installation) -> Self {
        Self {
            installation,
        }
    }

    fn name_prefix(&self) -> String {
        format!("{}{BACKUP_INFIX}", self.installation.name())
    }

    /// Pick a backup path that does not exist yet.
    ///
    /// The timestamp has microsecond resolution; if it still collides a
    /// `-N` suffix is appended.
    fn next_backup_path(&self, now: DateTime<Local>) -> PathBuf {
        let base = format!("{}{}", self.name_prefix(), now.format(BACKUP_TIMESTAMP_FORMAT));
        let parent = self.installation.parent();

        let mut candidate = parent.join(&base);
        let mut counter = 1;
        while candidate.exists() || partial_path(&candidate).exists() {
            candidate = parent.join(format!("{base}-{counter}"));
            counter += 1;
        }
        candidate
    }

    /// Copy the installation into a new timestamped backup directory.
    ///
    /// The copy is made under a `.partial` name and renamed when complete,
    /// so a listed backup is always whole.
    ///
    /// # Errors
    ///
    /// [`SlashError::Backup`] if the installation is missing or the copy
    /// fails. Any partial copy is removed.
    pub async fn create(&self) -> Result<Backup, SlashError> {
        let source = self.installation.root().to_path_buf();
        let backup_path = self.next_backup_path(Local::now());

        if !source.is_dir() {
            return Err(SlashError::Backup {
                path: backup_path.display().to_string(),
                reason: format!("installation {} does not exist", source.display()),
            });
        }

        info!("Creating backup at {}", backup_path.display());
        let partial = partial_path(&backup_path);
        let final_path = backup_path.clone();
        let src = source.clone();

        let result = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let copied = copy_dir(&src, &partial).and_then(|()| {
                std::fs::rename(&partial, &final_path).map_err(anyhow::Error::from)
            });
            if copied.is_err() {
                let _ = remove_dir_all(&partial);
            }
            copied
        })
        .await
        .map_err(|e| SlashError::Backup {
            path: backup_path.display().to_string(),
            reason: format!("backup task failed: {e}"),
        })?;

        result.map_err(|e| SlashError::Backup {
            path: backup_path.display().to_string(),
            reason: format!("{e:#}"),
        })?;

        debug!("Backup created successfully");
        Ok(Backup {
            created_at: parse_timestamp(&self.name_prefix(), &backup_path),
            path: backup_path,
            source,
        })
    }

    /// Replace the installation's contents with `backup`'s.
    ///
    /// The backup is copied into a staging directory next to the
    /// installation and its digest checked before anything is swapped. After
    /// the swap the installation's digest is checked again; on a mismatch
    /// the previous tree is put back. The backup itself is left intact.
    ///
    /// # Errors
    ///
    /// [`SlashError::Backup`] if the backup is missing or overlaps the
    /// installation, the copy or swap fails, or the restored content does
    /// not match.
    pub async fn restore(&self, backup: &Backup) -> Result<(), SlashError> {
        let backup_error = |reason: String| SlashError::Backup {
            path: backup.path.display().to_string(),
            reason,
        };

        if !backup.path.is_dir() {
            return Err(backup_error("no backup found at this path".to_string()));
        }
        if overlaps(&backup.path, self.installation.root()) {
            return Err(backup_error(format!(
                "backup overlaps the installation at {}",
                self.installation.root().display()
            )));
        }

        warn!("Restoring {} from backup {}", self.installation.root().display(), backup.path.display());

        let backup_path = backup.path.clone();
        let target = self.installation.root().to_path_buf();
        let parent = self.installation.parent().to_path_buf();
        let prefix = self.installation.staging_prefix();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let expected = dir_digest(&backup_path)?;
            let staging = tempfile::Builder::new().prefix(&prefix).tempdir_in(&parent)?;
            let restored = staging.path().join("restored");
            let aside = staging.path().join("previous");

            copy_dir(&backup_path, &restored)?;
            let staged = dir_digest(&restored)?;
            if staged != expected {
                anyhow::bail!("copy of the backup does not match it ({staged} != {expected})");
            }

            let had_target = swap_dir_into_place(&restored, &target, &aside)?;

            let verified = match dir_digest(&target) {
                Ok(actual) if actual == expected => Ok(()),
                Ok(actual) => Err(format!("{actual} != {expected}")),
                Err(e) => Err(format!("{e:#}")),
            };
            if let Err(mismatch) = verified {
                let rejected = staging.path().join("rejected");
                if had_target && let Err(e) = swap_dir_into_place(&aside, &target, &rejected) {
                    // Never let the staging cleanup take the previous tree with it.
                    let kept = parent.join(format!(
                        "{}{PREVIOUS_INFIX}{}",
                        target.file_name().unwrap_or_default().to_string_lossy(),
                        Local::now().format(BACKUP_TIMESTAMP_FORMAT)
                    ));
                    std::fs::rename(&aside, &kept)?;
                    anyhow::bail!(
                        "restored content does not match the backup ({mismatch}) and the previous \
                         tree could not be put back ({e:#}); it is at {}",
                        kept.display()
                    );
                }
                anyhow::bail!("restored content does not match the backup ({mismatch})");
            }
            Ok(())
        })
        .await
        .map_err(|e| backup_error(format!("restore task failed: {e}")))?
        .map_err(|e| backup_error(format!("{e:#}")))?;

        info!("Successfully restored from backup");
        Ok(())
    }

    /// Delete one backup directory.
    pub async fn remove(&self, backup: &Backup) -> Result<(), SlashError> {
        debug!("Removing backup at {}", backup.path.display());
        tokio::fs::remove_dir_all(&backup.path).await.map_err(|e| SlashError::Backup {
            path: backup.path.display().to_string(),
            reason: format!("failed to remove backup: {e}"),
        })
    }

    /// All backups of this installation, newest first.
    pub fn list(&self) -> Result<Vec<Backup>, SlashError> {
        let parent = self.installation.parent();
        let prefix = self.name_prefix();
        let entries =
            std::fs::read_dir(parent).map_err(|e| SlashError::fs("list backups", parent, e))?;

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SlashError::fs("list backups", parent, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let path = entry.path();
            backups.push(Backup {
                created_at: parse_timestamp(&prefix, &path),
                path,
                source: self.installation.root().to_path_buf(),
            });
        }

        backups.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| {
                collision_counter(&prefix, &b.path).cmp(&collision_counter(&prefix, &a.path))
            })
        });
        Ok(backups)
    }

    /// Most recent backup, if any.
    pub fn latest(&self) -> Result<Option<Backup>, SlashError> {
        Ok(self.list()?.into_iter().next())
    }

    /// Delete all but the `keep` newest backups. Returns the removed paths.
    pub async fn prune(&self, keep: usize) -> Result<Vec<PathBuf>, SlashError> {
        let mut removed = Vec::new();
        for backup in self.list()?.into_iter().skip(keep) {
            self.remove(&backup).await?;
            removed.push(backup.path);
        }
        if !removed.is_empty() {
            info!("Pruned {} backup(s), kept {keep}", removed.len());
        }
        Ok(removed)
    }
}

const PARTIAL_SUFFIX: &str = ".partial";
const PREVIOUS_INFIX: &str = ".previous.";

/// Whether one path contains the other, after resolving links.
fn overlaps(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a.starts_with(&b) || b.starts_with(&a),
        _ => false,
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

fn backup_suffix<'a>(prefix: &str, path: &'a Path) -> Option<&'a str> {
    path.file_name()?.to_str()?.strip_prefix(prefix)
}

fn parse_timestamp(prefix: &str, path: &Path) -> Option<NaiveDateTime> {
    let suffix = backup_suffix(prefix, path)?;
    // Timestamp is fixed width; anything after it is a collision counter.
    let stamp = suffix.get(..22)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()
}

/// Collision counter after the timestamp, `0` when absent.
fn collision_counter(prefix: &str, path: &Path) -> u32 {
    backup_suffix(prefix, path)
        .and_then(|suffix| suffix.get(22..))
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|counter| counter.parse().ok())
        .unwrap_or(0)
}
