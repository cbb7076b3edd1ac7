//! Locating an installed command set.
//!
//! An [`Installation`] is discovered once by [`InstallationLocator`] and then
//! passed explicitly to every update operation. The locator checks the
//! project-local scope before the shared global scope.

use crate::config::InstallConfig;
use crate::constants::{LOCK_FILE_SUFFIX, STAGING_INFIX, VERSION_MARKER_SUFFIX};
use crate::core::SlashError;
use crate::utils::fs::{atomic_write, list_file_names};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where an installation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallScope {
    /// Inside the current project (`<project>/.claude/commands`).
    Local,
    /// Shared by all projects (`~/.claude/commands`).
    Global,
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// An on-disk directory holding the active command resources.
///
/// Everything the updater writes besides the installation itself (backups,
/// staging, the lock file and the version marker) is placed next to it in
/// the same parent directory, so renames between them never cross a
/// filesystem boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    root: PathBuf,
    scope: InstallScope,
}

impl Installation {
    /// Wrap an existing commands directory.
    ///
    /// The path must name a directory with a parent (the filesystem root is
    /// rejected) so sibling paths can be derived.
    pub fn new(root: PathBuf, scope: InstallScope) -> Result<Self, SlashError> {
        if root.file_name().is_none() || root.parent().is_none() {
            return Err(SlashError::Config {
                message: format!("'{}' cannot be used as a commands directory", root.display()),
            });
        }
        Ok(Self {
            root,
            scope,
        })
    }

    /// The commands directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Which scope the installation was found in.
    #[must_use]
    pub const fn scope(&self) -> InstallScope {
        self.scope
    }

    /// Final component of the commands directory (usually `commands`).
    #[must_use]
    pub fn name(&self) -> String {
        self.root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    /// Directory containing the installation and its siblings.
    #[must_use]
    pub fn parent(&self) -> &Path {
        self.root.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Names of the resource files currently installed.
    pub fn resources(&self) -> Result<BTreeSet<String>> {
        list_file_names(&self.root)
    }

    /// Path of the advisory lock file for this installation.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.parent().join(format!(".{}{LOCK_FILE_SUFFIX}", self.name()))
    }

    /// Prefix used for temporary staging directories of this installation.
    #[must_use]
    pub fn staging_prefix(&self) -> String {
        format!(".{}{STAGING_INFIX}", self.name())
    }

    /// Path of the file recording the installed release tag.
    #[must_use]
    pub fn version_marker_path(&self) -> PathBuf {
        self.parent().join(format!(".{}{VERSION_MARKER_SUFFIX}", self.name()))
    }

    /// Installed release tag, if a successful update recorded one.
    pub fn installed_version(&self) -> Result<Option<String>> {
        let path = self.version_marker_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let tag = content.trim();
                Ok((!tag.is_empty()).then(|| tag.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read version marker {}", path.display())),
        }
    }

    /// Record `tag` as the installed release.
    pub fn record_version(&self, tag: &str) -> Result<()> {
        atomic_write(&self.version_marker_path(), format!("{tag}\n").as_bytes())
    }

    /// Forget the installed release (used after a manual rollback).
    pub fn clear_version(&self) -> Result<()> {
        let path = self.version_marker_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove version marker {}", path.display())),
        }
    }
}

/// Resolves the active installation from the configured scopes.
#[derive(Debug, Clone)]
pub struct InstallationLocator {
    local_dir: PathBuf,
    global_dir: Option<PathBuf>,
}

impl InstallationLocator {
    /// Locator checking `local_dir` then `global_dir`.
    #[must_use]
    pub const fn new(local_dir: PathBuf, global_dir: Option<PathBuf>) -> Self {
        Self {
            local_dir,
            global_dir,
        }
    }

    /// Build from configuration, resolving the local directory against
    /// `project_dir`.
    pub fn from_config(config: &InstallConfig, project_dir: &Path) -> Result<Self, SlashError> {
        let local = PathBuf::from(&config.local_dir);
        let local_dir = if local.is_absolute() {
            local
        } else {
            project_dir.join(local)
        };
        Ok(Self::new(local_dir, Some(config.global_dir()?)))
    }

    /// Find the installation, local scope first.
    ///
    /// # Errors
    ///
    /// [`SlashError::InstallationNotFound`] listing every searched path when
    /// no scope has a commands directory.
    pub fn locate(&self) -> Result<Installation, SlashError> {
        let mut searched = Vec::new();

        let candidates = std::iter::once((&self.local_dir, InstallScope::Local))
            .chain(self.global_dir.iter().map(|dir| (dir, InstallScope::Global)));

        for (dir, scope) in candidates {
            debug!("Looking for {scope} installation at {}", dir.display());
            if dir.is_dir() {
                return Installation::new(dir.clone(), scope);
            }
            searched.push(dir.display().to_string());
        }

        Err(SlashError::InstallationNotFound {
            searched,
        })
    }
}
