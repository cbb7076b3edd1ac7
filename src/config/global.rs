//! Global configuration for claude-slash.
//!
//! The configuration lives at `~/.claude-slash/config.toml` (or
//! `%LOCALAPPDATA%\claude-slash\config.toml` on Windows) and can be
//! relocated with `--config` or the `CLAUDE_SLASH_CONFIG` environment
//! variable. A missing file is not an error: defaults are used.
//!
//! # Example
//!
//! ```toml
//! [update]
//! repository = "my-org/claude-slash"
//! network_timeout_secs = 60
//!
//! [install]
//! global_dir = "~/.claude/commands"
//! ```

use crate::constants::{
    CONFIG_ENV_VAR, DEFAULT_ARCHIVE_RESOURCE_PATH, DEFAULT_GLOBAL_COMMANDS_DIR,
    DEFAULT_LOCAL_COMMANDS_DIR, DEFAULT_NETWORK_TIMEOUT_SECS, DEFAULT_REPOSITORY, TAG_PLACEHOLDER,
};
use crate::core::SlashError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Top-level configuration file contents.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Where releases come from and how they are fetched.
    #[serde(default)]
    pub update: UpdateConfig,

    /// Where installations are looked up.
    #[serde(default)]
    pub install: InstallConfig,
}

/// Release source settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateConfig {
    /// GitHub repository publishing releases, as `owner/repo`.
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Full URL of the "latest release" endpoint. Derived from
    /// `repository` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_index_url: Option<String>,

    /// Archive URL with a `{tag}` placeholder. Derived from `repository`
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_url_template: Option<String>,

    /// Directory inside the archive (after stripping its top-level folder)
    /// holding the command files.
    #[serde(default = "default_archive_resource_path")]
    pub archive_resource_path: String,

    /// Timeout for each network request, in seconds.
    #[serde(default = "default_network_timeout_secs")]
    pub network_timeout_secs: u64,
}

/// Installation lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallConfig {
    /// Project-relative commands directory, checked first.
    #[serde(default = "default_local_dir")]
    pub local_dir: String,

    /// Shared commands directory; `~` is expanded.
    #[serde(default = "default_global_dir")]
    pub global_dir: String,
}

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

fn default_archive_resource_path() -> String {
    DEFAULT_ARCHIVE_RESOURCE_PATH.to_string()
}

const fn default_network_timeout_secs() -> u64 {
    DEFAULT_NETWORK_TIMEOUT_SECS
}

fn default_local_dir() -> String {
    DEFAULT_LOCAL_COMMANDS_DIR.to_string()
}

fn default_global_dir() -> String {
    DEFAULT_GLOBAL_COMMANDS_DIR.to_string()
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            release_index_url: None,
            archive_url_template: None,
            archive_resource_path: default_archive_resource_path(),
            network_timeout_secs: default_network_timeout_secs(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            local_dir: default_local_dir(),
            global_dir: default_global_dir(),
        }
    }
}

impl UpdateConfig {
    /// The release index endpoint, explicit or derived from `repository`.
    #[must_use]
    pub fn release_index_url(&self) -> String {
        self.release_index_url.clone().unwrap_or_else(|| {
            format!("https://api.github.com/repos/{}/releases/latest", self.repository)
        })
    }

    /// The archive URL template, explicit or derived from `repository`.
    #[must_use]
    pub fn archive_url_template(&self) -> String {
        self.archive_url_template.clone().unwrap_or_else(|| {
            format!(
                "https://github.com/{}/archive/refs/tags/{TAG_PLACEHOLDER}.zip",
                self.repository
            )
        })
    }

    /// Network timeout as a [`Duration`].
    #[must_use]
    pub const fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    /// Check that the settings can produce usable requests.
    pub fn validate(&self) -> Result<(), SlashError> {
        let (owner, repo) = self.repository.split_once('/').unwrap_or(("", ""));
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(SlashError::Config {
                message: format!("update.repository must be 'owner/repo', got '{}'", self.repository),
            });
        }
        if !self.archive_url_template().contains(TAG_PLACEHOLDER) {
            return Err(SlashError::Config {
                message: format!("update.archive_url_template must contain {TAG_PLACEHOLDER}"),
            });
        }
        if self.network_timeout_secs == 0 {
            return Err(SlashError::Config {
                message: "update.network_timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl InstallConfig {
    /// Expanded global commands directory.
    pub fn global_dir(&self) -> Result<PathBuf, SlashError> {
        shellexpand::full(&self.global_dir)
            .map(|expanded| PathBuf::from(expanded.as_ref()))
            .map_err(|e| SlashError::Config {
                message: format!("cannot expand install.global_dir '{}': {e}", self.global_dir),
            })
    }
}

impl GlobalConfig {
    /// Load from the default location, or return defaults if the file is missing.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` if given, else from the default location.
    ///
    /// A missing default file yields defaults. A missing explicit `path`, or
    /// an unreadable or malformed file, is an error.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(SlashError::Config {
                    message: format!("config file {} does not exist", path.display()),
                }
                .into());
            }
            return Self::load_from(&path).await;
        }

        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate the configuration at `path`.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| SlashError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        config.update.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Default configuration path, honoring `CLAUDE_SLASH_CONFIG`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("claude-slash")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".claude-slash")
        };

        Ok(config_dir.join("config.toml"))
    }
}
