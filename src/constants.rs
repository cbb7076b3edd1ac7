//! Global constants used throughout the claude-slash codebase.
//!
//! Timeouts, default locations and naming conventions that are shared
//! between the updater, the backup manager and the CLI live here so the
//! on-disk layout is defined in exactly one place.

use std::time::Duration;

/// Default timeout for each request of an update, in seconds.
///
/// Applies to both the release index query and the archive download.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 30;

/// Connect timeout for HTTP requests (10 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Repository that publishes command releases, as `owner/repo`.
pub const DEFAULT_REPOSITORY: &str = "claude-slash/claude-slash";

/// Directory (relative to the project root) holding project-local commands.
pub const DEFAULT_LOCAL_COMMANDS_DIR: &str = ".claude/commands";

/// Directory (relative to the home directory) holding shared commands.
pub const DEFAULT_GLOBAL_COMMANDS_DIR: &str = "~/.claude/commands";

/// Path inside a release archive, after stripping the leading component,
/// that contains the command resources.
pub const DEFAULT_ARCHIVE_RESOURCE_PATH: &str = ".claude/commands";

/// Placeholder substituted with the release tag in archive URL templates.
pub const TAG_PLACEHOLDER: &str = "{tag}";

/// Infix between the installation name and the timestamp of a backup.
pub const BACKUP_INFIX: &str = ".backup.";

/// `chrono` format of the backup timestamp. Fixed width so lexical order
/// matches chronological order.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";

/// Suffix of the file recording the installed release tag.
pub const VERSION_MARKER_SUFFIX: &str = ".version";

/// Suffix of the advisory lock file guarding an installation.
pub const LOCK_FILE_SUFFIX: &str = ".update.lock";

/// Infix of temporary staging directories created next to an installation.
pub const STAGING_INFIX: &str = ".staging-";

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV_VAR: &str = "CLAUDE_SLASH_CONFIG";

/// Environment variable disabling progress spinners.
pub const NO_PROGRESS_ENV_VAR: &str = "CLAUDE_SLASH_NO_PROGRESS";

/// User agent sent with every HTTP request. GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!("claude-slash/", env!("CARGO_PKG_VERSION"));
