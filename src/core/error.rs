//! Error handling for claude-slash
//!
//! This module provides the error types and user-friendly error reporting for the
//! command updater. The error system is designed around two core principles:
//! 1. **Strongly-typed errors** so the updater can decide between "report
//!    immediately" and "roll back, then report"
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`SlashError`] - Enumerated error types for all failure cases
//! - [`ErrorContext`] - Wrapper that adds user-friendly details and suggestions
//!
//! # Error Categories
//!
//! - **Not found**: [`SlashError::InstallationNotFound`], [`SlashError::ReleaseNotFound`]
//! - **Network**: [`SlashError::Network`]
//! - **Pre-mutation**: [`SlashError::Backup`], [`SlashError::ConcurrentUpdate`]
//! - **Recovered by rollback**: [`SlashError::Archive`], [`SlashError::Cancelled`],
//!   summarized for the user as [`SlashError::UpdateFailed`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use claude_slash::core::{SlashError, user_friendly_error};
//!
//! let error = SlashError::InstallationNotFound {
//!     searched: vec![".claude/commands".to_string()],
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display(); // Shows colored error with an install suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for claude-slash operations.
///
/// Variants carry owned strings rather than source errors so the type stays
/// `Clone` and can be embedded in update reports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlashError {
    /// No installation exists at any of the searched scopes.
    #[error("No claude-slash installation found")]
    InstallationNotFound {
        /// Paths that were checked, in order
        searched: Vec<String>,
    },

    /// The release index answered but did not yield a usable version tag.
    #[error("No release found: {reason}")]
    ReleaseNotFound {
        /// Why the response could not be turned into a release
        reason: String,
    },

    /// A network request failed (connectivity, timeout or non-2xx status).
    #[error("Network request to {url} failed: {reason}")]
    Network {
        /// The requested URL
        url: String,
        /// Transport error or HTTP status
        reason: String,
    },

    /// Creating or restoring a backup failed.
    #[error("Backup operation failed for {path}: {reason}")]
    Backup {
        /// Backup directory involved
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The release archive could not be downloaded, unpacked or validated.
    #[error("Release archive is unusable: {reason}")]
    Archive {
        /// Underlying failure
        reason: String,
    },

    /// Another process holds the update lock for this installation.
    #[error("Another update is already running (lock held at {lock_path})")]
    ConcurrentUpdate {
        /// Lock file path
        lock_path: String,
    },

    /// A release tag contains characters that are unsafe in paths or URLs.
    #[error("Invalid release tag '{tag}'")]
    InvalidReleaseTag {
        /// The rejected tag
        tag: String,
    },

    /// The operation was cancelled by the user.
    #[error("Update cancelled")]
    Cancelled,

    /// An update failed after the backup was taken and was rolled back.
    #[error("Update to {version} failed during {phase}: {reason}")]
    UpdateFailed {
        /// Release that was being installed
        version: String,
        /// Phase in which the failure happened
        phase: String,
        /// Underlying failure
        reason: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// A filesystem operation failed outside of the backup/archive paths.
    #[error("File system error during {operation} on {path}: {reason}")]
    FileSystem {
        /// What was being done
        operation: String,
        /// Affected path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Catch-all.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl SlashError {
    /// Shorthand for [`SlashError::Archive`].
    pub fn archive(reason: impl Into<String>) -> Self {
        Self::Archive {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SlashError::FileSystem`] from an I/O error.
    pub fn fs(operation: &str, path: &std::path::Path, err: impl fmt::Display) -> Self {
        Self::FileSystem {
            operation: operation.to_string(),
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether the error is one of the "not found" category.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::InstallationNotFound { .. } | Self::ReleaseNotFound { .. })
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Pairs a [`SlashError`] with optional details (displayed in yellow) and an
/// actionable suggestion (displayed in green).
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SlashError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: SlashError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`ErrorContext`] (passed through), [`SlashError`] anywhere in the
/// chain, and [`std::io::Error`]; everything else becomes [`SlashError::Other`]
/// carrying the full context chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(ctx) = error.downcast_ref::<ErrorContext>() {
        return ErrorContext {
            error: ctx.error.clone(),
            suggestion: ctx.suggestion.clone(),
            details: ctx.details.clone(),
        };
    }

    for cause in error.chain() {
        if let Some(slash_error) = cause.downcast_ref::<SlashError>() {
            return create_error_context(slash_error.clone());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(SlashError::Other {
                message: format!("{error:#}"),
            })
            .with_suggestion("Check the permissions of the commands directory and its parent");
        }
    }

    ErrorContext::new(SlashError::Other {
        message: format!("{error:#}"),
    })
}

fn create_error_context(error: SlashError) -> ErrorContext {
    match &error {
        SlashError::InstallationNotFound { searched } => {
            let details = format!("Searched: {}", searched.join(", "));
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Run the claude-slash installer first, then retry the update")
        }
        SlashError::ReleaseNotFound { .. } => ErrorContext::new(error)
            .with_details("The release index did not return a version tag")
            .with_suggestion("Check the `update.repository` setting or try again later"),
        SlashError::Network { .. } => ErrorContext::new(error)
            .with_details("Nothing was changed on disk")
            .with_suggestion("Check your internet connection and retry"),
        SlashError::Backup { .. } => ErrorContext::new(error)
            .with_details("The update was aborted before any files were modified")
            .with_suggestion("Free up disk space or fix permissions, then retry"),
        SlashError::ConcurrentUpdate { lock_path } => {
            let suggestion = format!(
                "Wait for the other update to finish; if none is running, remove {lock_path}"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        SlashError::InvalidReleaseTag { .. } => ErrorContext::new(error)
            .with_details("Release tags may only contain letters, digits, '.', '_', '+' and '-'"),
        SlashError::Config { .. } => ErrorContext::new(error)
            .with_suggestion("Fix the configuration file or pass --config with a valid path"),
        SlashError::UpdateFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Retry later; run with --verbose for more information"),
        _ => ErrorContext::new(error),
    }
}
