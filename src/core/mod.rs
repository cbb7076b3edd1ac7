//! Core types for claude-slash
//!
//! This module holds the error system shared by the updater and the CLI:
//! - **Strongly-typed errors** ([`SlashError`]) that let the updater tell
//!   "report immediately" failures apart from "roll back first" failures
//! - **User-friendly contexts** ([`ErrorContext`]) with actionable suggestions
//! - [`user_friendly_error`] to turn any `anyhow::Error` into something fit
//!   for the terminal
//!
//! # Example
//!
//! ```rust,no_run
//! use claude_slash::core::{ErrorContext, SlashError};
//!
//! let ctx = ErrorContext::new(SlashError::Cancelled)
//!     .with_details("Interrupted before the swap started")
//!     .with_suggestion("Run `claude-slash update` again");
//! ctx.display();
//! ```

pub mod error;

pub use error::{ErrorContext, SlashError, user_friendly_error};
