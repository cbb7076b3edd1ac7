//! Terminal progress indicators.
//!
//! Thin wrapper over [`indicatif`] that hides itself when progress output is
//! disabled (`--no-progress` or `CLAUDE_SLASH_NO_PROGRESS`), so scripts get
//! clean output while interactive use gets a spinner.

use crate::constants::NO_PROGRESS_ENV_VAR;
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV_VAR).is_ok()
}

/// An indeterminate spinner.
#[derive(Clone)]
pub struct Spinner {
    inner: IndicatifBar,
}

impl Spinner {
    /// Start a spinner showing `msg`.
    ///
    /// The spinner is hidden when `enabled` is false or progress output is
    /// disabled through the environment.
    pub fn new(msg: impl Into<String>, enabled: bool) -> Self {
        let bar = if !enabled || is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_message(msg.into());
        Self {
            inner: bar,
        }
    }

    /// Replace the spinner message.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Print a line above the spinner without garbling it.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.inner.is_hidden() {
            println!("{}", line.as_ref());
        } else {
            self.inner.println(line.as_ref());
        }
    }

    /// Remove the spinner from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
