//! Test utilities for claude-slash
//!
//! Helpers shared by unit tests: one-time logging setup, a builder for
//! release archives, and an installation fixture.
//!
//! # Example
//!
//! ```rust,no_run
//! use claude_slash::test_utils::ArchiveBuilder;
//!
//! let bytes = ArchiveBuilder::new("claude-slash-2.0.0")
//!     .file(".claude/commands/save.md", "# save")
//!     .to_bytes()
//!     .unwrap();
//! assert!(!bytes.is_empty());
//! ```

use crate::update::{InstallScope, Installation};
use anyhow::Result;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` if given, else `RUST_LOG`; does nothing when neither is set.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Builds zip archives shaped like release archives.
pub struct ArchiveBuilder {
    prefix: Option<String>,
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    /// Archive whose entries all live under the `prefix` top-level folder.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: Some(prefix.trim_end_matches('/').to_string()),
            entries: Vec::new(),
        }
    }

    /// Archive with entry names taken verbatim.
    pub fn raw() -> Self {
        Self {
            prefix: None,
            entries: Vec::new(),
        }
    }

    /// Add a file below the prefix.
    pub fn file(mut self, path: &str, content: &str) -> Self {
        let name = match &self.prefix {
            Some(prefix) => format!("{prefix}/{path}"),
            None => path.to_string(),
        };
        self.entries.push((name, content.as_bytes().to_vec()));
        self
    }

    /// Add a file with an exact entry name.
    pub fn raw_file(mut self, name: &str, content: &str) -> Self {
        self.entries.push((name.to_string(), content.as_bytes().to_vec()));
        self
    }

    /// Serialize the archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        if let Some(prefix) = &self.prefix {
            writer.add_directory(format!("{prefix}/"), options)?;
        }
        for (name, content) in &self.entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content)?;
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Serialize the archive to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

/// Create `<base>/.claude/commands` holding `files` and wrap it as a local
/// installation.
pub fn installation_with(base: &Path, files: &[(&str, &str)]) -> Result<Installation> {
    init_test_logging(None);
    let root = base.join(".claude").join("commands");
    std::fs::create_dir_all(&root)?;
    for (name, content) in files {
        std::fs::write(root.join(name), content)?;
    }
    Ok(Installation::new(root, InstallScope::Local)?)
}
