//! Common test utilities and fixtures for claude-slash integration tests
//!
//! Each test gets an isolated [`TestEnv`] with its own fake home and project
//! directory, and a `wiremock` server standing in for the release host.

// Not every helper is used by every test file
#![allow(dead_code)]

use anyhow::Result;
use claude_slash::update::{
    InstallScope, Installation, InstallationLocator, ReleaseClient, UpdateManager,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Path of the release index on the mock server.
pub const INDEX_PATH: &str = "/repos/acme/commands/releases/latest";

/// Isolated home and project directories.
pub struct TestEnv {
    _temp: TempDir,
    pub home: PathBuf,
    pub project: PathBuf,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let home = temp.path().join("home");
        let project = temp.path().join("project");
        fs::create_dir_all(&home)?;
        fs::create_dir_all(&project)?;
        Ok(Self {
            _temp: temp,
            home,
            project,
        })
    }

    pub fn local_dir(&self) -> PathBuf {
        self.project.join(".claude").join("commands")
    }

    pub fn global_dir(&self) -> PathBuf {
        self.home.join(".claude").join("commands")
    }

    /// Create a project-local installation holding `files`.
    pub fn install_local(&self, files: &[(&str, &str)]) -> Result<Installation> {
        write_files(&self.local_dir(), files)?;
        Ok(Installation::new(self.local_dir(), InstallScope::Local)?)
    }

    /// Create a global installation holding `files`.
    pub fn install_global(&self, files: &[(&str, &str)]) -> Result<Installation> {
        write_files(&self.global_dir(), files)?;
        Ok(Installation::new(self.global_dir(), InstallScope::Global)?)
    }

    /// Update manager pointed at `server`.
    pub fn manager(&self, server: &MockServer) -> Result<UpdateManager> {
        let client = ReleaseClient::new(
            &format!("{}{INDEX_PATH}", server.uri()),
            format!("{}/archive/{{tag}}.zip", server.uri()),
            Duration::from_secs(5),
        )?;
        let locator = InstallationLocator::new(self.local_dir(), Some(self.global_dir()));
        Ok(UpdateManager::new(locator, client, ".claude/commands"))
    }

    /// Configuration file pointing the CLI at `server` and this environment.
    pub fn write_config(&self, server: &MockServer) -> Result<PathBuf> {
        let config_path = self.home.join("config.toml");
        let content = format!(
            r#"[update]
release_index_url = "{uri}{INDEX_PATH}"
archive_url_template = "{uri}/archive/{{tag}}.zip"
network_timeout_secs = 5

[install]
global_dir = '{global}'
"#,
            uri = server.uri(),
            global = self.global_dir().display(),
        );
        fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// All sibling directory names next to the local installation.
    pub fn local_siblings(&self) -> Result<Vec<String>> {
        let mut names: Vec<_> = fs::read_dir(self.project.join(".claude"))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

fn write_files(dir: &Path, files: &[(&str, &str)]) -> Result<()> {
    fs::create_dir_all(dir)?;
    for (name, content) in files {
        fs::write(dir.join(name), content)?;
    }
    Ok(())
}

/// Zip laid out like a GitHub tag archive: one top-level folder holding
/// `.claude/commands/<file>` plus a README.
pub fn release_archive(tag: &str, files: &[(&str, &str)]) -> Result<Vec<u8>> {
    let top = format!("claude-slash-{}", tag.trim_start_matches('v'));
    let entries: Vec<(String, String)> = files
        .iter()
        .map(|(name, content)| (format!(".claude/commands/{name}"), (*content).to_string()))
        .chain(std::iter::once(("README.md".to_string(), "# claude-slash".to_string())))
        .collect();
    zip_with_prefix(&top, &entries)
}

/// Zip with arbitrary entries below a top-level folder.
pub fn zip_with_prefix(top: &str, entries: &[(String, String)]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.add_directory(format!("{top}/"), options)?;
    for (name, content) in entries {
        writer.start_file(format!("{top}/{name}"), options)?;
        writer.write_all(content.as_bytes())?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Serve a release index answering `tag`.
pub async fn mount_index(server: &MockServer, tag: &str) {
    Mock::given(method("GET"))
        .and(path(INDEX_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tag_name": tag,
            "name": format!("Release {tag}"),
            "assets": [],
        })))
        .mount(server)
        .await;
}

/// Serve `archive` as the archive of `tag`.
pub async fn mount_archive(server: &MockServer, tag: &str, archive: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/archive/{tag}.zip")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(archive),
        )
        .mount(server)
        .await;
}

/// Every file below `dir`, keyed by relative path, with its bytes. Links
/// are recorded by target, not followed.
pub fn snapshot(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(dir)?.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_file() {
            files.insert(relative, fs::read(entry.path())?);
        } else if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())?;
            files.insert(relative, format!("-> {}", target.display()).into_bytes());
        }
    }
    Ok(files)
}

/// File names directly inside `dir`, sorted.
pub fn file_names(dir: &Path) -> Result<Vec<String>> {
    Ok(snapshot(dir)?.into_keys().collect())
}
