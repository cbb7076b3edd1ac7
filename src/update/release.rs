//! Remote release metadata and downloads.
//!
//! [`ReleaseClient`] issues the two HTTP requests an update needs: one to
//! the release index for the latest tag, and one for the release archive.
//! Tags are validated into [`ReleaseTag`] before they are ever substituted
//! into a URL.

use crate::config::UpdateConfig;
use crate::constants::{CONNECT_TIMEOUT, TAG_PLACEHOLDER, USER_AGENT};
use crate::core::SlashError;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]{0,127}$").expect("tag pattern is valid")
});

/// A release tag safe to embed in a URL path segment or a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseTag(String);

impl ReleaseTag {
    /// Validate a tag. Surrounding whitespace is trimmed.
    pub fn parse(tag: &str) -> Result<Self, SlashError> {
        let tag = tag.trim();
        if !TAG_PATTERN.is_match(tag) || tag.contains("..") {
            return Err(SlashError::InvalidReleaseTag {
                tag: tag.to_string(),
            });
        }
        Ok(Self(tag.to_string()))
    }

    /// The tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Semantic version of the tag, ignoring a leading `v`.
    #[must_use]
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.0.trim_start_matches('v')).ok()
    }

    /// Whether `installed` names the same release as this tag.
    ///
    /// Compares as semver when both sides parse, ignoring a leading `v`;
    /// otherwise the trimmed text must match exactly.
    #[must_use]
    pub fn matches_installed(&self, installed: &str) -> bool {
        let installed = installed.trim();
        let installed_semver = semver::Version::parse(installed.trim_start_matches('v')).ok();
        match (self.semver(), installed_semver) {
            (Some(latest), Some(current)) => latest == current,
            _ => self.0 == installed,
        }
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A published release: its tag and where its archive lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Version tag
    pub tag: ReleaseTag,
    /// Archive download location
    pub archive_url: Url,
}

impl ReleaseDescriptor {
    /// Build a descriptor by substituting `tag` into `archive_url_template`.
    pub fn from_template(tag: ReleaseTag, archive_url_template: &str) -> Result<Self, SlashError> {
        if !archive_url_template.contains(TAG_PLACEHOLDER) {
            return Err(SlashError::Config {
                message: format!("archive URL template must contain {TAG_PLACEHOLDER}"),
            });
        }
        let raw = archive_url_template.replace(TAG_PLACEHOLDER, tag.as_str());
        let archive_url = Url::parse(&raw).map_err(|e| SlashError::Config {
            message: format!("invalid archive URL '{raw}': {e}"),
        })?;
        Ok(Self {
            tag,
            archive_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseIndexResponse {
    tag_name: Option<String>,
}

/// HTTP client for the release index and archives.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
    index_url: Url,
    archive_url_template: String,
}

impl ReleaseClient {
    /// Create a client with an explicit index URL, archive template and timeout.
    pub fn new(
        index_url: &str,
        archive_url_template: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SlashError> {
        let index_url = Url::parse(index_url).map_err(|e| SlashError::Config {
            message: format!("invalid release index URL '{index_url}': {e}"),
        })?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| SlashError::Other {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            index_url,
            archive_url_template: archive_url_template.into(),
        })
    }

    /// Create a client from the `[update]` configuration section.
    pub fn from_config(config: &UpdateConfig) -> Result<Self, SlashError> {
        config.validate()?;
        Self::new(
            &config.release_index_url(),
            config.archive_url_template(),
            config.network_timeout(),
        )
    }

    /// Query the release index for the latest release.
    ///
    /// # Errors
    ///
    /// - [`SlashError::Network`] if the request fails or returns a non-2xx status
    /// - [`SlashError::ReleaseNotFound`] if the body has no usable `tag_name`
    pub async fn fetch_latest(&self) -> Result<ReleaseDescriptor, SlashError> {
        debug!("Querying release index at {}", self.index_url);

        let response = self
            .client
            .get(self.index_url.clone())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| network_error(&self.index_url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlashError::Network {
                url: self.index_url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let body = response.text().await.map_err(|e| network_error(&self.index_url, &e))?;
        let tag = parse_release_index(&body)?;
        info!("Latest release is {tag}");

        ReleaseDescriptor::from_template(tag, &self.archive_url_template)
    }

    /// Download the archive of `release` into `dest`.
    ///
    /// Returns the number of bytes written. The file is streamed chunk by
    /// chunk; a partially written file is left for the caller's staging
    /// cleanup.
    pub async fn download_archive(
        &self,
        release: &ReleaseDescriptor,
        dest: &Path,
    ) -> Result<u64, SlashError> {
        let url = &release.archive_url;
        info!("Downloading {} from {url}", release.tag);

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlashError::Network {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let mut file =
            tokio::fs::File::create(dest).await.map_err(|e| SlashError::fs("create", dest, e))?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| network_error(url, &e))? {
            file.write_all(&chunk).await.map_err(|e| SlashError::fs("write", dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| SlashError::fs("flush", dest, e))?;

        debug!("Downloaded {written} bytes to {}", dest.display());
        Ok(written)
    }
}

fn network_error(url: &Url, err: &reqwest::Error) -> SlashError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    SlashError::Network {
        url: url.to_string(),
        reason,
    }
}

/// Extract the release tag from a release index response body.
///
/// # Errors
///
/// [`SlashError::ReleaseNotFound`] for an empty or malformed body, a
/// missing or blank `tag_name`, or a tag that fails [`ReleaseTag::parse`].
pub fn parse_release_index(body: &str) -> Result<ReleaseTag, SlashError> {
    if body.trim().is_empty() {
        return Err(SlashError::ReleaseNotFound {
            reason: "release index returned an empty response".to_string(),
        });
    }

    let parsed: ReleaseIndexResponse =
        serde_json::from_str(body).map_err(|e| SlashError::ReleaseNotFound {
            reason: format!("release index response is not valid JSON: {e}"),
        })?;

    let tag = parsed.tag_name.unwrap_or_default();
    if tag.trim().is_empty() {
        return Err(SlashError::ReleaseNotFound {
            reason: "release index response has no tag_name".to_string(),
        });
    }

    ReleaseTag::parse(&tag).map_err(|e| SlashError::ReleaseNotFound {
        reason: e.to_string(),
    })
}
