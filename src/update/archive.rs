//! Unpacking and validating release archives.
//!
//! Release archives are zip files with a single top-level folder (as GitHub
//! produces for tag archives). Extraction strips that folder and refuses any
//! entry whose path would land outside the destination directory.

use crate::core::SlashError;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Extract `archive` into `dest`, dropping the first path component of
/// every entry.
///
/// Entries that consist only of the leading component are skipped. Returns
/// the number of files written.
///
/// # Errors
///
/// [`SlashError::Archive`] if the file is not a readable zip, an entry has
/// an unsafe path, or writing fails.
pub fn extract_stripped(archive: &Path, dest: &Path) -> Result<usize, SlashError> {
    let file = fs::File::open(archive)
        .map_err(|e| SlashError::archive(format!("cannot open {}: {e}", archive.display())))?;
    let mut zip = zip::ZipArchive::new(io::BufReader::new(file))
        .map_err(|e| SlashError::archive(format!("not a valid zip archive: {e}")))?;

    fs::create_dir_all(dest)
        .map_err(|e| SlashError::archive(format!("cannot create {}: {e}", dest.display())))?;

    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| SlashError::archive(format!("cannot read entry {index}: {e}")))?;

        let raw_name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| SlashError::archive(format!("entry '{raw_name}' has an unsafe path")))?;

        let Some(stripped) = strip_first_component(&relative) else {
            continue;
        };
        let out_path = dest.join(&stripped);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| {
                SlashError::archive(format!("cannot create {}: {e}", out_path.display()))
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SlashError::archive(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let mut out = fs::File::create(&out_path).map_err(|e| {
            SlashError::archive(format!("cannot create {}: {e}", out_path.display()))
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            SlashError::archive(format!("cannot extract '{raw_name}': {e}"))
        })?;
        files += 1;
    }

    debug!("Extracted {files} files from {} into {}", archive.display(), dest.display());
    Ok(files)
}

fn strip_first_component(path: &Path) -> Option<PathBuf> {
    let mut components = path.components().filter(|c| matches!(c, Component::Normal(_)));
    components.next()?;
    let rest: PathBuf = components.collect();
    (!rest.as_os_str().is_empty()).then_some(rest)
}

/// Locate the resource directory inside an extracted archive.
///
/// `resource_path` is relative (e.g. `.claude/commands`) and must not
/// contain `..`.
///
/// # Errors
///
/// [`SlashError::Archive`] if the path is unsafe or the directory is absent.
pub fn locate_resources(extracted: &Path, resource_path: &str) -> Result<PathBuf, SlashError> {
    let relative = Path::new(resource_path);
    if relative.is_absolute()
        || relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(SlashError::archive(format!(
            "resource path '{resource_path}' must be relative and stay inside the archive"
        )));
    }

    let dir = extracted.join(relative);
    if !dir.is_dir() {
        return Err(SlashError::archive(format!(
            "archive does not contain the expected '{resource_path}' directory"
        )));
    }
    Ok(dir)
}
