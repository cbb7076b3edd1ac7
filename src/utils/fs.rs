//! File system helpers used by the updater.
//!
//! All functions here are synchronous; async callers run them inside
//! `tokio::task::spawn_blocking`. The directory swap is the primitive that
//! keeps an installation from ever being observed half-replaced.

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Create a directory and all of its parents if missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        bail!("Path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Write `content` to `path` through a temporary file and a rename, so the
/// file is never observed with partial contents.
///
/// # Guarantees
///
/// - **Atomicity**: File contents are never in a partial state
/// - **Durability**: Content is synced to disk before rename
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Recursively copy a directory tree.
///
/// Creates `dst` if needed. Regular files and directories are copied,
/// symlinks are recreated pointing at the same target, and special files
/// are skipped.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target =
        fs::read_link(src).with_context(|| format!("Failed to read link: {}", src.display()))?;
    std::os::unix::fs::symlink(&target, dst).with_context(|| {
        format!("Failed to create link {} -> {}", dst.display(), target.display())
    })
}

// Creating links needs extra privileges on Windows; copy what they point at.
#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir(src, dst)
    } else {
        fs::copy(src, dst).map(|_| ()).with_context(|| {
            format!("Failed to copy linked file from {} to {}", src.display(), dst.display())
        })
    }
}

/// Remove a directory tree; succeeds if it does not exist.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Move `replacement` into `target`'s place using renames only.
///
/// If `target` exists it is first renamed to `aside`; if the second rename
/// fails the first one is undone. `target` therefore holds either its old
/// tree or the replacement tree, never a mix. All three paths must be on the
/// same filesystem, and `aside` must not exist.
///
/// Returns `true` if an old tree was moved to `aside`.
pub fn swap_dir_into_place(replacement: &Path, target: &Path, aside: &Path) -> Result<bool> {
    let had_target = target.exists();

    if had_target {
        fs::rename(target, aside).with_context(|| {
            format!("Failed to move {} aside to {}", target.display(), aside.display())
        })?;
    }

    if let Err(err) = fs::rename(replacement, target) {
        if had_target && let Err(undo) = fs::rename(aside, target) {
            return Err(anyhow::anyhow!(
                "Failed to move {} into place ({err}) and failed to put the previous tree back ({undo}); \
                 it is at {}",
                replacement.display(),
                aside.display()
            ));
        }
        return Err(err).with_context(|| {
            format!("Failed to move {} into {}", replacement.display(), target.display())
        });
    }

    Ok(had_target)
}

/// Names of the regular files, and links to files, directly inside `dir`.
pub fn list_file_names(dir: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Content digest of a directory tree.
///
/// Hashes every regular file's relative path and bytes, and every symlink's
/// relative path and target, in sorted order. Links are not followed. Two
/// trees share a digest exactly when they hold the same files and links.
/// Returned as `sha256:<hex>`.
pub fn dir_digest(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to walk directory: {}", dir.display()))?;
        let file_type = entry.file_type();
        let (kind, contents) = if file_type.is_file() {
            let contents = fs::read(entry.path())
                .with_context(|| format!("Failed to read file: {}", entry.path().display()))?;
            (b'f', contents)
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())
                .with_context(|| format!("Failed to read link: {}", entry.path().display()))?;
            (b'l', target.to_string_lossy().into_owned().into_bytes())
        } else {
            continue;
        };
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());

        hasher.update([kind]);
        hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update([0u8]);
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }

    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}
