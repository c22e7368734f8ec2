//! File system helpers with atomic write semantics.
//!
//! The slot registry must never be observed half-written, so every write of
//! `index.json` goes through [`atomic_write`]: write to a sibling temporary
//! file, sync, then rename over the target.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Creates a directory and all of its parents if it does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or if the
/// directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(anyhow::anyhow!(
                "Path exists but is not a directory: {}",
                path.display()
            ));
        }
        return Ok(());
    }

    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// 1. Write content to `<path>.tmp`
/// 2. Sync the temporary file to disk
/// 3. Rename it over the target path
///
/// Readers see either the previous content or the new content, never a
/// partial file. Parent directories are created as needed.
///
/// # Examples
///
/// ```rust,no_run
/// use docdeps::utils::fs::atomic_write;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// atomic_write(Path::new("cache/remote/index.json"), b"[]")?;
/// # Ok(())
/// # }
/// ```
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let mut file = fs::File::create(&temp_path).with_context(|| {
            format!(
                "Failed to create temp file: {}\n\nCheck file permissions and that the directory exists",
                temp_path.display()
            )
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}
