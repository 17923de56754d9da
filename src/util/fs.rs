//! Filesystem utilities.
//!
//! Failures are reported as [`KpackError::Io`] carrying the offending path.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use tempfile::NamedTempFile;

use crate::util::diagnostic::KpackError;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| KpackError::io(path, e))?;
        return Ok(true);
    }
    Ok(false)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path).map_err(|e| KpackError::io(path, e))?;
    }
    Ok(())
}

/// Read a file to string.
pub fn read_to_string(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path).map_err(|e| KpackError::io(path, e))?)
}

/// Copy one file verbatim, creating parent directories of `dst`.
///
/// Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    Ok(fs::copy(src, dst).map_err(|e| KpackError::io(src, e))?)
}

/// Write bytes to `path` through a temporary file in the same directory.
///
/// Readers never observe a half-written file, and a failure before the
/// rename leaves any previous file untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| KpackError::io(&parent, e))?;
    tmp.write_all(contents)
        .map_err(|e| KpackError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| KpackError::io(path, e.error))?;
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(fs::write(path, contents).map_err(|e| KpackError::io(path, e))?)
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
/// Returns the lexically cleaned path if canonicalization fails.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| clean_path(path))
}

/// Lexically remove `.` and resolvable `..` components.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Render a path with forward slashes, independent of the host platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
