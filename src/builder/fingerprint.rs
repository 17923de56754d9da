//! Native build fingerprinting.
//!
//! A fingerprint captures every input of the native compile step, allowing
//! us to skip running the compiler when nothing has changed.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::builder::native::NativeRequest;
use crate::util::fs::{clean_path, relative_path, to_slash, write_atomic};
use crate::util::hash::{sha256_file, Fingerprint as HashFingerprint};

/// File name of the fingerprint inside the state directory.
pub const FINGERPRINT_FILE: &str = "native.fingerprint.json";

/// Directory names never walked for inputs.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Fingerprint of a native crate build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFingerprint {
    /// Input file hashes, keyed by path relative to the crate directory
    pub inputs: BTreeMap<String, String>,

    /// Hash of the options the compiler is run with
    pub options_hash: String,
}

impl NativeFingerprint {
    /// Fingerprint every file of the crate, every file of its local path
    /// dependencies, and the request options.
    ///
    /// Build scripts and `include_str!` data are inputs too, so nothing is
    /// filtered by extension. Cargo's `target`, hidden directories, the
    /// loader output directory and `request.exclude` are left out.
    pub fn compute(request: &NativeRequest) -> Result<Self> {
        let crate_dir = clean_path(&request.crate_dir);
        let mut excluded: Vec<PathBuf> = request.exclude.iter().map(|d| clean_path(d)).collect();
        excluded.push(clean_path(&request.out_dir));

        let mut inputs = BTreeMap::new();
        let mut visited = HashSet::new();
        let mut pending = vec![crate_dir.clone()];

        while let Some(dir) = pending.pop() {
            if !visited.insert(dir.clone()) {
                continue;
            }
            hash_tree(&crate_dir, &dir, &excluded, &mut inputs)?;
            pending.extend(path_dependencies(&dir)?);
        }

        let mut fp = HashFingerprint::new();
        fp.update_str(request.mode.as_str())
            .update_opt(request.out_name.as_deref())
            .update_str(&to_slash(&request.out_dir))
            .update_strs(request.extra_args.iter().map(String::as_str));

        Ok(NativeFingerprint {
            inputs,
            options_hash: fp.finish(),
        })
    }

    /// Check if the fingerprint matches (nothing has changed).
    pub fn matches(&self, other: &NativeFingerprint) -> bool {
        self.inputs == other.inputs && self.options_hash == other.options_hash
    }

    /// Load a stored fingerprint. A missing or unreadable file means there
    /// is nothing to compare against.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::debug!("ignoring corrupt fingerprint {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())
    }
}

fn hash_tree(
    crate_dir: &Path,
    dir: &Path,
    excluded: &[PathBuf],
    inputs: &mut BTreeMap<String, String>,
) -> Result<()> {
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry, excluded));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            let rel = to_slash(&relative_path(crate_dir, entry.path()));
            inputs.insert(rel, sha256_file(entry.path())?);
        }
    }
    Ok(())
}

fn is_skipped(entry: &DirEntry, excluded: &[PathBuf]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || SKIPPED_DIRS.contains(&name.as_ref())
        || excluded.iter().any(|dir| *dir == entry.path())
}

/// Directories of the `path = "..."` dependencies declared by the crate in
/// `dir`, including build and target-specific dependencies.
fn path_dependencies(dir: &Path) -> Result<Vec<PathBuf>> {
    let manifest = dir.join("Cargo.toml");
    if !manifest.is_file() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(&manifest)
        .with_context(|| format!("failed to read {}", manifest.display()))?;
    let value: toml::Table = match toml::from_str(&contents) {
        Ok(value) => value,
        // the compiler reports a broken manifest better than we can
        Err(_) => return Ok(Vec::new()),
    };

    let mut tables = Vec::new();
    for key in ["dependencies", "build-dependencies"] {
        tables.extend(value.get(key).and_then(|v| v.as_table()));
    }
    if let Some(targets) = value.get("target").and_then(|v| v.as_table()) {
        for target in targets.values().filter_map(|v| v.as_table()) {
            for key in ["dependencies", "build-dependencies"] {
                tables.extend(target.get(key).and_then(|v| v.as_table()));
            }
        }
    }

    let mut dirs = Vec::new();
    for table in tables {
        for dep in table.values() {
            if let Some(path) = dep.get("path").and_then(|p| p.as_str()) {
                let dep_dir = clean_path(&dir.join(path));
                if dep_dir.is_dir() {
                    dirs.push(dep_dir);
                }
            }
        }
    }
    Ok(dirs)
}
