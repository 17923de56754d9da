//! Module resolution.
//!
//! Maps an import specifier seen in one module to the file it refers to.
//! Relative and absolute specifiers are resolved against the importer's
//! directory; bare specifiers go through the alias table first and then
//! the `node_modules` directories above the importer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::trace;

use crate::util::diagnostic::KpackError;
use crate::util::fs::normalize_path;

/// Extensions tried, in order, when a specifier names no existing file.
pub const EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "json"];

/// The fields of package.json that select an entry point.
#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    module: Option<String>,
    main: Option<String>,
}

/// Resolves specifiers to canonical file paths.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    aliases: BTreeMap<String, PathBuf>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `specifier` as a bare name for `target` (a file or a
    /// directory). `specifier/sub` then resolves inside a directory target.
    pub fn alias(&mut self, specifier: impl Into<String>, target: impl Into<PathBuf>) {
        self.aliases.insert(specifier.into(), target.into());
    }

    /// Resolve a module specifier imported from `importer`.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        let found = if is_path_specifier(specifier) {
            let base = importer.parent().unwrap_or_else(|| Path::new("."));
            load_path(&base.join(specifier))?
        } else {
            self.resolve_bare(specifier, importer)?
        };

        match found {
            Some(path) => {
                let path = normalize_path(&path);
                trace!("resolved `{}` -> {}", specifier, path.display());
                Ok(path)
            }
            None => Err(unresolved(specifier, importer)),
        }
    }

    /// Resolve the file named by an asset reference. Assets are always
    /// relative to the importer and are never extended.
    pub fn resolve_asset(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        let base = importer.parent().unwrap_or_else(|| Path::new("."));
        let candidate = base.join(specifier);
        if candidate.is_file() {
            Ok(normalize_path(&candidate))
        } else {
            Err(unresolved(specifier, importer))
        }
    }

    fn resolve_bare(&self, specifier: &str, importer: &Path) -> Result<Option<PathBuf>> {
        if let Some(target) = self.aliases.get(specifier) {
            return load_path(target);
        }
        for (name, target) in &self.aliases {
            if let Some(sub) = specifier
                .strip_prefix(name.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            {
                return load_path(&target.join(sub));
            }
        }

        let (name, subpath) = split_package(specifier);
        let start = importer.parent().unwrap_or_else(|| Path::new("."));
        for dir in start.ancestors() {
            let package_dir = dir.join("node_modules").join(name);
            if !package_dir.is_dir() {
                continue;
            }
            trace!("looking for `{}` in {}", specifier, package_dir.display());
            return match subpath {
                Some(sub) => load_path(&package_dir.join(sub)),
                None => load_directory(&package_dir),
            };
        }
        Ok(None)
    }
}

fn unresolved(specifier: &str, importer: &Path) -> anyhow::Error {
    KpackError::UnresolvedImport {
        specifier: specifier.to_string(),
        importer: importer.to_path_buf(),
    }
    .into()
}

/// `./x`, `../x` and absolute paths name files; everything else is bare.
fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

/// Split `@scope/name/sub/path` into (`@scope/name`, `sub/path`).
fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let mut slashes = specifier.match_indices('/').map(|(i, _)| i);
    let split = if specifier.starts_with('@') {
        slashes.nth(1)
    } else {
        slashes.next()
    };
    match split {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

/// Resolve a filesystem path as a file, then as a directory.
fn load_path(path: &Path) -> Result<Option<PathBuf>> {
    if let Some(file) = load_file(path) {
        return Ok(Some(file));
    }
    if path.is_dir() {
        return load_directory(path);
    }
    Ok(None)
}

fn load_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    EXTENSIONS
        .iter()
        .map(|ext| path.with_file_name(format!("{}.{}", file_name, ext)))
        .find(|candidate| candidate.is_file())
}

/// A directory resolves through package.json (`module`, then `main`) and
/// falls back to `index.*`.
fn load_directory(dir: &Path) -> Result<Option<PathBuf>> {
    let manifest = dir.join("package.json");
    if manifest.is_file() {
        let contents = crate::util::fs::read_to_string(&manifest)?;
        let package: PackageJson = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", manifest.display()))?;

        for field in [package.module, package.main].into_iter().flatten() {
            let target = dir.join(&field);
            if let Some(file) = load_file(&target) {
                return Ok(Some(file));
            }
            if target.is_dir() {
                if let Some(index) = load_index(&target) {
                    return Ok(Some(index));
                }
            }
        }
    }
    Ok(load_index(dir))
}

fn load_index(dir: &Path) -> Option<PathBuf> {
    load_file(&dir.join("index"))
}
