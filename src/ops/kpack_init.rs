//! Implementation of `kpack init`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::manifest::generate_manifest;
use crate::core::MANIFEST_NAME;
use crate::util::diagnostic::KpackError;
use crate::util::fs::{ensure_dir, write_string};

const ENTRY_TEMPLATE: &str = r#"import init from "{crate}";

init().then(() => {
  console.log("{name} ready");
});
"#;

/// Files and directories created by `kpack init`.
#[derive(Debug, Clone)]
pub struct InitResult {
    pub name: String,
    pub manifest: PathBuf,
    /// Scaffolding created next to the manifest (existing files are kept)
    pub created: Vec<PathBuf>,
}

/// Write a default Kpack.toml into `dir`, plus an entry module and a
/// static directory when they do not exist yet.
pub fn init_project(dir: &Path, name: Option<&str>) -> Result<InitResult> {
    let manifest = dir.join(MANIFEST_NAME);
    if manifest.exists() {
        return Err(KpackError::config(format!(
            "`{}` already exists in `{}`",
            MANIFEST_NAME,
            dir.display()
        ))
        .into());
    }

    let name = match name {
        Some(name) => validate_name(name)?,
        None => default_name(dir),
    };

    ensure_dir(dir)?;
    write_string(&manifest, &generate_manifest(&name))?;

    let mut created = Vec::new();
    let entry = dir.join("js").join("index.js");
    if !entry.exists() {
        let contents = ENTRY_TEMPLATE
            .replace("{crate}", &name)
            .replace("{name}", &name);
        write_string(&entry, &contents)?;
        created.push(entry);
    }
    let static_dir = dir.join("static");
    if !static_dir.exists() {
        ensure_dir(&static_dir)?;
        created.push(static_dir);
    }

    tracing::debug!("initialized `{}` in {}", name, dir.display());
    Ok(InitResult {
        name,
        manifest,
        created,
    })
}

fn validate_name(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(KpackError::config(format!(
            "invalid project name `{}`: use letters, digits, `-` and `_`",
            name
        ))
        .into())
    }
}

/// The directory name, reduced to characters valid in a bundle name.
fn default_name(dir: &Path) -> String {
    let raw = crate::util::fs::normalize_path(dir)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() {
        "kp-chart".to_string()
    } else {
        cleaned
    }
}
