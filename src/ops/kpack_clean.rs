//! Implementation of `kpack clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::Project;
use crate::util::fs::{normalize_path, remove_dir_all_if_exists};

/// Remove every directory the build writes into, and the state directory.
///
/// Directories that contain the project root, the entry module, a copy
/// source or the native crate's sources are never removed, so a copy rule
/// targeting `.` cannot wipe the project. Returns the removed paths.
pub fn clean(project: &Project) -> Result<Vec<PathBuf>> {
    let protected = protected_paths(project);
    let mut removed = Vec::new();

    let mut targets = project.output_dirs();
    targets.push(project.state_dir());

    for dir in targets {
        let normalized = normalize_path(&dir);
        if let Some(keep) = protected.iter().find(|p| p.starts_with(&normalized)) {
            tracing::warn!(
                "not removing {}: it contains {}",
                dir.display(),
                keep.display()
            );
            continue;
        }
        if remove_dir_all_if_exists(&dir)? {
            tracing::debug!("removed {}", dir.display());
            removed.push(dir);
        }
    }

    Ok(removed)
}

fn protected_paths(project: &Project) -> Vec<PathBuf> {
    let mut paths = vec![project.root().to_path_buf(), project.entry_path()];
    paths.extend(project.copy_rules().into_iter().map(|r| r.from));
    if let Some(crate_dir) = project.crate_dir() {
        paths.push(crate_dir.join("Cargo.toml"));
        paths.push(crate_dir.join("src"));
    }
    paths.iter().map(|p| normalize_path(p)).collect()
}
