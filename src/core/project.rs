//! Project - the root directory plus its manifest.
//!
//! Every path in the manifest is relative to the project root; this type
//! turns them into absolute paths and checks the ones that must exist
//! before a build starts.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::manifest::{CopyRule, Manifest, WasmConfig, MANIFEST_NAME};
use crate::util::diagnostic::{suggestions, KpackError};

/// Name of the per-project state directory (fingerprints).
pub const STATE_DIR: &str = ".kpack";

/// A project root with its loaded manifest.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    manifest_path: Option<PathBuf>,
    manifest: Manifest,
}

impl Project {
    /// Find the project containing `start`.
    ///
    /// Walks up from `start` looking for Kpack.toml. When none exists the
    /// project root is `start` itself with the default manifest.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = crate::util::fs::normalize_path(start);
        match find_manifest(&start) {
            Some(path) => Self::from_manifest_path(&path),
            None => {
                tracing::debug!(
                    "no {} found above {}, using defaults",
                    MANIFEST_NAME,
                    start.display()
                );
                Ok(Self::with_manifest(start, Manifest::default()))
            }
        }
    }

    /// Load the project whose manifest is at `path`.
    pub fn from_manifest_path(path: &Path) -> Result<Self> {
        let manifest = Manifest::load(path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Project {
            root,
            manifest_path: Some(path.to_path_buf()),
            manifest,
        })
    }

    /// Create a project from an in-memory manifest.
    pub fn with_manifest(root: impl Into<PathBuf>, manifest: Manifest) -> Self {
        Project {
            root: root.into(),
            manifest_path: None,
            manifest,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the manifest file, if the project has one.
    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.manifest.bundle.entry)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.manifest.output.path)
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.output_dir().join(&self.manifest.output.filename)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Copy rules with absolute source and destination.
    pub fn copy_rules(&self) -> Vec<CopyRule> {
        self.manifest
            .copy
            .iter()
            .map(|rule| CopyRule {
                from: self.root.join(&rule.from),
                to: self.root.join(&rule.to),
                ..rule.clone()
            })
            .collect()
    }

    pub fn wasm(&self) -> Option<&WasmConfig> {
        self.manifest.wasm.as_ref()
    }

    pub fn crate_dir(&self) -> Option<PathBuf> {
        self.wasm().map(|w| self.root.join(&w.crate_directory))
    }

    /// Directories the build writes into; removed by `kpack clean`.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.output_dir()];
        for rule in self.copy_rules() {
            if !dirs.contains(&rule.to) {
                dirs.push(rule.to);
            }
        }
        if let Some(wasm) = self.wasm() {
            dirs.push(self.root.join(&wasm.crate_directory).join(&wasm.out_dir));
        }
        dirs
    }

    /// Check the paths that must exist before anything is written.
    pub fn validate(&self) -> Result<()> {
        let entry = self.entry_path();
        if !entry.is_file() {
            return Err(KpackError::config(format!(
                "entry module `{}` does not exist",
                self.manifest.bundle.entry.display()
            ))
            .with_help(suggestions::MISSING_ENTRY)
            .into());
        }

        let output = self.output_dir();
        if output.exists() && !output.is_dir() {
            return Err(KpackError::config(format!(
                "output path `{}` exists and is not a directory",
                self.manifest.output.path.display()
            ))
            .into());
        }

        Ok(())
    }
}

/// Walk up from `start` to find Kpack.toml.
pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
}
