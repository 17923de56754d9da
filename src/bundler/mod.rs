//! The JavaScript bundler.
//!
//! Turns an entry module and everything it reaches into a single script:
//!
//! 1. [`scan`] parses each module and finds its import and export syntax,
//! 2. [`resolve`] maps specifiers to files,
//! 3. [`graph`] numbers the reachable modules,
//! 4. [`transform`] and [`emit`] produce the bundle text.

pub mod emit;
pub mod graph;
pub mod resolve;
pub mod scan;
pub mod transform;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

pub use graph::{Asset, EdgeKind, ModuleGraph, ModuleId};
pub use resolve::Resolver;

/// The result of bundling, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub code: String,
    pub modules: usize,
    /// Files to place next to the bundle
    pub assets: Vec<Asset>,
}

/// Bundles one entry module.
#[derive(Debug, Clone)]
pub struct Bundler {
    root: PathBuf,
    entry: PathBuf,
    name: String,
    resolver: Resolver,
}

impl Bundler {
    pub fn new(root: impl Into<PathBuf>, entry: impl Into<PathBuf>) -> Self {
        Bundler {
            root: root.into(),
            entry: entry.into(),
            name: "bundle".to_string(),
            resolver: Resolver::new(),
        }
    }

    /// Name shown in the bundle banner.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make `specifier` importable as a bare name.
    pub fn alias(&mut self, specifier: impl Into<String>, target: impl Into<PathBuf>) {
        self.resolver.alias(specifier, target);
    }

    /// Resolve the module graph without rendering it.
    pub fn graph(&self) -> Result<ModuleGraph> {
        ModuleGraph::build(&self.root, &self.entry, &self.resolver)
    }

    pub fn bundle(&self) -> Result<Bundle> {
        let graph = self.graph()?;
        let code = emit::emit(&graph, &self.name);
        info!(
            "bundled {} modules ({} bytes)",
            graph.len(),
            code.len()
        );
        Ok(Bundle {
            code,
            modules: graph.len(),
            assets: graph.assets().to_vec(),
        })
    }
}
