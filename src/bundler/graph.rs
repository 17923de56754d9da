//! The module graph.
//!
//! Built breadth-first from the entry module. Modules are identified by
//! canonical path and numbered in discovery order, so the same sources
//! always produce the same ids. Cycles are allowed; the runtime cache
//! breaks them when the bundle executes.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use super::resolve::Resolver;
use super::scan::{scan, ImportKind, ModuleSyntax};
use crate::util::diagnostic::KpackError;
use crate::util::{fs, hash};

/// Dense module identifier; the entry is always 0.
pub type ModuleId = usize;

/// How one module depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Import,
    Dynamic,
    Require,
    ReExport,
}

impl EdgeKind {
    fn of(kind: &ImportKind) -> Option<Self> {
        match kind {
            ImportKind::Static(_) | ImportKind::SideEffect => Some(EdgeKind::Import),
            ImportKind::Dynamic => Some(EdgeKind::Dynamic),
            ImportKind::Require => Some(EdgeKind::Require),
            ImportKind::ReExport(_) => Some(EdgeKind::ReExport),
            ImportKind::Asset => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Import => "import",
            EdgeKind::Dynamic => "dynamic",
            EdgeKind::Require => "require",
            EdgeKind::ReExport => "re-export",
        }
    }
}

/// What an import record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Module(ModuleId),
    /// Index into [`ModuleGraph::assets`]
    Asset(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Script,
    Json,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    pub source: String,
    pub kind: ModuleKind,
    pub syntax: ModuleSyntax,
    /// One target per entry of `syntax.imports`, in the same order.
    pub targets: Vec<Target>,
}

/// A file referenced with `new URL(..., import.meta.url)` that is emitted
/// next to the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub source: PathBuf,
    /// File name in the output directory
    pub name: String,
}

#[derive(Debug)]
pub struct ModuleGraph {
    root: PathBuf,
    graph: DiGraph<ModuleId, EdgeKind>,
    modules: Vec<Module>,
    by_path: HashMap<PathBuf, ModuleId>,
    assets: Vec<Asset>,
}

impl ModuleGraph {
    /// Discover every module reachable from `entry`.
    ///
    /// `root` is only used to display paths.
    pub fn build(root: &Path, entry: &Path, resolver: &Resolver) -> Result<Self> {
        if !entry.is_file() {
            return Err(KpackError::config(format!(
                "entry module `{}` does not exist",
                entry.display()
            ))
            .into());
        }

        let mut graph = ModuleGraph {
            root: fs::normalize_path(root),
            graph: DiGraph::new(),
            modules: Vec::new(),
            by_path: HashMap::new(),
            assets: Vec::new(),
        };

        let mut queue = VecDeque::new();
        queue.push_back(graph.add_module(fs::normalize_path(entry))?);

        while let Some(id) = queue.pop_front() {
            let importer = graph.modules[id].path.clone();
            let records = graph.modules[id].syntax.imports.clone();
            let mut targets = Vec::with_capacity(records.len());

            for record in &records {
                if record.kind == ImportKind::Asset {
                    let source = resolver.resolve_asset(&record.specifier, &importer)?;
                    targets.push(Target::Asset(graph.add_asset(source)?));
                    continue;
                }

                let path = resolver.resolve(&record.specifier, &importer)?;
                let dep = match graph.by_path.get(&path) {
                    Some(&existing) => existing,
                    None => {
                        let new = graph.add_module(path)?;
                        queue.push_back(new);
                        new
                    }
                };
                if let Some(edge) = EdgeKind::of(&record.kind) {
                    graph
                        .graph
                        .update_edge(NodeIndex::new(id), NodeIndex::new(dep), edge);
                }
                targets.push(Target::Module(dep));
            }

            graph.modules[id].targets = targets;
        }

        debug!(
            "module graph: {} modules, {} assets",
            graph.modules.len(),
            graph.assets.len()
        );
        if graph.has_cycles() {
            debug!("module graph contains import cycles");
        }

        Ok(graph)
    }

    fn add_module(&mut self, path: PathBuf) -> Result<ModuleId> {
        let mut source = fs::read_to_string(&path)?;
        if let Some(stripped) = source.strip_prefix('\u{feff}') {
            source = stripped.to_string();
        }
        let shown = self.display_path(&path);

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let (kind, syntax) = if is_json {
            serde_json::from_str::<serde_json::Value>(&source)
                .with_context(|| format!("failed to parse JSON module `{}`", shown))?;
            (ModuleKind::Json, ModuleSyntax::default())
        } else {
            let syntax =
                scan(&source).with_context(|| format!("failed to parse module `{}`", shown))?;
            (ModuleKind::Script, syntax)
        };

        let id = self.modules.len();
        let node = self.graph.add_node(id);
        debug_assert_eq!(node.index(), id);
        debug!("module {} = {}", id, shown);

        self.by_path.insert(path.clone(), id);
        self.modules.push(Module {
            id,
            path,
            source,
            kind,
            syntax,
            targets: Vec::new(),
        });
        Ok(id)
    }

    fn add_asset(&mut self, source: PathBuf) -> Result<usize> {
        if let Some(index) = self.assets.iter().position(|a| a.source == source) {
            return Ok(index);
        }

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string());

        // Two different files with the same name get a content hash suffix
        let name = if self.assets.iter().any(|a| a.name == file_name) {
            let digest = hash::sha256_file(&source)?;
            let short = &digest[..8];
            match file_name.rsplit_once('.') {
                Some((stem, ext)) => format!("{}-{}.{}", stem, short, ext),
                None => format!("{}-{}", file_name, short),
            }
        } else {
            file_name
        };

        self.assets.push(Asset { source, name });
        Ok(self.assets.len() - 1)
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(&fs::normalize_path(path))
    }

    /// Direct dependencies of a module, in source order, without repeats.
    pub fn dependencies(&self, id: ModuleId) -> Vec<(ModuleId, EdgeKind)> {
        let mut deps: Vec<(ModuleId, EdgeKind)> = Vec::new();
        for &target in &self.modules[id].targets {
            if let Target::Module(dep) = target {
                if deps.iter().all(|(seen, _)| *seen != dep) {
                    let kind = self
                        .graph
                        .find_edge(NodeIndex::new(id), NodeIndex::new(dep))
                        .map(|edge| self.graph[edge])
                        .unwrap_or(EdgeKind::Import);
                    deps.push((dep, kind));
                }
            }
        }
        deps
    }

    /// Assets referenced by a module, in source order, without repeats.
    pub fn module_assets(&self, id: ModuleId) -> Vec<&Asset> {
        let mut found: Vec<usize> = Vec::new();
        for &target in &self.modules[id].targets {
            if let Target::Asset(index) = target {
                if !found.contains(&index) {
                    found.push(index);
                }
            }
        }
        found.into_iter().map(|index| &self.assets[index]).collect()
    }

    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Path of a module relative to the project root, with `/` separators.
    pub fn relative_path(&self, id: ModuleId) -> String {
        self.display_path(&self.modules[id].path)
    }

    fn display_path(&self, path: &Path) -> String {
        fs::to_slash(&fs::relative_path(&self.root, path))
    }
}
