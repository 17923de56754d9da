//! Implementation of `kpack graph`.

use std::collections::HashSet;
use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::builder::native::read_crate_name;
use crate::builder::{NativeModule, NativeRequest};
use crate::bundler::{Bundler, EdgeKind, ModuleGraph, ModuleId};
use crate::core::Project;

/// Options for the graph command.
#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    /// Maximum depth to print (the entry is depth 0)
    pub depth: Option<usize>,
}

/// Resolve the module graph of `project` without compiling or emitting.
///
/// The native loader is aliased when a previous build left it on disk;
/// otherwise importing the crate name fails to resolve.
pub fn resolve_graph(project: &Project) -> Result<ModuleGraph> {
    project.validate()?;

    let mut bundler = Bundler::new(project.root(), project.entry_path())
        .with_name(&project.manifest().bundle.name);

    if let Some(wasm) = project.wasm() {
        let request = NativeRequest::from_config(project.root(), wasm);
        match read_crate_name(&request.crate_dir) {
            Ok(crate_name) => {
                let (loader, wasm) = request.outputs_for(&crate_name);
                if loader.is_file() {
                    let module = NativeModule {
                        crate_name,
                        loader,
                        wasm,
                        fresh: true,
                    };
                    for specifier in module.specifiers() {
                        bundler.alias(specifier, &module.loader);
                    }
                } else {
                    tracing::debug!(
                        "native loader {} not built yet, not aliased",
                        loader.display()
                    );
                }
            }
            Err(e) => tracing::debug!("skipping native alias: {:#}", e),
        }
    }

    bundler
        .graph()
        .context("failed to resolve the module graph")
}

/// Render the graph as an indented tree of `id path` lines.
///
/// Modules already printed are marked `(*)` and not expanded again.
/// Non-static edges carry their kind, and assets are listed under the
/// module that references them.
pub fn render_tree(graph: &ModuleGraph, opts: &GraphOptions) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    let max_depth = opts.depth.unwrap_or(usize::MAX);
    render_module(graph, 0, None, "", true, 0, max_depth, &mut seen, &mut out);
    out
}

#[allow(clippy::too_many_arguments)]
fn render_module(
    graph: &ModuleGraph,
    id: ModuleId,
    edge: Option<EdgeKind>,
    prefix: &str,
    last: bool,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<ModuleId>,
    out: &mut String,
) {
    let repeated = !seen.insert(id);

    let (branch, child_prefix) = if depth == 0 {
        (String::new(), String::new())
    } else if last {
        (format!("{}└── ", prefix), format!("{}    ", prefix))
    } else {
        (format!("{}├── ", prefix), format!("{}│   ", prefix))
    };

    let kind = match edge {
        Some(EdgeKind::Import) | None => String::new(),
        Some(kind) => format!(" [{}]", kind.as_str()),
    };
    let marker = if repeated { " (*)" } else { "" };
    let _ = writeln!(
        out,
        "{}{} {}{}{}",
        branch,
        id,
        graph.relative_path(id),
        kind,
        marker
    );

    if repeated || depth >= max_depth {
        return;
    }

    let deps = graph.dependencies(id);
    let assets = graph.module_assets(id);
    let children = deps.len() + assets.len();

    for (i, (dep, kind)) in deps.into_iter().enumerate() {
        render_module(
            graph,
            dep,
            Some(kind),
            &child_prefix,
            i + 1 == children,
            depth + 1,
            max_depth,
            seen,
            out,
        );
    }
    let offset = children - assets.len();
    for (i, asset) in assets.iter().enumerate() {
        let connector = if offset + i + 1 == children {
            "└── "
        } else {
            "├── "
        };
        let _ = writeln!(out, "{}{}{} [asset]", child_prefix, connector, asset.name);
    }
}
