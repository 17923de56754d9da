//! `kpack graph` command

use std::path::Path;

use anyhow::Result;

use crate::cli::GraphArgs;
use kpack::core::Project;
use kpack::ops::{render_tree, resolve_graph, GraphOptions};
use kpack::util::diagnostic::{self, Diagnostic};
use kpack::util::Shell;

pub fn execute(args: GraphArgs, dir: &Path, shell: &Shell) -> Result<()> {
    let project = Project::discover(dir)?;
    let graph = resolve_graph(&project)?;

    if graph.has_cycles() && !shell.is_quiet() {
        let warning = Diagnostic::warning("the module graph contains import cycles")
            .with_suggestion(
                "reading an export before its declaration runs throws a ReferenceError",
            );
        diagnostic::emit(&warning, shell.use_color());
    }

    let opts = GraphOptions { depth: args.depth };
    print!("{}", render_tree(&graph, &opts));

    Ok(())
}
