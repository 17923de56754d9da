//! `kpack clean` command

use std::path::Path;

use anyhow::Result;

use kpack::core::Project;
use kpack::ops::clean;
use kpack::util::fs::relative_path;
use kpack::util::shell::{Shell, Status};

pub fn execute(dir: &Path, shell: &Shell) -> Result<()> {
    let project = Project::discover(dir)?;

    let removed = clean(&project)?;
    for path in &removed {
        shell.status(
            Status::Removed,
            relative_path(project.root(), path).display(),
        );
    }
    if removed.is_empty() {
        shell.verbose(Status::Fresh, "nothing to clean");
    }

    Ok(())
}
