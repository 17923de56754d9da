//! `kpack init` command

use std::path::Path;

use anyhow::Result;

use crate::cli::InitArgs;
use kpack::ops::init_project;
use kpack::util::fs::relative_path;
use kpack::util::shell::{Shell, Status};

pub fn execute(args: InitArgs, dir: &Path, shell: &Shell) -> Result<()> {
    let result = init_project(dir, args.name.as_deref())?;

    shell.status(
        Status::Created,
        format!("`{}` at {}", result.name, result.manifest.display()),
    );
    for path in &result.created {
        shell.verbose(Status::Created, relative_path(dir, path).display());
    }

    Ok(())
}
