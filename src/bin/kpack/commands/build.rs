//! `kpack build` command

use std::path::Path;

use anyhow::Result;

use crate::cli::BuildArgs;
use kpack::builder::WasmPack;
use kpack::core::Project;
use kpack::ops::{build, BuildOptions};
use kpack::util::Shell;

pub fn execute(args: BuildArgs, dir: &Path, shell: &Shell) -> Result<()> {
    let project = Project::discover(dir)?;

    let opts = BuildOptions {
        force: args.force,
        mode: args.mode,
    };

    build(&project, &WasmPack::new(), shell, &opts)?;

    Ok(())
}
