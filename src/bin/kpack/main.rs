//! kpack CLI

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use kpack::core::{find_manifest, Manifest};
use kpack::util::diagnostic::{self, Diagnostic};
use kpack::util::Shell;

fn main() {
    let cli = Cli::parse();
    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color, cli.json());

    if let Err(e) = run(cli, &shell) {
        diagnostic::emit(&Diagnostic::from_error(&e), shell.use_color());
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: &Shell) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let dir = match &cli.manifest_dir {
        Some(dir) => cwd.join(dir),
        None => cwd,
    };

    init_logging(&cli, &dir);

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &dir, shell),
        Commands::Clean => commands::clean::execute(&dir, shell),
        Commands::Init(args) => commands::init::execute(args, &dir, shell),
        Commands::Graph(args) => commands::graph::execute(args, &dir, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// `-v` and `-q` win; otherwise the manifest's `[stats] level` applies.
/// `RUST_LOG` overrides both.
fn init_logging(cli: &Cli, dir: &Path) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        stats_level(dir).unwrap_or("error")
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kpack={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

// Errors loading the manifest are reported by the command itself.
fn stats_level(dir: &Path) -> Option<&'static str> {
    let path: PathBuf = find_manifest(dir)?;
    let manifest = Manifest::load(&path).ok()?;
    Some(manifest.stats.level.as_filter())
}
