//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use kpack::core::BuildMode;
use kpack::util::shell::ColorChoice;

/// kpack - bundle a browser front-end and its WebAssembly crate
#[derive(Parser)]
#[command(name = "kpack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print every status line and debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring of status lines and diagnostics
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ColorChoice::Auto,
        env = "KPACK_COLOR"
    )]
    pub color: ColorChoice,

    /// Output format for build progress
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    /// Directory to search for Kpack.toml (defaults to the current directory)
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub manifest_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the native crate, bundle the entry module and copy static files
    Build(BuildArgs),

    /// Remove the output directories and build state
    Clean,

    /// Write a default Kpack.toml in the current directory
    Init(InitArgs),

    /// Print the module graph reachable from the entry
    Graph(GraphArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Recompile the native crate even if nothing changed
    #[arg(long)]
    pub force: bool,

    /// Override `wasm.mode` from the manifest
    #[arg(long, value_enum)]
    pub mode: Option<BuildMode>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Bundle name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Maximum depth to display
    #[arg(short, long)]
    pub depth: Option<usize>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

impl Cli {
    pub fn json(&self) -> bool {
        self.message_format == MessageFormat::Json
    }
}
