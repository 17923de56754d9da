//! Native (WebAssembly) module compilation.
//!
//! The build depends on the [`NativeCompiler`] trait rather than on
//! wasm-pack directly; [`crate::builder::wasm_pack::WasmPack`] is the real
//! implementation. [`compile_cached`] wraps any compiler with the
//! fingerprint check.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::builder::fingerprint::{NativeFingerprint, FINGERPRINT_FILE};
use crate::core::{BuildMode, WasmConfig};
use crate::util::diagnostic::{suggestions, KpackError};

/// Everything a compiler needs to build the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRequest {
    /// Directory containing Cargo.toml
    pub crate_dir: PathBuf,
    /// Absolute output directory
    pub out_dir: PathBuf,
    /// Base name of the outputs; the crate name in snake_case when unset
    pub out_name: Option<String>,
    pub mode: BuildMode,
    pub extra_args: Vec<String>,
    /// Compiler program override
    pub tool: Option<String>,
    /// Directories inside the crate that are outputs, not inputs
    pub exclude: Vec<PathBuf>,
}

impl NativeRequest {
    /// Build a request from the `[wasm]` table of a project rooted at `root`.
    pub fn from_config(root: &Path, config: &WasmConfig) -> Self {
        let crate_dir = root.join(&config.crate_directory);
        NativeRequest {
            out_dir: crate_dir.join(&config.out_dir),
            crate_dir,
            out_name: config.out_name.clone(),
            mode: config.mode,
            extra_args: config.extra_args.clone(),
            tool: config.tool.clone(),
            exclude: Vec::new(),
        }
    }

    /// Leave `dirs` out of the fingerprint.
    pub fn with_exclude(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.exclude.extend(dirs);
        self
    }

    /// Output base name for a crate.
    pub fn out_name_for(&self, crate_name: &str) -> String {
        self.out_name
            .clone()
            .unwrap_or_else(|| snake_case(crate_name))
    }

    /// Expected (loader, binary) paths for a crate.
    pub fn outputs_for(&self, crate_name: &str) -> (PathBuf, PathBuf) {
        let name = self.out_name_for(crate_name);
        (
            self.out_dir.join(format!("{}.js", name)),
            self.out_dir.join(format!("{}_bg.wasm", name)),
        )
    }
}

/// A compiled native module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeModule {
    pub crate_name: String,
    /// JavaScript loader generated for the binary
    pub loader: PathBuf,
    pub wasm: PathBuf,
    /// Whether the outputs were reused without running the compiler
    pub fresh: bool,
}

impl NativeModule {
    /// Bare specifiers the loader is importable under.
    pub fn specifiers(&self) -> Vec<String> {
        let mut names = vec![self.crate_name.clone()];
        let snake = snake_case(&self.crate_name);
        if snake != self.crate_name {
            names.push(snake);
        }
        names
    }
}

/// Something that turns a crate into a WebAssembly binary and loader.
pub trait NativeCompiler: Send + Sync {
    /// Short name used in status output.
    fn name(&self) -> &str;

    fn compile(&self, request: &NativeRequest) -> Result<NativeModule>;
}

/// Run `compiler` unless the stored fingerprint matches and the outputs
/// are still on disk.
pub fn compile_cached(
    compiler: &dyn NativeCompiler,
    request: &NativeRequest,
    state_dir: &Path,
    force: bool,
) -> Result<NativeModule> {
    let crate_name = read_crate_name(&request.crate_dir)?;
    let fingerprint_path = state_dir.join(FINGERPRINT_FILE);
    let current = NativeFingerprint::compute(request)?;

    if !force {
        let (loader, wasm) = request.outputs_for(&crate_name);
        let stored = NativeFingerprint::load(&fingerprint_path);
        if stored.is_some_and(|s| s.matches(&current)) && loader.is_file() && wasm.is_file() {
            debug!("native crate `{}` is fresh", crate_name);
            return Ok(NativeModule {
                crate_name,
                loader,
                wasm,
                fresh: true,
            });
        }
    }

    info!("compiling native crate `{}` with {}", crate_name, compiler.name());
    let module = compiler.compile(request)?;
    current.save(&fingerprint_path)?;
    Ok(module)
}

/// Read `[package] name` from the crate's Cargo.toml.
pub fn read_crate_name(crate_dir: &Path) -> Result<String> {
    let manifest = crate_dir.join("Cargo.toml");
    if !manifest.is_file() {
        return Err(KpackError::build(format!(
            "no Cargo.toml in native crate directory `{}`",
            crate_dir.display()
        ))
        .with_help(suggestions::MISSING_CRATE_MANIFEST)
        .into());
    }

    let contents = crate::util::fs::read_to_string(&manifest)?;
    let value: toml::Table = toml::from_str(&contents).map_err(|e| {
        KpackError::build(format!("invalid {}: {}", manifest.display(), e.message()))
    })?;

    value
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            KpackError::build(format!("{} has no `[package] name`", manifest.display())).into()
        })
}

/// `kp-chart` -> `kp_chart`
pub fn snake_case(name: &str) -> String {
    name.replace('-', "_")
}
