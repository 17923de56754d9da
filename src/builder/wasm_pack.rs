//! wasm-pack adapter.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::native::{read_crate_name, NativeCompiler, NativeModule, NativeRequest};
use crate::core::BuildMode;
use crate::util::diagnostic::{suggestions, KpackError};
use crate::util::fs::{ensure_dir, normalize_path};
use crate::util::process::{find_executable, ProcessBuilder};

/// Environment variable naming the program to run instead of `wasm-pack`.
pub const TOOL_ENV: &str = "KPACK_WASM_PACK";

const DEFAULT_TOOL: &str = "wasm-pack";

/// Builds the crate with `wasm-pack build --target web`.
#[derive(Debug, Clone, Default)]
pub struct WasmPack {
    /// Value of [`TOOL_ENV`], read once at construction
    env_tool: Option<String>,
}

impl WasmPack {
    pub fn new() -> Self {
        WasmPack {
            env_tool: std::env::var(TOOL_ENV).ok().filter(|v| !v.is_empty()),
        }
    }

    /// Use `tool` regardless of the environment and configuration.
    pub fn with_tool(tool: impl Into<String>) -> Self {
        WasmPack {
            env_tool: Some(tool.into()),
        }
    }

    /// Locate the program: the environment override, then `wasm.tool`,
    /// then `wasm-pack` on PATH.
    fn locate(&self, request: &NativeRequest) -> Result<PathBuf> {
        let wanted = self
            .env_tool
            .as_deref()
            .or(request.tool.as_deref())
            .unwrap_or(DEFAULT_TOOL);

        let direct = PathBuf::from(wanted);
        let found = if direct.components().count() > 1 {
            let path = if direct.is_relative() {
                request.crate_dir.join(&direct)
            } else {
                direct
            };
            path.is_file().then_some(path)
        } else {
            find_executable(wanted)
        };

        found.ok_or_else(|| {
            KpackError::build(format!("`{}` not found", wanted))
                .with_help(suggestions::INSTALL_WASM_PACK)
                .into()
        })
    }

    fn command(&self, program: PathBuf, request: &NativeRequest, out_name: &str) -> ProcessBuilder {
        let profile = match request.mode {
            BuildMode::Production => "--release",
            BuildMode::Development => "--dev",
        };

        ProcessBuilder::new(program)
            .arg("build")
            .arg(&request.crate_dir)
            .args(["--target", "web"])
            .arg("--out-dir")
            .arg(&request.out_dir)
            .args(["--out-name", out_name])
            .arg(profile)
            .args(&request.extra_args)
            .cwd(&request.crate_dir)
    }
}

impl NativeCompiler for WasmPack {
    fn name(&self) -> &str {
        DEFAULT_TOOL
    }

    fn compile(&self, request: &NativeRequest) -> Result<NativeModule> {
        let crate_name = read_crate_name(&request.crate_dir)?;
        let program = self.locate(request)?;
        let out_name = request.out_name_for(&crate_name);

        ensure_dir(&request.out_dir)?;
        let request = NativeRequest {
            crate_dir: normalize_path(&request.crate_dir),
            out_dir: normalize_path(&request.out_dir),
            ..request.clone()
        };

        let cmd = self.command(program, &request, &out_name);
        let output = cmd.exec()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let status = match output.status.code() {
                Some(code) => format!("exit status {}", code),
                None => "a signal".to_string(),
            };
            return Err(KpackError::Build {
                message: format!(
                    "`{}` failed for crate `{}` with {}",
                    cmd.display_command(),
                    crate_name,
                    status
                ),
                diagnostics: Some(stderr.into_owned()).filter(|s| !s.trim().is_empty()),
                help: None,
            }
            .into());
        }

        tracing::debug!("{} stdout:\n{}", DEFAULT_TOOL, stdout);
        tracing::debug!("{} stderr:\n{}", DEFAULT_TOOL, stderr);

        let (loader, wasm) = request.outputs_for(&crate_name);
        for expected in [&loader, &wasm] {
            if !expected.is_file() {
                return Err(KpackError::build(format!(
                    "`{}` succeeded but did not produce {}",
                    DEFAULT_TOOL,
                    expected.display()
                ))
                .into());
            }
        }

        Ok(NativeModule {
            crate_name,
            loader,
            wasm,
            fresh: false,
        })
    }
}
