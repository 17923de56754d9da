//! Kpack.toml manifest parsing and schema.
//!
//! The manifest describes one build pass: the entry module, where the
//! bundle goes, which static directories are mirrored, and the native
//! crate compiled with wasm-pack. A project without a manifest builds with
//! [`Manifest::default`], which is the kp-chart layout.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::util::diagnostic::KpackError;

/// Canonical manifest filename.
pub const MANIFEST_NAME: &str = "Kpack.toml";

/// The parsed Kpack.toml manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Entry module and bundle name
    #[serde(default)]
    pub bundle: BundleConfig,

    /// Output location
    #[serde(default)]
    pub output: OutputConfig,

    /// Diagnostic verbosity
    #[serde(default)]
    pub stats: StatsConfig,

    /// Static directories to mirror into the output
    #[serde(default)]
    pub copy: Vec<CopyRule>,

    /// Native crate compiled to WebAssembly (absent = no native step)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasm: Option<WasmConfig>,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            bundle: BundleConfig::default(),
            output: OutputConfig::default(),
            stats: StatsConfig::default(),
            copy: vec![CopyRule {
                from: PathBuf::from("static"),
                to: PathBuf::from("dist"),
                log_level: LogLevel::Warn,
                ignore: Vec::new(),
            }],
            wasm: Some(WasmConfig::default()),
        }
    }
}

/// `[bundle]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    /// Bundle name, used in the banner
    #[serde(default = "default_bundle_name")]
    pub name: String,

    /// Entry module, relative to the project root
    #[serde(default = "default_entry")]
    pub entry: PathBuf,
}

fn default_bundle_name() -> String {
    "kp-chart".to_string()
}

fn default_entry() -> PathBuf {
    PathBuf::from("js/index.js")
}

impl Default for BundleConfig {
    fn default() -> Self {
        BundleConfig {
            name: default_bundle_name(),
            entry: default_entry(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory, relative to the project root
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Bundle filename, used verbatim
    #[serde(default = "default_filename")]
    pub filename: String,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("dist")
}

fn default_filename() -> String {
    "kp-chart.js".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            path: default_output_path(),
            filename: default_filename(),
        }
    }
}

/// `[stats]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsConfig {
    #[serde(default)]
    pub level: StatsLevel,
}

/// How much the build reports about itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatsLevel {
    #[default]
    ErrorsOnly,
    ErrorsWarnings,
    Normal,
    Verbose,
}

impl StatsLevel {
    /// The `tracing` level this stats level maps to.
    pub fn as_filter(&self) -> &'static str {
        match self {
            StatsLevel::ErrorsOnly => "error",
            StatsLevel::ErrorsWarnings => "warn",
            StatsLevel::Normal => "info",
            StatsLevel::Verbose => "debug",
        }
    }
}

/// One `[[copy]]` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CopyRule {
    /// Source directory, relative to the project root
    pub from: PathBuf,

    /// Destination directory, relative to the project root
    pub to: PathBuf,

    /// Verbosity of this rule's own reporting
    #[serde(default)]
    pub log_level: LogLevel,

    /// Glob patterns (relative to `from`) of files to skip
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

/// Per-step log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
}

/// `[wasm]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct WasmConfig {
    /// Directory containing the crate's Cargo.toml
    #[serde(default = "default_crate_directory")]
    pub crate_directory: PathBuf,

    /// Where wasm-pack writes its output, relative to the crate directory
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Base name of the generated files (defaults to the crate name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_name: Option<String>,

    #[serde(default)]
    pub mode: BuildMode,

    /// Extra arguments appended to the wasm-pack invocation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Program used instead of `wasm-pack`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

fn default_crate_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("pkg")
}

impl Default for WasmConfig {
    fn default() -> Self {
        WasmConfig {
            crate_directory: default_crate_directory(),
            out_dir: default_out_dir(),
            out_name: None,
            mode: BuildMode::default(),
            extra_args: Vec::new(),
            tool: None,
        }
    }
}

/// wasm-pack profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    #[default]
    Production,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

impl Manifest {
    /// Load and validate a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = crate::util::fs::read_to_string(path)?;
        let manifest = Self::parse(&contents).map_err(|e| match e.downcast::<KpackError>() {
            Ok(KpackError::Configuration { message, help }) => KpackError::Configuration {
                message: format!("{}: {}", path.display(), message),
                help,
            }
            .into(),
            Ok(other) => anyhow::Error::new(other),
            Err(other) => other,
        })?;
        Ok(manifest)
    }

    /// Parse and validate manifest text.
    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(contents)
            .map_err(|e| KpackError::config(format!("invalid manifest: {}", e.message())))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.bundle.entry.as_os_str().is_empty() {
            return Err(KpackError::config("`bundle.entry` must not be empty").into());
        }

        let filename = &self.output.filename;
        if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(KpackError::config(format!(
                "`output.filename` must be a plain file name, got `{}`",
                filename
            ))
            .into());
        }

        for rule in &self.copy {
            for pattern in &rule.ignore {
                glob::Pattern::new(pattern).map_err(|e| {
                    KpackError::config(format!(
                        "invalid ignore pattern `{}` in copy rule `{}`: {}",
                        pattern,
                        rule.from.display(),
                        e
                    ))
                })?;
            }
        }

        if let Some(wasm) = &self.wasm {
            if let Some(name) = &wasm.out_name {
                if name.is_empty() || name.contains('/') || name.contains('\\') {
                    return Err(KpackError::config(format!(
                        "`wasm.out-name` must be a plain file stem, got `{}`",
                        name
                    ))
                    .into());
                }
            }
        }

        Ok(())
    }
}

/// Manifest written by `kpack init`.
pub fn generate_manifest(name: &str) -> String {
    format!(
        r#"[bundle]
name = "{name}"
entry = "js/index.js"

[output]
path = "dist"
filename = "{name}.js"

[stats]
level = "errors-only"

[[copy]]
from = "static"
to = "dist"
log-level = "warn"

[wasm]
crate-directory = "."
out-dir = "pkg"
mode = "production"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_manifest_matches_defaults() {
        let parsed = Manifest::parse(&generate_manifest("kp-chart")).unwrap();
        assert_eq!(parsed, Manifest::default());
    }

    #[test]
    fn test_omitted_sections() {
        let manifest = Manifest::parse("[bundle]\nentry = \"src/main.js\"\n").unwrap();
        assert_eq!(manifest.bundle.entry, PathBuf::from("src/main.js"));
        assert_eq!(manifest.bundle.name, "kp-chart");
        assert_eq!(manifest.output, OutputConfig::default());
        assert!(manifest.copy.is_empty());
        assert!(manifest.wasm.is_none());
    }

    #[test]
    fn test_copy_rule_options() {
        let manifest = Manifest::parse(
            r#"
[[copy]]
from = "static"
to = "dist"
log-level = "debug"
ignore = ["*.map", "drafts/**"]
"#,
        )
        .unwrap();

        assert_eq!(manifest.copy.len(), 1);
        assert_eq!(manifest.copy[0].log_level, LogLevel::Debug);
        assert_eq!(manifest.copy[0].ignore, vec!["*.map", "drafts/**"]);
    }

    #[test]
    fn test_wasm_options() {
        let manifest = Manifest::parse(
            r#"
[wasm]
crate-directory = "crates/chart"
out-name = "chart"
mode = "development"
extra-args = ["--no-typescript"]
"#,
        )
        .unwrap();

        let wasm = manifest.wasm.unwrap();
        assert_eq!(wasm.crate_directory, PathBuf::from("crates/chart"));
        assert_eq!(wasm.out_dir, PathBuf::from("pkg"));
        assert_eq!(wasm.out_name.as_deref(), Some("chart"));
        assert_eq!(wasm.mode, BuildMode::Development);
        assert_eq!(wasm.extra_args, vec!["--no-typescript"]);
    }

    #[test]
    fn test_unknown_keys_are_configuration_errors() {
        let err = Manifest::parse("[output]\nfilenme = \"x.js\"\n").unwrap_err();
        let kerr = err.downcast_ref::<KpackError>().unwrap();
        assert_eq!(kerr.kind(), "configuration");
        assert!(err.to_string().contains("filenme"));
    }

    #[test]
    fn test_filename_must_be_plain() {
        assert!(Manifest::parse("[output]\nfilename = \"js/kp-chart.js\"\n").is_err());
        assert!(Manifest::parse("[output]\nfilename = \"\"\n").is_err());
    }

    #[test]
    fn test_invalid_ignore_glob() {
        let err = Manifest::parse(
            "[[copy]]\nfrom = \"static\"\nto = \"dist\"\nignore = [\"[\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid ignore pattern"));
    }

    #[test]
    fn test_stats_levels() {
        let manifest = Manifest::parse("[stats]\nlevel = \"errors-warnings\"\n").unwrap();
        assert_eq!(manifest.stats.level.as_filter(), "warn");
        assert_eq!(StatsLevel::default().as_filter(), "error");
    }

    #[test]
    fn test_load_prefixes_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_NAME);
        std::fs::write(&path, "[bundle]\nentry = 3\n").unwrap();

        let err = Manifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("Kpack.toml"));
    }
}
