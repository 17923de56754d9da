//! Error taxonomy and user-facing diagnostic messages.
//!
//! Every failure in a build is fatal. Library code propagates `anyhow`
//! errors whose root cause is a [`KpackError`], so the CLI can recover the
//! category and the help text when printing.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when the entry module cannot be found.
    pub const MISSING_ENTRY: &str =
        "help: Check `bundle.entry` in Kpack.toml; paths are relative to the project root";

    /// Suggestion when wasm-pack is not installed.
    pub const INSTALL_WASM_PACK: &str =
        "help: Install wasm-pack with `cargo install wasm-pack`, or set KPACK_WASM_PACK";

    /// Suggestion when the native crate has no manifest.
    pub const MISSING_CRATE_MANIFEST: &str =
        "help: Point `wasm.crate-directory` at the directory containing Cargo.toml";

    /// Suggestion when a copy source is missing.
    pub const MISSING_COPY_SOURCE: &str =
        "help: Create the directory or remove the [[copy]] rule from Kpack.toml";
}

/// The categories of build failure.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum KpackError {
    /// Bad or missing paths and options in the configuration.
    #[error("configuration error: {message}")]
    #[diagnostic(code(kpack::config))]
    Configuration {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A required input directory does not exist.
    #[error("not found: {}", path.display())]
    #[diagnostic(code(kpack::not_found))]
    NotFound {
        path: PathBuf,
        #[help]
        help: Option<String>,
    },

    /// The native toolchain failed or its inputs are unusable.
    #[error("native build failed: {message}")]
    #[diagnostic(code(kpack::native))]
    Build {
        message: String,
        /// Compiler output, passed through unmodified.
        diagnostics: Option<String>,
        #[help]
        help: Option<String>,
    },

    /// An import specifier could not be mapped to a file.
    #[error("cannot resolve `{specifier}` imported from {}", importer.display())]
    #[diagnostic(
        code(kpack::resolve),
        help("Run `kpack graph --verbose` to see how modules are being resolved")
    )]
    UnresolvedImport { specifier: String, importer: PathBuf },

    /// Filesystem read/write/permission failure.
    #[error("i/o error on {}: {source}", path.display())]
    #[diagnostic(code(kpack::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl KpackError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        KpackError::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a native build error.
    pub fn build(message: impl Into<String>) -> Self {
        KpackError::Build {
            message: message.into(),
            diagnostics: None,
            help: None,
        }
    }

    /// Create an i/o error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KpackError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a help line.
    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            KpackError::Configuration { help, .. }
            | KpackError::NotFound { help, .. }
            | KpackError::Build { help, .. } => *help = Some(text.into()),
            KpackError::UnresolvedImport { .. } | KpackError::Io { .. } => {}
        }
        self
    }

    /// Short category name, used in JSON events.
    pub fn kind(&self) -> &'static str {
        match self {
            KpackError::Configuration { .. } => "configuration",
            KpackError::NotFound { .. } => "not-found",
            KpackError::Build { .. } => "build",
            KpackError::UnresolvedImport { .. } => "unresolved-import",
            KpackError::Io { .. } => "io",
        }
    }

    /// Help text for this error, if any.
    pub fn help_text(&self) -> Option<String> {
        MietteDiagnostic::help(self).map(|h| h.to_string())
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A rendered diagnostic message with optional detail and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Verbatim block printed below the message (compiler output)
    pub detail: Option<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            detail: None,
            suggestions: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Build a diagnostic from an error chain.
    ///
    /// Compiler diagnostics and help text are pulled from the root
    /// [`KpackError`] when there is one.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut diag = Diagnostic::error(format!("{:#}", err));
        if let Some(kerr) = err.chain().find_map(|e| e.downcast_ref::<KpackError>()) {
            if let KpackError::Build {
                diagnostics: Some(output),
                ..
            } = kerr
            {
                diag = diag.with_detail(output.clone());
            }
            if let Some(help) = kerr.help_text() {
                diag = diag.with_suggestion(help);
            }
        }
        diag
    }

    /// Attach a verbatim detail block.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (color, self.severity) {
            (true, Severity::Error) => "\x1b[1;31merror\x1b[0m".to_string(),
            (true, Severity::Warning) => "\x1b[1;33mwarning\x1b[0m".to_string(),
            (false, severity) => severity.to_string(),
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref detail) = self.detail {
            output.push_str(detail);
            if !detail.ends_with('\n') {
                output.push('\n');
            }
        }

        for suggestion in &self.suggestions {
            // Suggestions already carry their `help:` prefix
            if suggestion.starts_with("help:") {
                output.push_str(&format!("{}\n", suggestion));
            } else {
                output.push_str(&format!("help: {}\n", suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
