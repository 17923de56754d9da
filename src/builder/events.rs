//! Build event types for JSON output.
//!
//! These events are emitted, one JSON object per line on stdout, when using
//! `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: the build has validated its inputs
//! - `native-compiled`: the WebAssembly loader and binary are ready
//! - `assets-copied`: every copy rule has run
//! - `bundle-emitted`: the bundle file was written
//! - `build-finished`: build completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::builder::copy::CopyReport;

/// A build event emitted during the build process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum BuildEvent {
    BuildStarted {
        /// Entry module
        entry: PathBuf,
        /// Bundle file that will be written
        output: PathBuf,
        /// Native build mode, absent when there is no native step
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },

    NativeCompiled {
        crate_name: String,
        loader: PathBuf,
        wasm: PathBuf,
        /// True when the fingerprint matched and the compiler was not run
        fresh: bool,
    },

    AssetsCopied {
        files: u64,
        bytes: u64,
        skipped: u64,
    },

    BundleEmitted {
        path: PathBuf,
        modules: usize,
        bytes: usize,
        /// Files emitted next to the bundle
        assets: Vec<String>,
    },

    BuildFinished {
        success: bool,
        /// Total build duration in milliseconds
        duration_ms: u64,
        /// Error category when the build failed
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl BuildEvent {
    pub fn started(entry: PathBuf, output: PathBuf, mode: Option<&str>) -> Self {
        BuildEvent::BuildStarted {
            entry,
            output,
            mode: mode.map(str::to_string),
        }
    }

    pub fn copied(report: &CopyReport) -> Self {
        BuildEvent::AssetsCopied {
            files: report.files,
            bytes: report.bytes,
            skipped: report.skipped,
        }
    }

    /// Create a build finished event.
    pub fn finished(success: bool, duration_ms: u64) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            error: None,
            message: None,
        }
    }

    /// Create a failed build event from the error that stopped it.
    pub fn failed(err: &anyhow::Error, duration_ms: u64) -> Self {
        let kind = err
            .chain()
            .find_map(|e| e.downcast_ref::<crate::util::KpackError>())
            .map(|k| k.kind())
            .unwrap_or("other");
        BuildEvent::BuildFinished {
            success: false,
            duration_ms,
            error: Some(kind.to_string()),
            message: Some(format!("{:#}", err)),
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
