//! Core data structures: the manifest schema and the project it belongs to.

pub mod manifest;
pub mod project;

pub use manifest::{BuildMode, CopyRule, LogLevel, Manifest, StatsLevel, WasmConfig, MANIFEST_NAME};
pub use project::{find_manifest, Project};
