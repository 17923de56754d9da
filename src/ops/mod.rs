//! High-level operations.
//!
//! This module contains the implementation of kpack commands.

pub mod kpack_build;
pub mod kpack_clean;
pub mod kpack_graph;
pub mod kpack_init;

pub use kpack_build::{build, BuildOptions, BuildResult};
pub use kpack_clean::clean;
pub use kpack_graph::{render_tree, resolve_graph, GraphOptions};
pub use kpack_init::{init_project, InitResult};
