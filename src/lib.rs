//! kpack - a bundler for a browser front-end backed by a Rust crate
//! compiled to WebAssembly.
//!
//! The library resolves and bundles the JavaScript module graph, mirrors
//! static files into the output directory and drives `wasm-pack` for the
//! native module. The `kpack` binary is a thin layer over [`ops`].

pub mod builder;
pub mod bundler;
pub mod core;
pub mod ops;
pub mod util;

pub use crate::core::{Manifest, Project};
pub use util::diagnostic::KpackError;
