//! Build steps: native compilation, asset copying and build events.

pub mod copy;
pub mod events;
pub mod fingerprint;
pub mod native;
pub mod wasm_pack;

pub use copy::{copy_all, destinations, CopyReport};
pub use events::BuildEvent;
pub use native::{compile_cached, NativeCompiler, NativeModule, NativeRequest};
pub use wasm_pack::WasmPack;
