//! Shared utilities

pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod process;
pub mod shell;

pub use diagnostic::{Diagnostic, KpackError};
pub use shell::Shell;
