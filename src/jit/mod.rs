//! Cranelift JIT backend
//!
//! This module turns expression trees into directly callable native
//! functions with the fixed signature `fn(f32) -> f32`.
//!
//! # Modules
//!
//! - [`compiler`]: tree-to-Cranelift-IR translation and finalization
//! - [`table`]: the per-session table of named compiled functions
//! - [`runtime`]: host primitives callable from generated code
//! - [`error`]: [`CompileError`] and [`CompileResult`]

pub mod compiler;
pub mod error;
pub mod runtime;
pub mod table;

// Re-export main types
pub use compiler::ExprCompiler;
pub use error::{CompileError, CompileResult};
pub use table::{CompiledFunction, FunctionTable};
