//! Compiler error types.
//!
//! This module defines [`CompileError`] and [`CompileResult`] for expression
//! compilation error handling.

use std::fmt;

/// Error types for expression compilation
///
/// Every failure is local to one compilation attempt: the function table is
/// only mutated after a fully successful compile, so none of these leave
/// partial state behind.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// An application names a function absent from the table. Resolution
    /// happens at compile time, so forward and recursive references are
    /// reported through this variant as well.
    UnresolvedName(String),

    /// An operator the backend cannot lower. The operator enums are closed,
    /// so this is unreachable from a conforming tree; it exists so the
    /// compiler fails gracefully instead of crashing if the grammar grows.
    UnsupportedOperation(&'static str),

    /// Cranelift rejected the function during definition or finalization.
    /// Fatal for this one compilation only.
    Backend(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnresolvedName(name) => {
                write!(f, "function name '{}' could not be resolved", name)
            }
            CompileError::UnsupportedOperation(op) => {
                write!(f, "operation '{}' is not supported", op)
            }
            CompileError::Backend(msg) => write!(f, "code generation failed: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
