//! Host primitives callable from generated code.
//!
//! Generated functions stay inside pure register arithmetic except where a
//! primitive has no single instruction in the target ISA family. Those
//! primitives live here as `extern "C"` functions: the absolute-value
//! routine the code generator imports as a JIT symbol, and the built-in
//! math functions that [`FunctionTable::install_builtins`] registers as
//! ordinary table entries.
//!
//! [`FunctionTable::install_builtins`]: super::table::FunctionTable::install_builtins

/// Absolute value at double precision.
///
/// The code generator widens the f32 working value before this call and
/// narrows the result afterwards.
pub extern "C" fn host_fabs(x: f64) -> f64 {
    x.abs()
}

pub extern "C" fn host_sin(x: f32) -> f32 {
    x.sin()
}

pub extern "C" fn host_cos(x: f32) -> f32 {
    x.cos()
}

pub extern "C" fn host_tan(x: f32) -> f32 {
    x.tan()
}

/// Natural logarithm.
pub extern "C" fn host_log(x: f32) -> f32 {
    x.ln()
}

pub extern "C" fn host_sqrt(x: f32) -> f32 {
    x.sqrt()
}

pub extern "C" fn host_exp(x: f32) -> f32 {
    x.exp()
}
