//! Function table: the only state that persists across compilations.
//!
//! A [`FunctionTable`] maps case-sensitive names to [`CompiledFunction`]s.
//! Entries are added only on successful compilation of a named definition
//! (or by [`install_builtins`]); nothing is ever removed during a session.
//! Redefinition silently replaces the entry: future compilations resolve to
//! the new code, while callables compiled earlier keep the old code alive
//! through their own memory handles.
//!
//! [`install_builtins`]: FunctionTable::install_builtins

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

use cranelift_jit::JITModule;
use tracing::debug;

use super::runtime;

/// Owner of one finalized JIT module's code memory.
///
/// The executable pages stay mapped until this value drops, so any
/// [`CompiledFunction`] holding an `Arc` to it can be invoked safely.
pub(crate) struct JitMemory {
    module: Option<JITModule>,
}

impl JitMemory {
    pub(crate) fn new(module: JITModule) -> Self {
        JitMemory {
            module: Some(module),
        }
    }
}

impl Drop for JitMemory {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // No entry pointer into this module can outlive the Arc that
            // owns it, so the pages are unreachable here.
            unsafe { module.free_memory() };
        }
    }
}

impl fmt::Debug for JitMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JitMemory")
    }
}

/// A native, directly callable function of one `f32` argument.
///
/// Cloning is cheap: clones share the underlying code memory. The callable
/// owns (via `Arc`) every JIT module whose code it can reach, including the
/// modules of functions it calls, so it remains valid across redefinitions
/// of its callees and after the table that produced it is gone.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    entry: *const u8,
    memory: Vec<Arc<JitMemory>>,
}

impl CompiledFunction {
    pub(crate) fn new(entry: *const u8, memory: Vec<Arc<JitMemory>>) -> Self {
        CompiledFunction { entry, memory }
    }

    /// Wrap a host `extern "C"` function as a table entry. Call sites in
    /// generated code cannot tell host functions from compiled ones.
    pub fn from_host(f: extern "C" fn(f32) -> f32) -> Self {
        CompiledFunction {
            entry: f as *const u8,
            memory: Vec::new(),
        }
    }

    /// Invoke the compiled code.
    pub fn call(&self, x: f32) -> f32 {
        // entry points at finalized code with the fixed (f32) -> f32
        // signature; self.memory keeps its pages mapped.
        let f: extern "C" fn(f32) -> f32 = unsafe { mem::transmute(self.entry) };
        f(x)
    }

    pub(crate) fn entry(&self) -> *const u8 {
        self.entry
    }

    pub(crate) fn memory(&self) -> &[Arc<JitMemory>] {
        &self.memory
    }
}

/// Mapping from function name to compiled callable
///
/// Lookups take a shared reference and insertion takes an exclusive one,
/// so a compilation holding the table immutably can never observe a
/// partially inserted entry.
#[derive(Debug, Default)]
pub struct FunctionTable {
    entries: HashMap<String, CompiledFunction>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable {
            entries: HashMap::new(),
        }
    }

    /// A table pre-populated with the built-in math functions.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.install_builtins();
        table
    }

    /// Register the built-in host functions: `Sin`, `Cos`, `Tan`, `Log`
    /// (natural), `Sqrt`, `Exp`.
    pub fn install_builtins(&mut self) {
        let builtins: [(&str, extern "C" fn(f32) -> f32); 6] = [
            ("Sin", runtime::host_sin),
            ("Cos", runtime::host_cos),
            ("Tan", runtime::host_tan),
            ("Log", runtime::host_log),
            ("Sqrt", runtime::host_sqrt),
            ("Exp", runtime::host_exp),
        ];
        for (name, f) in builtins {
            self.insert(name.to_string(), CompiledFunction::from_host(f));
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&CompiledFunction> {
        self.entries.get(name)
    }

    /// Insert a compiled function, silently replacing any prior entry.
    pub fn insert(&mut self, name: String, function: CompiledFunction) {
        debug!(target: "funcalc::jit::table", %name, "function defined");
        self.entries.insert(name, function);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
