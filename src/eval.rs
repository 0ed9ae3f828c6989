/// Evaluation facade
///
/// Orchestrates one input line's journey after parsing: compile the tree
/// against the session's function table, then either store the callable
/// under the supplied name or invoke it once and report the value. Every
/// failure is surfaced as a [`CompileError`] and leaves the table exactly
/// as it was; the tree itself is owned by the caller and dropped after use
/// whatever the outcome.
use crate::ast::Expr;
use crate::jit::{CompileError, CompileResult, ExprCompiler, FunctionTable};
use crate::parser::Statement;

/// Successful result of evaluating one statement
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    /// A named definition was compiled and stored
    Defined(String),
    /// An anonymous expression was compiled, invoked once, and discarded
    Value(f32),
}

/// Compile a tree and either store it under `name` or invoke it at `input`.
///
/// The REPL passes `input = 0`; an interactive caller sampling a function
/// supplies its own value. The one-shot callable for an anonymous
/// expression drops before this returns, releasing its code memory.
pub fn compile_and_eval(
    expr: &Expr,
    name: Option<&str>,
    compiler: &mut ExprCompiler,
    table: &mut FunctionTable,
    input: f32,
) -> CompileResult<EvalOutcome> {
    let function = compiler.compile(expr, table)?;

    match name {
        Some(name) => {
            table.insert(name.to_string(), function);
            Ok(EvalOutcome::Defined(name.to_string()))
        }
        None => Ok(EvalOutcome::Value(function.call(input))),
    }
}

/// One interactive session: a compiler plus its function table.
///
/// Built-ins are installed at creation. Dropping the session releases the
/// code memory of every function still reachable only through the table.
pub struct Session {
    compiler: ExprCompiler,
    table: FunctionTable,
}

impl Session {
    pub fn new() -> CompileResult<Self> {
        Ok(Session {
            compiler: ExprCompiler::new()?,
            table: FunctionTable::with_builtins(),
        })
    }

    /// Evaluate one parsed statement, invoking anonymous expressions at
    /// `input`.
    pub fn eval_statement(&mut self, stmt: &Statement, input: f32) -> CompileResult<EvalOutcome> {
        compile_and_eval(
            &stmt.expr,
            stmt.name.as_deref(),
            &mut self.compiler,
            &mut self.table,
            input,
        )
    }

    pub fn table(&self) -> &FunctionTable {
        &self.table
    }
}
