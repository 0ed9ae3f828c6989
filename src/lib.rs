/// funcalc - JIT Calculator Library
///
/// This library compiles arithmetic expressions over one free variable into
/// directly callable native functions, and lets later expressions invoke
/// earlier definitions by name.
///
/// # Architecture
///
/// The pipeline has three stages:
///
/// 1. **Lexing & Parsing** (`parser` module)
///    - Tokenizes one input line and parses it into an expression tree
///    - Extracts the optional definition name (`F = ...`)
///    - Reports every diagnostic for a bad line; bad lines never reach
///      the compiler
///
/// 2. **JIT Compilation** (`jit` module)
///    - Walks the tree once, post-order, emitting Cranelift IR with a
///      single current value and one spill slot per binary node
///    - Resolves function applications at compile time against the
///      session's function table (so no forward or recursive references)
///    - Finalizes each expression into its own native code region
///
/// 3. **Evaluation** (`eval` module)
///    - Stores named definitions in the function table, or invokes
///      anonymous expressions once and discards them
///
/// # Example
///
/// ```rust
/// use funcalc::eval::{EvalOutcome, Session};
/// use funcalc::parser::parse_line;
///
/// let mut session = Session::new().unwrap();
///
/// // Define a function, then call it
/// let def = parse_line("F = 2*x + 1").unwrap();
/// session.eval_statement(&def, 0.0).unwrap();
///
/// let call = parse_line("F(3)").unwrap();
/// let outcome = session.eval_statement(&call, 0.0).unwrap();
/// assert_eq!(outcome, EvalOutcome::Value(7.0));
/// ```
///
/// # Language
///
/// - **Definition**: `Name = expr` - compile `expr` and store it under `Name`
/// - **Evaluation**: `expr` - compile, invoke once, print the value
/// - **Grammar**: constants, the variable `x`, `-` and `| |` unary, the four
///   arithmetic operators, and `Name(arg)` application
/// - **Built-ins**: `Sin`, `Cos`, `Tan`, `Log`, `Sqrt`, `Exp`
///
/// Redefining a name replaces it for future compilations only; functions
/// compiled against the old definition keep working.
pub mod ast;
pub mod eval;
pub mod jit;
pub mod parser;
pub mod repl;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::{compile_and_eval, EvalOutcome, Session};
pub use jit::{CompileError, CompileResult, CompiledFunction, ExprCompiler, FunctionTable};
pub use parser::{parse_line, Lexer, ParseError, Parser, Statement, Token};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let result = parse_line("1 + 2");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_and_eval_arithmetic() {
        let stmt = parse_line("10 + 20").unwrap();
        let mut session = Session::new().unwrap();
        let outcome = session.eval_statement(&stmt, 0.0).unwrap();
        assert_eq!(outcome, EvalOutcome::Value(30.0));
    }

    #[test]
    fn test_definition_and_call() {
        let mut session = Session::new().unwrap();

        let def = parse_line("Double = 2 * x").unwrap();
        let outcome = session.eval_statement(&def, 0.0).unwrap();
        assert_eq!(outcome, EvalOutcome::Defined("Double".to_string()));

        let call = parse_line("Double(21)").unwrap();
        let outcome = session.eval_statement(&call, 0.0).unwrap();
        assert_eq!(outcome, EvalOutcome::Value(42.0));
    }
}
