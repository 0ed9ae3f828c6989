//! Interactive REPL
//!
//! Reads one statement per line, evaluates it through a [`Session`], and
//! keeps going whatever happens: every failure yields exactly one message
//! and the loop continues. Line history persists across runs in the user's
//! home directory.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

use crate::eval::{EvalOutcome, Session};
use crate::parser::parse_line;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".funcalc_history"))
}

/// Run the interactive loop, invoking anonymous expressions at `input`.
pub fn run(input: f32) {
    let mut session = match Session::new() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: failed to start JIT session: {}", e);
            return;
        }
    };

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error: failed to start line editor: {}", e);
            return;
        }
    };

    let history = history_path();
    if let Some(path) = &history {
        // Missing history file on first run is expected
        let _ = editor.load_history(path);
    }

    println!("funcalc v{}", VERSION);
    println!("Define functions ('F = 2*x + 1') or evaluate expressions ('F(3)').");
    println!("Type ':fns' to list defined functions, 'exit' to leave.\n");

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        if trimmed == "exit" || trimmed == "quit" {
            break;
        }

        if trimmed == ":fns" {
            let mut names: Vec<&str> = session.table().names().collect();
            names.sort_unstable();
            for name in names {
                println!("  {}", name);
            }
            continue;
        }

        let stmt = match parse_line(trimmed) {
            Ok(stmt) => stmt,
            Err(errors) => {
                for e in errors {
                    eprintln!("Parser error: {}", e);
                }
                continue;
            }
        };

        match session.eval_statement(&stmt, input) {
            Ok(EvalOutcome::Defined(name)) => {
                println!("{}(x) = {}", name, stmt.expr);
            }
            Ok(EvalOutcome::Value(value)) => {
                println!("{} = {:.4}", stmt.expr, value);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
            }
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }
}
