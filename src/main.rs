/// funcalc - JIT calculator CLI
use funcalc::eval::{EvalOutcome, Session};
use funcalc::parser::parse_line;
use funcalc::repl;
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("funcalc v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    funcalc [OPTIONS] <INPUT>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -v, --version        Print version information");
    eprintln!("    -o, --output <FILE>  Write output to FILE (default: stdout)");
    eprintln!("    --at <X>             Evaluate anonymous expressions at x = X (default: 0)");
    eprintln!("    --ast                Print parsed trees instead of evaluating");
    eprintln!("    --repl               Start interactive REPL");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <INPUT>              Input file, one statement per line (use '-' for stdin)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    funcalc program.fc");
    eprintln!("    funcalc --repl");
    eprintln!("    funcalc --at 2.5 program.fc");
    eprintln!("    echo 'Sqrt(2)' | funcalc -");
}

fn print_version() {
    println!("funcalc {}", VERSION);
}

struct Options {
    input: Option<String>,
    output: Option<String>,
    at: f32,
    show_ast: bool,
    repl_mode: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut input = None;
    let mut output = None;
    let mut at = 0.0f32;
    let mut show_ast = false;
    let mut repl_mode = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing output file after -o".to_string());
                }
                output = Some(args[i].clone());
            }
            "--at" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value after --at".to_string());
                }
                at = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid value for --at: {}", args[i]))?;
            }
            "--ast" => {
                show_ast = true;
            }
            "--repl" => {
                repl_mode = true;
            }
            arg if arg.starts_with('-') && arg != "-" => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if input.is_some() {
                    return Err("Multiple input files specified".to_string());
                }
                input = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(Options {
        input,
        output,
        at,
        show_ast,
        repl_mode,
    })
}

fn read_input(input: &str) -> Result<String, String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        Ok(buffer)
    } else {
        let path = Path::new(input);
        if !path.exists() {
            return Err(format!("Input file not found: {}", input));
        }
        fs::read_to_string(path).map_err(|e| format!("Failed to read file '{}': {}", input, e))
    }
}

fn write_output(output: Option<&str>, content: &str) -> Result<(), String> {
    match output {
        Some(path) => {
            let mut file = fs::File::create(path)
                .map_err(|e| format!("Failed to create output file '{}': {}", path, e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write to output file '{}': {}", path, e))?;
            Ok(())
        }
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

/// Evaluate a whole program, one statement per line. Failed lines get one
/// diagnostic on stderr each and never stop the run.
fn eval_program(source: &str, options: &Options) -> Result<String, String> {
    let mut session = Session::new().map_err(|e| format!("Failed to start JIT session: {}", e))?;
    let mut output = String::new();

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let stmt = match parse_line(line) {
            Ok(stmt) => stmt,
            Err(errors) => {
                for e in errors {
                    eprintln!("Parser error: {}", e);
                }
                continue;
            }
        };

        if options.show_ast {
            output.push_str(&format!("{}\n", stmt.expr));
            continue;
        }

        match session.eval_statement(&stmt, options.at) {
            Ok(EvalOutcome::Defined(name)) => {
                output.push_str(&format!("{}(x) = {}\n", name, stmt.expr));
            }
            Ok(EvalOutcome::Value(value)) => {
                output.push_str(&format!("{} = {:.4}\n", stmt.expr, value));
            }
            Err(e) => {
                eprintln!("Error: {}", e);
            }
        }
    }

    Ok(output)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if options.repl_mode {
        repl::run(options.at);
        return;
    }

    if options.input.is_none() {
        eprintln!("Error: Missing input file");
        eprintln!();
        print_usage();
        process::exit(1);
    }

    let source = match read_input(options.input.as_ref().unwrap()) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let output = match eval_program(&source, &options) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_output(options.output.as_deref(), &output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
