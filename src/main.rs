use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use fig::ast::Value;
use fig::evaluator::procedure::ProcedureKind;
use fig::evaluator::{self, Environment};
use fig::scheme::{ParseConfig, Reader};
use fig::{Error, ParseErrorKind};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

#[derive(Parser, Debug)]
#[command(name = "fig")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interpreter for the fig Lisp dialect", long_about = None)]
struct Args {
    /// Source file to run; starts an interactive session when omitted
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Treat ';' as an ordinary (invalid) character instead of a comment
    #[arg(long = "no-comments")]
    no_comments: bool,

    /// Log reader and evaluator activity to stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.files.len() > 1 {
        eprintln!("Usage: fig [argfile]");
        process::exit(1);
    }

    let config = ParseConfig {
        handle_comments: !args.no_comments,
    };
    let env = evaluator::create_global_env();

    let status = match args.files.first() {
        Some(path) => run_file(path, &env, config),
        None => run_repl(&env, config),
    };
    process::exit(status);
}

/// Install a stderr subscriber when `--verbose` is given or `RUST_LOG` is set
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = if verbose {
        EnvFilter::new("fig=debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}

/// Evaluate one form, reporting errors. Returns the exit status if the
/// program asked to terminate.
fn eval_and_report(form: Result<Value, Error>, env: &Environment, echo: bool) -> Option<i32> {
    match form.and_then(|expr| evaluator::eval(&expr, env)) {
        Ok(result) => {
            // Don't print Unspecified values (e.g., from define)
            if echo && !matches!(result, Value::Unspecified) {
                println!("{result}");
            }
            None
        }
        Err(Error::Exit(status)) => Some(status),
        Err(e) => {
            eprintln!("fig error: {e}");
            None
        }
    }
}

fn run_file(path: &Path, env: &Environment, config: ParseConfig) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("fig error: cannot read {}: {e}", path.display());
            return 1;
        }
    };

    tracing::debug!(path = %path.display(), bytes = source.len(), "running file");
    for form in Reader::with_config(&source, config) {
        if let Some(status) = eval_and_report(form, env, false) {
            return status;
        }
    }
    0
}

/// Read every form in `buffer`, or `None` if the last one is still open
fn complete_forms(buffer: &str, config: ParseConfig) -> Option<Vec<Result<Value, Error>>> {
    let forms: Vec<_> = Reader::with_config(buffer, config).collect();
    let incomplete = matches!(
        forms.last(),
        Some(Err(Error::ParseError(e))) if e.kind == ParseErrorKind::Incomplete
    );
    (!incomplete).then_some(forms)
}

fn run_repl(env: &Environment, config: ParseConfig) -> i32 {
    println!("fig interpreter {}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("fig error: could not initialize the line editor: {e}");
            return 1;
        }
    };

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "fig> " } else { "...  " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(env);
                            continue;
                        }
                        ":quit" | ":exit" => return 0,
                        _ => {}
                    }
                }

                buffer.push_str(&line);
                buffer.push('\n');
                let Some(forms) = complete_forms(&buffer, config) else {
                    continue;
                };

                let _ = rl.add_history_entry(buffer.trim_end());
                buffer.clear();
                for form in forms {
                    if let Some(status) = eval_and_report(form, env, true) {
                        return status;
                    }
                }
            }

            Err(ReadlineError::Interrupted) => {
                // Abandon a partially entered form
                buffer.clear();
            }
            Err(ReadlineError::Eof) => return 0,
            Err(err) => {
                eprintln!("fig error: {err}");
                return 1;
            }
        }
    }
}

fn print_help() {
    println!("fig interactive session:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Discard the current input");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms: quote, quasiquote, define, begin, lambda, if");
    println!("Only #f is false; 0 and () are true.");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (define (square x) (* x x))");
    println!("  (square 12)");
    println!("  (cons 1 '(2 3))");
    println!("  (exit 0)");
    println!();
}

/// True when `value` is the native procedure originally bound to `name`
fn is_unshadowed_builtin(name: &str, value: &Value) -> bool {
    match value {
        Value::Procedure(procedure) => {
            matches!(procedure.kind(), ProcedureKind::Native(op) if op.scheme_id == name)
        }
        _ => false,
    }
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate native procedures from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        if is_unshadowed_builtin(&name, &value) {
            builtins.push(name);
        } else {
            user_defined.push((name, value));
        }
    }

    if !builtins.is_empty() {
        println!("Built-in procedures ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
