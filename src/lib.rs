//! fig - a small interpreter for a Lisp-family language
//!
//! This crate reads parenthesized source text into value trees and evaluates
//! them against a lexically scoped environment.
//!
//! ```scheme
//! (define (add1 x) (+ x 1))   ; procedure definition sugar
//! (add1 10)                   ; => 11
//! (if 0 'yes 'no)             ; => yes, only #f is false
//! (car '(1 2 3))              ; => 1
//! (cons 1 2)                  ; => (1 . 2)
//! ```
//!
//! ## Calling Convention
//!
//! Every procedure, native or user-defined, receives its operands
//! *unevaluated* together with the caller's environment, and decides itself
//! how to evaluate them. Native procedures evaluate each operand in the
//! calling environment; closures evaluate each argument in the calling
//! environment and bind it in a fresh frame parented at the closure's
//! defining environment.
//!
//! ## Truthiness
//!
//! Only `#f` is false. `0`, `()` and every other value are true.
//!
//! ## Memory
//!
//! Pairs, procedures and environment frames live on a tracing garbage
//! collected heap, so shared and cyclic structures are reclaimed correctly.
//!
//! ## Modules
//!
//! - `ast`: runtime values and their printed form
//! - `scheme`: the reader, turning source text into values
//! - `evaluator`: environments, special forms and procedure application
//! - `builtinops`: the native procedure library

use std::fmt;

/// Maximum nesting depth of lists and quotes accepted by the reader.
/// Flat lists are read iteratively and are not limited by this.
pub const MAX_PARSE_DEPTH: usize = 512;

/// Categorizes the different kinds of reader errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed parens, dangling quote)
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra input found after a complete expression where exactly one was expected
    TrailingContent,
}

/// A structured error providing detailed information about a reader failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 40 chars)
    pub context: Option<String>,
    /// The problematic character encountered, if any
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from `input` around byte `error_offset`
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 40;

        let error_offset = error_offset.min(input.len());
        let found = input[error_offset..].chars().next().map(String::from);

        let before: String = {
            let prefix = &input[..error_offset];
            let skip = prefix.chars().count().saturating_sub(10);
            prefix.chars().skip(skip).collect()
        };
        let after: String = input[error_offset..].chars().take(MAX_CONTEXT).collect();

        let mut display_context = String::new();
        if before.len() < error_offset {
            display_context.push_str("[...]");
        }
        display_context.push_str(&before);
        display_context.push_str(&after);
        if error_offset + after.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error type shared by the reader, the evaluator and the native library.
///
/// Any error aborts the top-level form being read or evaluated; the driver
/// reports it and moves on to the next form.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    TypeError(String),
    UnboundVariable(String),
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
    /// Raised by the `exit` procedure; the driver terminates with this status
    Exit(i32),
}

impl Error {
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(context) = &e.context {
                    write!(f, "\n  Context: {context}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "{msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::UnboundVariable(var) => write!(f, "unbound variable '{var}'"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: incorrect number of arguments, expected {expected} but got {got}"
                ),
            },
            Error::Exit(code) => write!(f, "exit with status {code}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod scheme;

pub use ast::Value;
pub use evaluator::{Environment, create_global_env, eval};
pub use scheme::{ParseConfig, Reader, parse_all, parse_scheme};
