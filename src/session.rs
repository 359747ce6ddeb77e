//! One complete run of a Lox program: scan, parse, resolve, interpret.

use std::io::Write;

use log::info;

use crate::error::{Reporter, EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};
use crate::{interpreter, parser, resolver, scanner};

/// Outcome of [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,

    /// A lexical, syntax or resolution error; nothing was executed.
    StaticError,

    /// Execution started and stopped at a runtime error.
    RuntimeError,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::StaticError => EXIT_STATIC_ERROR,
            Status::RuntimeError => EXIT_RUNTIME_ERROR,
        }
    }
}

/// Run `source` as a program.  Output of `print` goes to `out`, every
/// diagnostic goes to `reporter`.
///
/// Lexical and syntax errors are reported together.  Resolution only runs on
/// a program that scanned and parsed cleanly, and execution only on one that
/// also resolved cleanly.
pub fn run<W: Write>(source: &str, out: W, reporter: &mut dyn Reporter) -> Status {
    let (tokens, lex_errors) = scanner::scan(source);
    let had_lex_error = !lex_errors.is_empty();

    for error in lex_errors {
        reporter.report(error);
    }

    let (statements, had_parse_error) = parser::parse(&tokens, reporter);

    if had_lex_error || had_parse_error {
        info!("Static errors found; not resolving");
        return Status::StaticError;
    }

    let mut resolve_errors = Vec::new();
    let bindings = resolver::resolve(&statements, &mut resolve_errors);

    if !resolve_errors.is_empty() {
        info!("{} resolution errors; not running", resolve_errors.len());
        for error in resolve_errors {
            reporter.report(error);
        }
        return Status::StaticError;
    }

    if interpreter::interpret(&statements, bindings, out, reporter) {
        Status::RuntimeError
    } else {
        Status::Success
    }
}
