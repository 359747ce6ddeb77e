//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The module **does not** print diagnostics itself.  Errors that should be
//! collected rather than propagated (syntax and resolution errors) are handed to
//! a [`Reporter`], and the caller decides how to surface them.

use std::io;
use thiserror::Error;

use log::debug;

use crate::token::{Token, TokenType};

/// Exit code for any lexical, syntax or resolution error.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit code for an uncaught runtime error.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Exit code for failures reading input.
pub const EXIT_IO_ERROR: i32 = 74;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    ///
    /// `location` is either empty, ` at end`, or ` at 'lexeme'`.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis failure found by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.  Aborts the running program.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            line: token.line,
        }
    }

    /// Source line the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            LoxError::Io(_) | LoxError::Utf8(_) => None,
        }
    }

    /// The bare message, without line or location decoration.
    pub fn message(&self) -> String {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Process exit code conventionally associated with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. } => {
                EXIT_STATIC_ERROR
            }
            LoxError::Runtime { .. } => EXIT_RUNTIME_ERROR,
            LoxError::Io(_) | LoxError::Utf8(_) => EXIT_IO_ERROR,
        }
    }
}

fn location_of(token: &Token<'_>) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// Sink for diagnostics that do not abort the current phase.
pub trait Reporter {
    fn report(&mut self, error: LoxError);
}

/// Collecting sink, mostly useful for tests and for callers that want to
/// format diagnostics themselves.
impl Reporter for Vec<LoxError> {
    fn report(&mut self, error: LoxError) {
        self.push(error);
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_errors_point_at_the_token() {
        let semicolon = Token::new(TokenType::SEMICOLON, ";", 3);
        let eof = Token::new(TokenType::EOF, "", 7);

        let err = LoxError::parse(&semicolon, "Expect expression.");
        assert_eq!(err.to_string(), "[line 3] Error at ';': Expect expression.");
        assert_eq!(err.exit_code(), EXIT_STATIC_ERROR);

        let err = LoxError::resolve(&eof, "Something.");
        assert_eq!(err.to_string(), "[line 7] Error at end: Something.");
        assert_eq!(err.line(), Some(7));
    }

    #[test]
    fn runtime_errors_put_the_line_last() {
        let plus = Token::new(TokenType::PLUS, "+", 2);
        let err = LoxError::runtime(&plus, "Operands must be numbers.");

        assert_eq!(err.to_string(), "Operands must be numbers.\n[line 2]");
        assert_eq!(err.message(), "Operands must be numbers.");
        assert_eq!(err.exit_code(), EXIT_RUNTIME_ERROR);
    }
}
