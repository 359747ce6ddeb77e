#![allow(dead_code)]

use rox::error::LoxError;
use rox::session::{self, Status};

/// Everything one program run produced.
pub struct Outcome {
    pub status: Status,
    pub stdout: String,
    pub errors: Vec<LoxError>,
}

impl Outcome {
    /// Diagnostics rendered the way the CLI prints them.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Run `source` as a complete program into in-memory sinks.
pub fn run(source: &str) -> Outcome {
    let mut out: Vec<u8> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    let status = session::run(source, &mut out, &mut errors);

    Outcome {
        status,
        stdout: String::from_utf8(out).expect("program output is UTF-8"),
        errors,
    }
}

/// Run a program that must succeed and return what it printed.
pub fn run_ok(source: &str) -> String {
    let outcome = run(source);

    assert_eq!(
        outcome.status,
        Status::Success,
        "unexpected errors: {:?}",
        outcome.error_messages()
    );

    outcome.stdout
}
