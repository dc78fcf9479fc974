//! The pipeline driver: scan → parse → resolve → interpret.
//!
//! [`Lox`] owns one [`Interpreter`], so successive [`Lox::run`] calls (the
//! REPL) share globals.  Diagnostics are never printed here; they go to the
//! [`Reporter`] the caller supplies, and the returned [`Status`] tells the
//! caller which exit code applies.

use std::io::Write;

use log::{debug, info};

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// Error sink for every stage of the pipeline.
pub trait Reporter {
    fn report(&mut self, error: &LoxError);
}

/// Writes each diagnostic on its own line to stderr.
#[derive(Debug, Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&mut self, error: &LoxError) {
        eprintln!("{}", error);
    }
}

/// Keeps every rendered diagnostic, for callers that inspect them afterwards.
impl Reporter for Vec<String> {
    fn report(&mut self, error: &LoxError) {
        debug!("Collecting diagnostic: {}", error);

        self.push(error.to_string());
    }
}

/// Outcome of running one chunk of source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Lexical, syntactic or resolution errors; nothing was executed.
    StaticError,
    /// Execution started and stopped at a runtime error.
    RuntimeError,
}

impl Status {
    /// Conventional process exit code (sysexits `EX_DATAERR` / `EX_SOFTWARE`).
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::StaticError => 65,
            Status::RuntimeError => 70,
        }
    }
}

pub struct Lox {
    interpreter: Interpreter,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    /// Driver printing to stdout.
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    /// Driver whose `print` output goes to `output`.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self {
            interpreter: Interpreter::with_output(output),
        }
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Run `source` through the whole pipeline.
    ///
    /// Static errors from every stage reached are reported together and stop
    /// the run before execution; a runtime error stops it at once.
    pub fn run(&mut self, source: &str, reporter: &mut dyn Reporter) -> Status {
        info!("Running {} bytes of source", source.len());

        let (tokens, lex_errors) = Scanner::new(source).scan_tokens();
        for error in &lex_errors {
            reporter.report(error);
        }

        let statements = match Parser::new(&tokens).parse() {
            Ok(statements) => statements,
            Err(errors) => {
                for error in &errors {
                    reporter.report(error);
                }
                return Status::StaticError;
            }
        };

        if !lex_errors.is_empty() {
            return Status::StaticError;
        }

        if let Err(errors) = Resolver::new(&mut self.interpreter).resolve(&statements) {
            for error in &errors {
                reporter.report(error);
            }
            return Status::StaticError;
        }

        match self.interpreter.interpret(&statements) {
            Ok(()) => Status::Ok,
            Err(error) => {
                debug!("Runtime error on line {:?}: {}", error.line(), error.message());
                reporter.report(&error);
                Status::RuntimeError
            }
        }
    }
}
