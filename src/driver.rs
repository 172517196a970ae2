//! Pipeline driver: feeds source through scanner, parser, and resolver,
//! then hands the statement list to the interpreter.
//!
//! Any error at or before resolution suppresses execution; a runtime
//! error aborts the current top-level statement list.  The interpreter
//! itself persists across runs, so globals defined by earlier REPL lines
//! stay visible, while the per-run error flags reset on every call.

use log::{debug, info};

use crate::ast::Stmt;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// How a run's diagnostics should be scoped.
///
/// In `File` mode the whole program is one resolve unit, so unused
/// globals are reported once at the end.  A REPL line is not a whole
/// program; reporting a just-defined global as unused would reject
/// every definition, so the check is skipped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    File,
    Repl,
}

pub struct Driver {
    interpreter: Interpreter,
    had_compile_error: bool,
    had_runtime_error: bool,
}

impl Driver {
    pub fn new() -> Self {
        Driver {
            interpreter: Interpreter::new(),
            had_compile_error: false,
            had_runtime_error: false,
        }
    }

    /// Builds a driver whose interpreter writes `print` output to the
    /// given sink instead of stdout.
    pub fn with_output(out: Box<dyn std::io::Write>) -> Self {
        Driver {
            interpreter: Interpreter::with_output(out),
            had_compile_error: false,
            had_runtime_error: false,
        }
    }

    pub fn had_compile_error(&self) -> bool {
        self.had_compile_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Runs one unit of source: a whole file, or a single REPL line.
    pub fn run(&mut self, source: &str, mode: Mode) {
        self.had_compile_error = false;
        self.had_runtime_error = false;

        // Scan. Lexical errors are reported and scanning continues.
        let mut tokens: Vec<Token> = Vec::new();

        for item in Scanner::new(source) {
            match item {
                Ok(token) => tokens.push(token),

                Err(e) => self.report(&e),
            }
        }

        // Parse. The parser resynchronizes internally and reports every
        // error it found.
        let (statements, parse_errors): (Vec<Stmt>, Vec<LoxError>) = Parser::new(tokens).parse();

        for e in &parse_errors {
            self.report(e);
        }

        // Resolve. Populates the interpreter's side-tables in place and
        // keeps going after errors to report as many as possible.
        let mut resolver: Resolver = Resolver::new(&mut self.interpreter);

        resolver.resolve(&statements);

        if mode == Mode::File {
            resolver.end_program();
        }

        let resolve_errors: Vec<LoxError> = resolver.into_errors();

        for e in &resolve_errors {
            self.report(e);
        }

        if self.had_compile_error {
            info!("Skipping execution: compile error(s) reported");

            return;
        }

        debug!("Pipeline clean, interpreting {} statement(s)", statements.len());

        if let Err(e) = self.interpreter.interpret(&statements) {
            self.report(&e);
        }
    }

    fn report(&mut self, error: &LoxError) {
        if error.is_compile_error() {
            self.had_compile_error = true;
        } else {
            self.had_runtime_error = true;
        }

        eprintln!("{}", error);
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}
