// File: src/errors.rs
//
// Error handling and reporting for the ale language.
// Mirrors the error kinds of spec §7: compile-time errors abort
// compilation, runtime errors become panics that unwind VM frames.

use crate::value::Value;
use colored::Colorize;
use std::fmt;

/// Source location information, attached to an error when the reader or
/// compiler knows where in the source text it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error kinds enumerated in spec §7. These are kinds, not distinct
/// Rust types: a single `AleError` carries one of them plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    ReaderError,
    CompileError,
    ArityError,
    TypeError,
    ArithmeticError,
    UserError,
    PromiseError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ErrorKind::ReaderError => "reader error",
            ErrorKind::CompileError => "compile error",
            ErrorKind::ArityError => "arity error",
            ErrorKind::TypeError => "type error",
            ErrorKind::ArithmeticError => "arithmetic error",
            ErrorKind::UserError => "user error",
            ErrorKind::PromiseError => "promise error",
        };
        write!(f, "{s}")
    }
}

/// A structured ale error: a kind, a message, and (when available) the
/// source location and the responsible form's printed representation.
#[derive(Debug, Clone)]
pub struct AleError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub form: Option<String>,
    /// The raw value passed to `raise`, preserved so `recover` can hand
    /// a caller back the exact value rather than its printed message.
    pub payload: Option<Value>,
}

impl AleError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), location: None, form: None, payload: None }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn with_payload(mut self, value: Value) -> Self {
        self.payload = Some(value);
        self
    }

    /// The value a `recover` handler should see: the raised payload if
    /// one was attached, otherwise the error printed as a string.
    pub fn recovered_value(&self) -> Value {
        self.payload.clone().unwrap_or_else(|| Value::str(self.message.clone()))
    }

    pub fn reader(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReaderError, message)
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CompileError, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArityError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArithmeticError, message)
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserError, message)
    }

    /// Builds a `UserError` from a raised value, using its printed form
    /// as the message while preserving the original value as `payload`.
    pub fn raised(value: Value) -> Self {
        Self::new(ErrorKind::UserError, value.print()).with_payload(value)
    }

    pub fn promise(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PromiseError, message)
    }

    /// Exit code contract from spec §6: 0 success, 1 runtime error, 2
    /// compile/reader error.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::ReaderError | ErrorKind::CompileError => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for AleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind.to_string().red().bold(), self.message.bold())?;
        if let Some(loc) = &self.location {
            write!(f, "\n  {} {}", "-->".bright_blue(), loc)?;
        }
        if let Some(form) = &self.form {
            write!(f, "\n  {} {}", "in:".bright_blue(), form)?;
        }
        Ok(())
    }
}

impl std::error::Error for AleError {}

pub type AleResult<T> = Result<T, AleError>;
