//! Diagnostic type for the compilation pipeline.
//!
//! Every fallible stage returns `Result<T, CompileError>`. There is no
//! recovery and no multi-error reporting: the first error aborts the whole
//! compilation, so `main` only ever needs to print one diagnostic and exit
//! non-zero.

use std::fmt;

/// One row of the error taxonomy. The `String` payload is the fully
/// rendered human-readable message (types are already spelled out via
/// `Type::as_string` by the time they land in here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Source could not be read, or destination could not be written.
    Io(String),
    /// Malformed UTF-8, or an unterminated string literal.
    Lex(String),
    /// Unexpected close paren, EOF inside a list, wrong arity for a
    /// keyword form, non-symbol where a symbol was required.
    Parse(String),
    /// A symbol wasn't bound in scope, or a call named an unknown function.
    Unresolved(String),
    /// A local was redeclared, or a record name was redefined.
    Redefinition(String),
    /// Wrong number of call arguments to a non-variadic function.
    Arity(String),
    /// A coercion failed at an assignment-like site.
    Type(String),
    /// An explicit cast had no valid source/destination pair.
    Cast(String),
    /// An invariant the pipeline is supposed to guarantee was violated.
    Internal(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Io(s) => write!(f, "I/O error: {s}"),
            CompileError::Lex(s) => write!(f, "lex error: {s}"),
            CompileError::Parse(s) => write!(f, "parse error: {s}"),
            CompileError::Unresolved(s) => write!(f, "unresolved reference: {s}"),
            CompileError::Redefinition(s) => write!(f, "redefinition: {s}"),
            CompileError::Arity(s) => write!(f, "arity mismatch: {s}"),
            CompileError::Type(s) => write!(f, "type mismatch: {s}"),
            CompileError::Cast(s) => write!(f, "invalid cast: {s}"),
            CompileError::Internal(s) => write!(f, "internal compiler error: {s}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e.to_string())
    }
}

impl From<std::fmt::Error> for CompileError {
    fn from(e: std::fmt::Error) -> Self {
        CompileError::Internal(format!("C emission formatting error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
