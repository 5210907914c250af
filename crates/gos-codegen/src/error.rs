//! Codegen errors.

use thiserror::Error;

/// Compile errors. Any of these aborts compilation; nothing is executed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("unbound name: {0}")]
    UnboundSymbol(String),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    /// `go` applied to something other than a function application.
    #[error("go expects a function application, found `{0}`")]
    InvalidGoTarget(&'static str),
    #[error("function declares {0} parameters; at most 255 are supported")]
    TooManyParams(usize),
    #[error("call passes {0} arguments; at most 255 are supported")]
    TooManyArgs(usize),
    #[error("scope declares {0} names; at most 65535 are supported")]
    TooManyNames(usize),
    #[error("scopes nested {0} deep; at most 65535 are supported")]
    ScopeTooDeep(usize),
    #[error("program of {0} instructions exceeds the 16-bit code address range")]
    ProgramTooLarge(usize),
}
