//! Expression error types.

use thiserror::Error;

/// Errors raised while lexing, parsing or evaluating an expression.
///
/// None of these escape [`super::Resolver::resolve`]; they are logged and the
/// unresolved text is kept instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected token {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("only named functions can be called")]
    NotCallable,

    #[error("{function}() expects {expected}")]
    BadArguments {
        function: &'static str,
        expected: &'static str,
    },

    #[error("cannot read '{member}' of null")]
    NullAccess { member: String },

    #[error("cannot apply '{op}' to {operand}")]
    TypeMismatch { op: &'static str, operand: String },

    #[error("expression nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("expression is {0} characters long")]
    TooLong(usize),
}

/// Result type for expression operations
pub type Result<T> = std::result::Result<T, ExprError>;
