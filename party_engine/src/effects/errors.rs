use crate::game::errors::StateError;
use thiserror::Error;

/// Why a single effect was skipped. Never fatal: the interpreter logs it and
/// moves on to the next effect in the list.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EffectError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function}: missing argument '{arg}'")]
    MissingArgument {
        function: &'static str,
        arg: &'static str,
    },

    #[error("{function}: argument '{arg}' must be {expected}")]
    InvalidArgument {
        function: &'static str,
        arg: &'static str,
        expected: &'static str,
    },

    #[error("'{path}' is not an array")]
    NotAnArray { path: String },

    #[error("'{path}' is not a number")]
    NotANumber { path: String },

    #[error(transparent)]
    State(#[from] StateError),
}
