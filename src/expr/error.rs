// src/expr/error.rs

use thiserror::Error;

/// Failure to parse or evaluate a guard / condition expression.
///
/// A malformed expression is always an error, never a `false` result, so
/// callers can tell "doesn't match" apart from "broken expression".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' expects {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid argument to '{function}': {message}")]
    InvalidArgument { function: String, message: String },

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
}

impl EvalError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        EvalError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        EvalError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
