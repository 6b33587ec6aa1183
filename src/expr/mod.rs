// src/expr/mod.rs

//! Conditional expression language used by variant guards and step `if`
//! conditions.
//!
//! Text is tokenized ([`lexer`]), parsed into an [`Expr`] tree ([`parser`])
//! and evaluated separately ([`eval`]), so malformed expressions can be
//! tested without any context.
//!
//! ```text
//! os == 'linux' && (contains(env.PATH, '/usr/bin') || !fileExists('.skip'))
//! ```

pub mod ast;
pub mod context;
pub mod error;
pub mod eval;
pub mod functions;
pub mod interpolate;
pub mod lexer;
pub mod parser;
pub mod semver;
pub mod value;

pub use ast::{CompareOp, Expr};
pub use context::{ContextBuilder, ExpressionContext, parse_assignment};
pub use error::EvalError;
pub use eval::Evaluator;
pub use interpolate::interpolate;
pub use parser::parse;
pub use value::Value;

/// Evaluate `text` against `ctx` with a default [`Evaluator`] (real
/// filesystem, permissive variables).
pub fn evaluate(text: &str, ctx: &ExpressionContext) -> Result<Value, EvalError> {
    Evaluator::default().evaluate(text, ctx)
}
