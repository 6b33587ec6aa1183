// src/expr/interpolate.rs

//! `{{ expression }}` substitution in command templates.

use super::context::ExpressionContext;
use super::error::EvalError;
use super::eval::Evaluator;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replace every `{{ expr }}` in `template` with the string form of `expr`.
///
/// An opening `{{` with no matching `}}` is copied through as-is.
pub fn interpolate(
    template: &str,
    ctx: &ExpressionContext,
    evaluator: &Evaluator,
) -> Result<String, EvalError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        // Nearest close, so two placeholders on one line stay separate.
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        let value = evaluator.evaluate(&after_open[..end], ctx)?;
        out.push_str(&value.to_string());
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    Ok(out)
}
