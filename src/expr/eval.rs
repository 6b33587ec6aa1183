// src/expr/eval.rs

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::ast::{CompareOp, Expr};
use super::context::ExpressionContext;
use super::error::EvalError;
use super::functions::{self, FunctionEnv};
use super::parser::parse;
use super::value::Value;
use crate::fs::{FileSystem, RealFileSystem};

/// Evaluates parsed expressions against an [`ExpressionContext`].
///
/// Cheap to clone; shared by every step of a run.
#[derive(Clone)]
pub struct Evaluator {
    fs: Arc<dyn FileSystem>,
    base_dir: Option<PathBuf>,
    strict: bool,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("base_dir", &self.base_dir)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl Evaluator {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            base_dir: None,
            strict: false,
        }
    }

    /// Directory relative `fileExists` paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// In strict mode an unresolved variable is an error instead of `""`.
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Parse and evaluate `text`.
    pub fn evaluate(&self, text: &str, ctx: &ExpressionContext) -> Result<Value, EvalError> {
        let expr = parse(text)?;
        self.eval(&expr, ctx)
    }

    /// Parse and evaluate `text`, then apply truthiness.
    pub fn evaluate_bool(&self, text: &str, ctx: &ExpressionContext) -> Result<bool, EvalError> {
        Ok(self.evaluate(text, ctx)?.is_truthy())
    }

    pub fn eval(&self, expr: &Expr, ctx: &ExpressionContext) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => match ctx.get(name) {
                Some(value) => Ok(value.clone()),
                None if self.strict => Err(EvalError::UndefinedVariable(name.clone())),
                None => Ok(Value::Str(String::new())),
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner, ctx)?.is_truthy())),
            Expr::And(left, right) => {
                if !self.eval(left, ctx)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right, ctx)?.is_truthy()))
            }
            Expr::Or(left, right) => {
                if self.eval(left, ctx)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right, ctx)?.is_truthy()))
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                let ordering = left.compare(&right);
                let result = match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            Expr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                let env = FunctionEnv {
                    fs: self.fs.as_ref(),
                    base_dir: self.base_dir.as_deref(),
                };
                functions::call(name, &args, &env)
            }
        }
    }
}
