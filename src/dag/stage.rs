// src/dag/stage.rs

//! Stage and step definitions as handed to the graph builder.

use crate::expr::{EvalError, Evaluator, ExpressionContext};
use crate::types::{OnError, StepName};

/// Eligibility predicate of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `if = "<expression>"`
    Expr(String),
    /// `only = ["linux", "ci"]`: runs when any label is active.
    Labels(Vec<String>),
}

impl Condition {
    pub fn evaluate(
        &self,
        ctx: &ExpressionContext,
        evaluator: &Evaluator,
    ) -> Result<bool, EvalError> {
        match self {
            Condition::Expr(text) => evaluator.evaluate_bool(text, ctx),
            Condition::Labels(labels) => Ok(labels.iter().any(|l| ctx.has_label(l))),
        }
    }
}

/// One placement of an action within a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: StepName,
    pub action: String,
    /// Names of steps in the same stage that must be terminal first.
    pub requires: Vec<StepName>,
    pub on_error: OnError,
    pub condition: Option<Condition>,
}

impl Step {
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            requires: Vec::new(),
            on_error: OnError::Stop,
            condition: None,
        }
    }

    pub fn requires(mut self, dep: impl Into<String>) -> Self {
        self.requires.push(dep.into());
        self
    }

    pub fn on_error(mut self, policy: OnError) -> Self {
        self.on_error = policy;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Ordered steps executed under one dependency graph. Declaration order is
/// the order progress is presented in.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl Stage {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
        }
    }
}
