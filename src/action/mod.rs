// src/action/mod.rs

//! Actions: named, reusable units of work.
//!
//! An action is exactly one of:
//! - a shell command template,
//! - a reference to a registered [`builtin::Builtin`],
//! - an ordered list of guarded [`Variant`]s, of which the first whose guard
//!   is truthy is used.

pub mod builtin;

use std::collections::BTreeMap;
use std::fmt;

use crate::expr::{EvalError, Evaluator, ExpressionContext, interpolate};

pub use builtin::{Builtin, BuiltinContext, BuiltinRegistry};

/// Something that can actually be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runnable {
    /// Shell command text (a template until interpolated).
    Command(String),
    /// Name of a registered builtin.
    Builtin(String),
}

impl Runnable {
    /// Substitute `{{ expr }}` placeholders in command text. Builtin
    /// references are returned unchanged.
    pub fn interpolate(
        &self,
        ctx: &ExpressionContext,
        evaluator: &Evaluator,
    ) -> Result<Runnable, EvalError> {
        match self {
            Runnable::Command(template) => {
                Ok(Runnable::Command(interpolate(template, ctx, evaluator)?))
            }
            Runnable::Builtin(name) => Ok(Runnable::Builtin(name.clone())),
        }
    }
}

impl fmt::Display for Runnable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runnable::Command(cmd) => f.write_str(cmd),
            Runnable::Builtin(name) => write!(f, "builtin:{name}"),
        }
    }
}

/// One guarded alternative of an action.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub guard: String,
    pub runnable: Runnable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Run(Runnable),
    Variants(Vec<Variant>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    /// Extra environment for the process; values are templates.
    pub env: BTreeMap<String, String>,
    pub description: Option<String>,
}

/// Result of picking what an action should run in a given context.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Run(&'a Runnable),
    /// The action has variants and none of the guards matched. This is not a
    /// misconfiguration: the action simply doesn't apply here.
    NoMatchingVariant,
}

impl Action {
    pub fn command(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self::new(name, ActionKind::Run(Runnable::Command(cmd.into())))
    }

    pub fn builtin(name: impl Into<String>, builtin: impl Into<String>) -> Self {
        Self::new(name, ActionKind::Run(Runnable::Builtin(builtin.into())))
    }

    pub fn with_variants(name: impl Into<String>, variants: Vec<Variant>) -> Self {
        Self::new(name, ActionKind::Variants(variants))
    }

    fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            env: BTreeMap::new(),
            description: None,
        }
    }

    /// Pick the runnable for this context.
    ///
    /// Guards are evaluated in declaration order and the first truthy one
    /// wins. A guard that fails to evaluate is an error, not a mismatch.
    pub fn resolve(
        &self,
        ctx: &ExpressionContext,
        evaluator: &Evaluator,
    ) -> Result<Resolution<'_>, EvalError> {
        match &self.kind {
            ActionKind::Run(runnable) => Ok(Resolution::Run(runnable)),
            ActionKind::Variants(variants) => {
                for variant in variants {
                    if evaluator.evaluate_bool(&variant.guard, ctx)? {
                        return Ok(Resolution::Run(&variant.runnable));
                    }
                }
                Ok(Resolution::NoMatchingVariant)
            }
        }
    }

    /// Every builtin name this action may run.
    pub fn builtin_refs(&self) -> Vec<&str> {
        let runnables: Vec<&Runnable> = match &self.kind {
            ActionKind::Run(runnable) => vec![runnable],
            ActionKind::Variants(variants) => variants.iter().map(|v| &v.runnable).collect(),
        };
        runnables
            .into_iter()
            .filter_map(|r| match r {
                Runnable::Builtin(name) => Some(name.as_str()),
                Runnable::Command(_) => None,
            })
            .collect()
    }
}

/// All actions of a config, keyed by name. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    actions: BTreeMap<String, Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, action: Action) {
        self.actions.insert(action.name.clone(), action);
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }
}

impl FromIterator<Action> for ActionTable {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        let mut table = ActionTable::new();
        for action in iter {
            table.insert(action);
        }
        table
    }
}
