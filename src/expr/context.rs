// src/expr/context.rs

//! The variable mapping expressions are evaluated against.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;

use tracing::debug;

use super::value::Value;

/// Flat, read-only mapping from variable name to value, plus the set of
/// active labels used by `only = [...]` step filters.
///
/// Keys are either bare (`os`, `arch`, user vars) or namespaced
/// (`env.HOME`, `inputs.target`).
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    values: BTreeMap<String, Value>,
    labels: BTreeSet<String>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Assembles an [`ExpressionContext`] from its layers.
///
/// Layers are applied in a fixed order regardless of the order the `with_*`
/// methods are called in; later layers win:
///
/// 1. platform facts (`os`, `arch`, `family`)
/// 2. process environment as `env.<NAME>`
/// 3. config `[vars]` by bare name
/// 4. declared inputs as `inputs.<NAME>`
/// 5. user overrides (`--set KEY=VALUE`), keys used verbatim
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    platform: bool,
    env: Vec<(String, String)>,
    vars: Vec<(String, Value)>,
    inputs: Vec<(String, Value)>,
    overrides: Vec<(String, Value)>,
    labels: Vec<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform_facts(mut self) -> Self {
        self.platform = true;
        self
    }

    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Like [`with_env`](Self::with_env), for raw OS strings such as
    /// `std::env::vars_os()`. Entries that are not valid UTF-8 are left out.
    pub fn with_os_env(mut self, env: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        for (name, value) in env {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => self.env.push((name, value)),
                (Ok(name), Err(_)) => {
                    debug!(variable = %name, "skipping environment variable with non-UTF-8 value");
                }
                (Err(name), _) => {
                    debug!(variable = ?name, "skipping environment variable with non-UTF-8 name");
                }
            }
        }
        self
    }

    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.vars.extend(vars);
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn build(self) -> ExpressionContext {
        let mut ctx = ExpressionContext::new();

        if self.platform {
            let facts = [
                ("os", std::env::consts::OS),
                ("arch", std::env::consts::ARCH),
                ("family", std::env::consts::FAMILY),
            ];
            for (key, value) in facts {
                ctx.insert(key, value);
                ctx.labels.insert(value.to_string());
            }
        }

        for (name, value) in self.env {
            ctx.insert(format!("env.{name}"), value);
        }
        for (name, value) in self.vars {
            ctx.insert(name, value);
        }
        for (name, value) in self.inputs {
            ctx.insert(format!("inputs.{name}"), value);
        }
        for (key, value) in self.overrides {
            ctx.insert(key, value);
        }

        ctx.labels.extend(self.labels);
        ctx
    }
}

/// Parse a `KEY=VALUE` pair as given on the command line.
///
/// `true`/`false` become booleans and plain decimals become numbers; anything
/// else stays a string.
pub fn parse_assignment(text: &str) -> Result<(String, Value), String> {
    let (key, raw) = text
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{text}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{text}'"));
    }

    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => match super::value::parse_number(other) {
            Some(n) => Value::Num(n),
            None => Value::Str(other.to_string()),
        },
    };
    Ok((key.to_string(), value))
}
