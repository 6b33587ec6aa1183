// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::action::ActionTable;
use crate::dag::Stage;
use crate::errors::{Result, StagerunError};
use crate::expr::Value;
use crate::types::OnError;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// max_parallel = 4
///
/// [vars]
/// profile = "release"
///
/// [action.build]
/// cmd = "cargo build --profile {{ profile }}"
///
/// [[action.package.variant]]
/// if = "os == 'windows'"
/// cmd = "pack.bat"
///
/// [[action.package.variant]]
/// if = "true"
/// cmd = "./pack.sh"
///
/// [[stage.release.step]]
/// action = "build"
///
/// [[stage.release.step]]
/// action = "package"
/// requires = ["build"]
/// ```
///
/// This is only the deserialized shape; see [`ConfigFile`] for the
/// validated form.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Scalar variables from `[vars]`, visible to expressions by bare name.
    #[serde(default)]
    pub vars: BTreeMap<String, toml::Value>,

    /// Declared inputs from `[inputs.<name>]`, visible as `inputs.<name>`.
    #[serde(default)]
    pub inputs: BTreeMap<String, InputConfig>,

    /// All actions from `[action.<name>]`.
    #[serde(default)]
    pub action: BTreeMap<String, ActionConfig>,

    /// All stages from `[stage.<name>]`.
    #[serde(default)]
    pub stage: BTreeMap<String, StageConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigSection {
    /// Maximum number of concurrently running steps. Defaults to the number
    /// of logical cores.
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Referencing an unknown variable is an error instead of `""`.
    #[serde(default)]
    pub strict_variables: bool,

    /// Labels that are always active, on top of the platform ones.
    #[serde(default)]
    pub labels: Vec<String>,

    /// Directory commands run in. Relative paths are resolved against the
    /// config file's directory, which is also the default.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

impl ConfigSection {
    pub fn effective_max_parallel(&self) -> usize {
        self.max_parallel.unwrap_or_else(default_max_parallel)
    }
}

pub fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// `[inputs.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InputConfig {
    #[serde(default)]
    pub default: Option<toml::Value>,

    #[serde(default)]
    pub description: Option<String>,
}

/// `[action.<name>]` section. Exactly one of `cmd`, `builtin` or `variant`
/// must be given.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActionConfig {
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub builtin: Option<String>,

    #[serde(default, rename = "variant")]
    pub variants: Vec<VariantConfig>,

    /// Extra environment for the process; values may use `{{ expr }}`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// `[[action.<name>.variant]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantConfig {
    #[serde(rename = "if")]
    pub guard: String,

    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub builtin: Option<String>,
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StageConfig {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, rename = "step")]
    pub steps: Vec<StepConfig>,
}

/// `[[stage.<name>.step]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub action: String,

    /// Step name; defaults to the action name.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub on_error: OnError,

    /// Eligibility expression.
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Eligibility label list; the step runs if any label is active.
    #[serde(default)]
    pub only: Option<Vec<String>>,
}

impl StepConfig {
    pub fn effective_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.action)
    }
}

/// Validated configuration.
///
/// Every action has a valid shape and every stage builds into an acyclic
/// graph whose steps reference known actions and dependencies.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub vars: BTreeMap<String, Value>,
    pub inputs: BTreeMap<String, InputConfig>,
    pub actions: ActionTable,
    pub stages: BTreeMap<String, Stage>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        vars: BTreeMap<String, Value>,
        inputs: BTreeMap<String, InputConfig>,
        actions: ActionTable,
        stages: BTreeMap<String, Stage>,
    ) -> Self {
        Self {
            config,
            vars,
            inputs,
            actions,
            stages,
        }
    }

    pub fn stage(&self, name: &str) -> Result<&Stage> {
        self.stages
            .get(name)
            .ok_or_else(|| StagerunError::StageNotFound(name.to_string()))
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(|s| s.as_str())
    }

    /// Default values of declared inputs, as `(name, value)`.
    pub fn input_defaults(&self) -> impl Iterator<Item = (String, Value)> + '_ {
        self.inputs.iter().map(|(name, input)| {
            let value = input
                .default
                .as_ref()
                .map(scalar_value)
                .unwrap_or_else(|| Value::Str(String::new()));
            (name.clone(), value)
        })
    }
}

/// Expression value of a TOML scalar. Arrays and tables use their TOML text.
pub fn scalar_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::Num(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        other => Value::Str(other.to_string()),
    }
}
