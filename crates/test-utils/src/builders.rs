#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use stagerun::action::{Action, ActionTable};
use stagerun::config::{
    ActionConfig, ConfigFile, RawConfigFile, StageConfig, StepConfig, VariantConfig,
};
use stagerun::dag::{Scheduler, Stage, Step};
use stagerun::engine::StageRunner;
use stagerun::expr::{Evaluator, ExpressionContext};
use stagerun::fs::mock::MockFileSystem;
use stagerun::types::OnError;

/// A command action `echo <name>` for every name.
pub fn echo_actions(names: &[&str]) -> ActionTable {
    names
        .iter()
        .map(|n| Action::command(*n, format!("echo {n}")))
        .collect()
}

/// Stage whose steps are named after, and run, the action of the same name.
pub struct StageBuilder {
    name: String,
    steps: Vec<Step>,
}

impl StageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    /// Add step `name` (action `name`) requiring `requires`.
    pub fn step(mut self, name: &str, requires: &[&str]) -> Self {
        let mut step = Step::new(name, name);
        for dep in requires {
            step = step.requires(*dep);
        }
        self.steps.push(step);
        self
    }

    pub fn step_with(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the error policy of the most recently added step.
    pub fn on_error(mut self, policy: OnError) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.on_error = policy;
        }
        self
    }

    pub fn build(self) -> Stage {
        Stage::new(self.name, self.steps)
    }

    /// The stage plus an `echo` action for every step.
    pub fn build_with_actions(self) -> (Stage, ActionTable) {
        let stage = self.build();
        let names: Vec<&str> = stage.steps.iter().map(|s| s.action.as_str()).collect();
        let actions = echo_actions(&names);
        (stage, actions)
    }
}

/// Evaluator that never touches the real filesystem.
pub fn mock_evaluator() -> Evaluator {
    Evaluator::new(Arc::new(MockFileSystem::new()))
}

pub fn scheduler_for(
    stage: &Stage,
    actions: ActionTable,
    ctx: ExpressionContext,
    max_parallel: usize,
) -> Scheduler {
    Scheduler::from_stage(
        stage,
        Arc::new(actions),
        Arc::new(ctx),
        mock_evaluator(),
        max_parallel,
    )
    .expect("stage should build")
}

pub fn runner_for(actions: ActionTable, ctx: ExpressionContext, max_parallel: usize) -> StageRunner {
    StageRunner::new(Arc::new(actions), Arc::new(ctx), mock_evaluator(), max_parallel)
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_action(mut self, name: &str, action: ActionConfig) -> Self {
        self.config.action.insert(name.to_string(), action);
        self
    }

    pub fn with_step(mut self, stage: &str, step: StepConfig) -> Self {
        self.config
            .stage
            .entry(stage.to_string())
            .or_insert_with(StageConfig::default)
            .steps
            .push(step);
        self
    }

    pub fn with_var(mut self, name: &str, value: toml::Value) -> Self {
        self.config.vars.insert(name.to_string(), value);
        self
    }

    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.config.config.max_parallel = Some(n);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn cmd_action(cmd: &str) -> ActionConfig {
    ActionConfig {
        cmd: Some(cmd.to_string()),
        ..ActionConfig::default()
    }
}

pub fn variant(guard: &str, cmd: &str) -> VariantConfig {
    VariantConfig {
        guard: guard.to_string(),
        cmd: Some(cmd.to_string()),
        builtin: None,
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(action: &str) -> Self {
        Self {
            step: StepConfig {
                action: action.to_string(),
                name: None,
                requires: Vec::new(),
                on_error: OnError::Stop,
                condition: None,
                only: None,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.step.name = Some(name.to_string());
        self
    }

    pub fn requires(mut self, dep: &str) -> Self {
        self.step.requires.push(dep.to_string());
        self
    }

    pub fn on_error(mut self, policy: OnError) -> Self {
        self.step.on_error = policy;
        self
    }

    pub fn when(mut self, expr: &str) -> Self {
        self.step.condition = Some(expr.to_string());
        self
    }

    pub fn only(mut self, labels: &[&str]) -> Self {
        self.step.only = Some(labels.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}

pub fn env_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
