// src/config/validate.rs

use std::collections::{BTreeMap, HashSet};

use crate::action::{Action, ActionKind, ActionTable, BuiltinRegistry, Runnable, Variant};
use crate::config::model::{
    ActionConfig, ConfigFile, RawConfigFile, StageConfig, StepConfig, scalar_value,
};
use crate::dag::{Condition, Stage, StageGraph, Step};
use crate::errors::{Result, StagerunError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StagerunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_stages(&raw)?;
        validate_global_config(&raw)?;

        let actions = build_actions(&raw.action)?;

        let mut stages = BTreeMap::new();
        for (name, stage_cfg) in &raw.stage {
            let stage = build_stage(name, stage_cfg)?;
            // Unknown actions/dependencies and cycles fail the whole config.
            StageGraph::build(&stage, &actions)?;
            stages.insert(name.clone(), stage);
        }

        let vars = raw
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), scalar_value(v)))
            .collect();

        Ok(ConfigFile::new_unchecked(
            raw.config,
            vars,
            raw.inputs,
            actions,
            stages,
        ))
    }
}

fn ensure_has_stages(cfg: &RawConfigFile) -> Result<()> {
    if cfg.stage.is_empty() {
        return Err(StagerunError::ConfigError(
            "config must contain at least one [stage.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_parallel == Some(0) {
        return Err(StagerunError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn build_actions(raw: &BTreeMap<String, ActionConfig>) -> Result<ActionTable> {
    let mut table = ActionTable::new();
    for (name, cfg) in raw {
        let kind = action_kind(name, cfg)?;
        table.insert(Action {
            name: name.clone(),
            kind,
            env: cfg.env.clone(),
            description: cfg.description.clone(),
        });
    }
    Ok(table)
}

fn action_kind(name: &str, cfg: &ActionConfig) -> Result<ActionKind> {
    let direct = given(cfg.cmd.as_deref(), cfg.builtin.as_deref());

    match (direct, cfg.variants.is_empty()) {
        (Given::One(r), true) => Ok(ActionKind::Run(r)),
        (Given::None, false) => {
            let mut variants = Vec::with_capacity(cfg.variants.len());
            for (i, v) in cfg.variants.iter().enumerate() {
                match given(v.cmd.as_deref(), v.builtin.as_deref()) {
                    Given::One(r) => variants.push(Variant {
                        guard: v.guard.clone(),
                        runnable: r,
                    }),
                    _ => {
                        return Err(StagerunError::ConfigError(format!(
                            "action '{name}' variant #{} must set exactly one of `cmd` or `builtin`",
                            i + 1
                        )));
                    }
                }
            }
            Ok(ActionKind::Variants(variants))
        }
        (Given::None, true) => Err(StagerunError::ConfigError(format!(
            "action '{name}' must set one of `cmd`, `builtin` or `variant`"
        ))),
        _ => Err(StagerunError::ConfigError(format!(
            "action '{name}' must set only one of `cmd`, `builtin` or `variant`"
        ))),
    }
}

/// How many of `cmd` / `builtin` were given.
enum Given {
    None,
    One(Runnable),
    Both,
}

fn given(cmd: Option<&str>, builtin: Option<&str>) -> Given {
    match (cmd, builtin) {
        (None, None) => Given::None,
        (Some(cmd), None) => Given::One(Runnable::Command(cmd.to_string())),
        (None, Some(b)) => Given::One(Runnable::Builtin(b.to_string())),
        (Some(_), Some(_)) => Given::Both,
    }
}

fn build_stage(name: &str, cfg: &StageConfig) -> Result<Stage> {
    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(cfg.steps.len());

    for step_cfg in &cfg.steps {
        let step = build_step(name, step_cfg)?;
        if !seen.insert(step.name.clone()) {
            return Err(StagerunError::ConfigError(format!(
                "stage '{name}' declares step '{}' more than once; give one of them a `name`",
                step.name
            )));
        }
        steps.push(step);
    }

    Ok(Stage {
        name: name.to_string(),
        description: cfg.description.clone(),
        steps,
    })
}

fn build_step(stage: &str, cfg: &StepConfig) -> Result<Step> {
    let name = cfg.effective_name().to_string();

    let condition = match (&cfg.condition, &cfg.only) {
        (Some(_), Some(_)) => {
            return Err(StagerunError::ConfigError(format!(
                "step '{name}' in stage '{stage}' sets both `if` and `only`"
            )));
        }
        (Some(expr), None) => Some(Condition::Expr(expr.clone())),
        (None, Some(labels)) => Some(Condition::Labels(labels.clone())),
        (None, None) => None,
    };

    Ok(Step {
        name,
        action: cfg.action.clone(),
        requires: cfg.requires.clone(),
        on_error: cfg.on_error,
        condition,
    })
}

/// Check that every builtin referenced by an action is registered.
pub fn validate_builtins(actions: &ActionTable, registry: &BuiltinRegistry) -> Result<()> {
    for action in actions.iter() {
        for builtin in action.builtin_refs() {
            if !registry.contains(builtin) {
                return Err(StagerunError::UnknownBuiltin {
                    action: action.name.clone(),
                    builtin: builtin.to_string(),
                });
            }
        }
    }
    Ok(())
}
