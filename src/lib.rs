// src/lib.rs

pub mod action;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod expr;
pub mod fs;
pub mod logging;
pub mod output;
pub mod report;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action::BuiltinRegistry;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate, resolve_workdir, validate_builtins};
use crate::dag::{PlanDecision, Stage};
use crate::engine::StageRunner;
use crate::errors::StagerunError;
use crate::exec::{ExecSettings, RealExecutorBackend};
use crate::expr::{ContextBuilder, Evaluator, ExpressionContext, parse_assignment};
use crate::fs::{FileSystem, RealFileSystem};
use crate::output::TerminalSink;
use crate::report::StageOutcome;

/// Overall result of an invocation, as seen by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// A step ended in `error`.
    Failed,
    /// The run was interrupted.
    Cancelled,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Failed => 1,
            RunOutcome::Cancelled => 130,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - the expression context
/// - scheduler / runtime / executor / output task, per stage
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunOutcome> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let cfg = load_and_validate(fs.as_ref(), &args.config)?;

    // Builtins are registered by embedders; the binary ships none.
    let builtins = Arc::new(BuiltinRegistry::new());
    validate_builtins(&cfg.actions, &builtins)?;

    let stages = selected_stages(&cfg, &args.stages)?;

    if args.list {
        print_list(&stages);
        return Ok(RunOutcome::Success);
    }

    let workdir = resolve_workdir(&args.config, cfg.config.workdir.as_deref());
    let context = Arc::new(build_context(&cfg, &args)?);
    let evaluator = Evaluator::new(fs.clone())
        .with_base_dir(&workdir)
        .with_strict_variables(args.strict_variables || cfg.config.strict_variables);
    let max_parallel = args
        .max_parallel
        .map(|n| n as usize)
        .unwrap_or_else(|| cfg.config.effective_max_parallel());

    let runner = StageRunner::new(
        Arc::new(cfg.actions.clone()),
        context,
        evaluator,
        max_parallel,
    );

    if args.dry_run {
        print_dry_run(&runner, &stages, &workdir)?;
        return Ok(RunOutcome::Success);
    }

    // Ctrl-C → cooperative cancellation.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let mut sink = TerminalSink::stdout().with_workdir(&workdir);

    for stage in stages {
        let settings = ExecSettings::new(&workdir, builtins.clone());
        let exec_cancel = cancel.child_token();

        let (result, returned) = runner
            .run(
                stage,
                |tx| RealExecutorBackend::new(tx, settings, exec_cancel),
                sink,
                cancel.clone(),
            )
            .await?;
        sink = returned;

        match result.outcome() {
            StageOutcome::Success => {}
            StageOutcome::Failed => {
                info!(stage = %stage.name, "stage failed; not running further stages");
                return Ok(RunOutcome::Failed);
            }
            StageOutcome::Terminated => return Ok(RunOutcome::Cancelled),
        }
    }

    Ok(RunOutcome::Success)
}

/// Stages named on the command line, or every stage by name.
pub fn selected_stages<'a>(
    cfg: &'a ConfigFile,
    names: &[String],
) -> std::result::Result<Vec<&'a Stage>, StagerunError> {
    if names.is_empty() {
        return Ok(cfg.stages.values().collect());
    }
    names.iter().map(|name| cfg.stage(name)).collect()
}

/// Assemble the expression context from platform facts, the environment,
/// `[vars]`, inputs and `--set` overrides.
pub fn build_context(
    cfg: &ConfigFile,
    args: &CliArgs,
) -> std::result::Result<ExpressionContext, StagerunError> {
    let mut inputs: Vec<_> = cfg.input_defaults().collect();
    for text in &args.inputs {
        let (name, value) = parse_assignment(text).map_err(StagerunError::ConfigError)?;
        if !cfg.inputs.contains_key(&name) {
            return Err(StagerunError::ConfigError(format!(
                "--input {name}: no such input is declared in [inputs]"
            )));
        }
        inputs.push((name, value));
    }

    let overrides = args
        .set
        .iter()
        .map(|text| parse_assignment(text).map_err(StagerunError::ConfigError))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let labels = cfg
        .config
        .labels
        .iter()
        .chain(args.labels.iter())
        .cloned();

    let ctx = ContextBuilder::new()
        .with_platform_facts()
        .with_os_env(std::env::vars_os())
        .with_vars(cfg.vars.clone())
        .with_inputs(inputs)
        .with_overrides(overrides)
        .with_labels(labels)
        .build();

    debug!(
        labels = ?ctx.labels().collect::<Vec<_>>(),
        "expression context built"
    );
    Ok(ctx)
}

fn print_list(stages: &[&Stage]) {
    for stage in stages {
        match &stage.description {
            Some(desc) => println!("{}: {desc}", stage.name),
            None => println!("{}", stage.name),
        }
        for step in &stage.steps {
            if step.requires.is_empty() {
                println!("  - {} ({})", step.name, step.action);
            } else {
                println!(
                    "  - {} ({}) requires {}",
                    step.name,
                    step.action,
                    step.requires.join(", ")
                );
            }
        }
    }
}

/// Dry-run output: each stage's steps with their level, requirements and
/// what they would run in this context.
fn print_dry_run(
    runner: &StageRunner,
    stages: &[&Stage],
    workdir: &Path,
) -> std::result::Result<(), StagerunError> {
    println!("stagerun dry-run");
    println!("  workdir = {}", workdir.display());
    println!("  max_parallel = {}", runner.max_parallel());

    for stage in stages {
        println!();
        println!("stage '{}' ({} steps):", stage.name, stage.steps.len());
        for planned in runner.plan(stage)? {
            println!("  - {} [level {}]", planned.name, planned.level);
            if !planned.requires.is_empty() {
                println!("      requires: {}", planned.requires.join(", "));
            }
            match planned.decision {
                PlanDecision::Run(runnable) => println!("      runs: {runnable}"),
                PlanDecision::Skip(reason) => println!("      skipped: {reason}"),
                PlanDecision::Invalid(message) => println!("      error: {message}"),
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
