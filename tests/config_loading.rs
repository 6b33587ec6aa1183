mod common;

use std::path::{Path, PathBuf};

use clap::Parser;
use common::{TestResult, write_config};
use stagerun::action::{ActionKind, BuiltinRegistry, Runnable};
use stagerun::cli::CliArgs;
use stagerun::config::{
    default_config_path, load_and_validate, parse_and_validate, resolve_workdir, validate_builtins,
};
use stagerun::dag::Condition;
use stagerun::errors::StagerunError;
use stagerun::expr::Value;
use stagerun::fs::RealFileSystem;
use stagerun::fs::mock::MockFileSystem;
use stagerun::types::OnError;
use stagerun::{build_context, selected_stages};
use stagerun_test_utils::builders::{
    ConfigFileBuilder, StepConfigBuilder, cmd_action, variant,
};

const RELEASE: &str = r#"
[config]
max_parallel = 3
labels = ["ci"]

[vars]
profile = "release"
jobs = 8

[inputs.target]
default = "x86_64-unknown-linux-gnu"
description = "Target triple"

[action.build]
cmd = "cargo build --profile {{ profile }} --target {{ inputs.target }}"
env = { CARGO_TERM_COLOR = "never" }

[action.lint]
cmd = "cargo clippy"

[[action.package.variant]]
if = "os == 'windows'"
cmd = "pack.bat"

[[action.package.variant]]
if = "true"
cmd = "./pack.sh"

[[stage.release.step]]
action = "build"

[[stage.release.step]]
action = "lint"
on_error = "warn"
only = ["ci"]

[[stage.release.step]]
action = "package"
requires = ["build", "lint"]
if = "profile == 'release'"

[[stage.check.step]]
action = "lint"
name = "lint-only"
"#;

#[test]
fn loads_a_full_config_from_disk() -> TestResult {
    let file = write_config(RELEASE);
    let cfg = load_and_validate(&RealFileSystem, file.path())?;

    assert_eq!(cfg.config.max_parallel, Some(3));
    assert_eq!(cfg.config.effective_max_parallel(), 3);
    assert_eq!(cfg.vars.get("jobs"), Some(&Value::Num(8.0)));
    assert_eq!(cfg.stage_names().collect::<Vec<_>>(), ["check", "release"]);

    let build = cfg.actions.get("build").unwrap();
    assert_eq!(build.env.get("CARGO_TERM_COLOR").map(String::as_str), Some("never"));

    match &cfg.actions.get("package").unwrap().kind {
        ActionKind::Variants(variants) => {
            assert_eq!(variants.len(), 2);
            assert_eq!(variants[1].runnable, Runnable::Command("./pack.sh".to_string()));
        }
        other => panic!("expected variants, got {other:?}"),
    }

    let release = cfg.stage("release")?;
    let names: Vec<_> = release.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["build", "lint", "package"]);
    assert_eq!(release.steps[1].on_error, OnError::Warn);
    assert_eq!(
        release.steps[1].condition,
        Some(Condition::Labels(vec!["ci".to_string()]))
    );
    assert_eq!(
        release.steps[2].condition,
        Some(Condition::Expr("profile == 'release'".to_string()))
    );

    assert_eq!(cfg.stage("check")?.steps[0].name, "lint-only");
    Ok(())
}

#[test]
fn loading_goes_through_the_filesystem_abstraction() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/Stagerun.toml", RELEASE);

    let cfg = load_and_validate(&fs, "/proj/Stagerun.toml")?;
    assert_eq!(cfg.stages.len(), 2);

    let err = load_and_validate(&fs, "/proj/missing.toml").unwrap_err();
    assert!(matches!(err, StagerunError::Other(_)), "{err:?}");
    Ok(())
}

#[test]
fn invalid_toml_is_reported() {
    let file = write_config("[[stage.x.step]\naction = ");
    let err = load_and_validate(&RealFileSystem, file.path()).unwrap_err();
    assert!(matches!(err, StagerunError::TomlError(_)), "{err:?}");
    assert!(err.is_config_error());
}

#[test]
fn config_without_stages_is_rejected() {
    let err = parse_and_validate("[action.a]\ncmd = 'true'\n").unwrap_err();
    assert!(err.to_string().contains("at least one"), "{err}");
}

#[test]
fn zero_max_parallel_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_max_parallel(0)
        .with_action("a", cmd_action("true"))
        .with_step("s", StepConfigBuilder::new("a").build())
        .raw();
    let err = stagerun::config::ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("max_parallel"), "{err}");
}

#[test]
fn action_must_have_exactly_one_shape() {
    let cases = [
        ("[action.a]\ndescription = 'nothing'\n", "must set one of"),
        ("[action.a]\ncmd = 'x'\nbuiltin = 'y'\n", "only one of"),
        (
            "[action.a]\ncmd = 'x'\n[[action.a.variant]]\nif = 'true'\ncmd = 'y'\n",
            "only one of",
        ),
        (
            "[[action.a.variant]]\nif = 'true'\n",
            "variant #1 must set exactly one",
        ),
    ];

    for (action, expected) in cases {
        let text = format!("{action}\n[[stage.s.step]]\naction = 'a'\n");
        let err = parse_and_validate(&text).unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "config:\n{text}\nerror: {err}"
        );
    }
}

#[test]
fn step_with_both_if_and_only_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_action("a", cmd_action("true"))
        .with_step(
            "s",
            StepConfigBuilder::new("a").when("true").only(&["ci"]).build(),
        )
        .raw();
    let err = stagerun::config::ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("both `if` and `only`"), "{err}");
}

#[test]
fn duplicate_step_names_need_an_explicit_name() -> TestResult {
    let builder = || {
        ConfigFileBuilder::new()
            .with_action("test", cmd_action("cargo test"))
            .with_step("s", StepConfigBuilder::new("test").build())
    };

    let err = stagerun::config::ConfigFile::try_from(
        builder()
            .with_step("s", StepConfigBuilder::new("test").build())
            .raw(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("more than once"), "{err}");

    let cfg = builder()
        .with_step(
            "s",
            StepConfigBuilder::new("test")
                .name("test-again")
                .requires("test")
                .build(),
        )
        .build();
    assert_eq!(cfg.stage("s")?.steps.len(), 2);
    Ok(())
}

#[test]
fn graph_errors_surface_at_load_time() {
    let err = parse_and_validate(
        "[action.a]\ncmd = 'x'\n\
         [[stage.s.step]]\naction = 'a'\nname = 'one'\nrequires = ['two']\n\
         [[stage.s.step]]\naction = 'a'\nname = 'two'\nrequires = ['one']\n",
    )
    .unwrap_err();
    assert!(matches!(err, StagerunError::DagCycle { .. }), "{err:?}");

    let err = parse_and_validate("[[stage.s.step]]\naction = 'nope'\n").unwrap_err();
    assert!(matches!(err, StagerunError::UnknownAction { .. }), "{err:?}");
}

#[test]
fn unknown_builtin_is_rejected_before_running() {
    let cfg = ConfigFileBuilder::new()
        .with_action(
            "pkg",
            stagerun::config::ActionConfig {
                variants: vec![
                    variant("os == 'linux'", "tar czf out.tgz ."),
                    stagerun::config::VariantConfig {
                        guard: "true".to_string(),
                        cmd: None,
                        builtin: Some("zip".to_string()),
                    },
                ],
                ..Default::default()
            },
        )
        .with_step("s", StepConfigBuilder::new("pkg").build())
        .build();

    match validate_builtins(&cfg.actions, &BuiltinRegistry::new()) {
        Err(StagerunError::UnknownBuiltin { action, builtin }) => {
            assert_eq!(action, "pkg");
            assert_eq!(builtin, "zip");
        }
        other => panic!("expected UnknownBuiltin, got {other:?}"),
    }
}

#[test]
fn workdir_is_relative_to_the_config_file() {
    let config = Path::new("/repo/ci/Stagerun.toml");
    assert_eq!(resolve_workdir(config, None), PathBuf::from("/repo/ci"));
    assert_eq!(
        resolve_workdir(config, Some(Path::new(".."))),
        PathBuf::from("/repo/ci/..")
    );
    assert_eq!(
        resolve_workdir(config, Some(Path::new("/abs"))),
        PathBuf::from("/abs")
    );
    assert_eq!(resolve_workdir(Path::new("Stagerun.toml"), None), PathBuf::from("."));
}

#[test]
fn context_combines_config_inputs_and_cli() -> TestResult {
    let cfg = parse_and_validate(RELEASE)?;
    let args = CliArgs::try_parse_from([
        "stagerun",
        "release",
        "--input",
        "target=aarch64-apple-darwin",
        "--set",
        "profile=dev",
        "--label",
        "nightly",
    ])?;

    let ctx = build_context(&cfg, &args)?;
    assert_eq!(
        ctx.get("inputs.target"),
        Some(&Value::from("aarch64-apple-darwin"))
    );
    assert_eq!(ctx.get("profile"), Some(&Value::from("dev")));
    assert_eq!(ctx.get("jobs"), Some(&Value::Num(8.0)));
    assert!(ctx.has_label("ci"));
    assert!(ctx.has_label("nightly"));
    assert!(ctx.has_label(std::env::consts::OS));

    let stages = selected_stages(&cfg, &args.stages)?;
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].name, "release");
    Ok(())
}

#[test]
fn input_defaults_apply_and_undeclared_inputs_are_rejected() -> TestResult {
    let cfg = parse_and_validate(RELEASE)?;

    let args = CliArgs::try_parse_from(["stagerun"])?;
    let ctx = build_context(&cfg, &args)?;
    assert_eq!(
        ctx.get("inputs.target"),
        Some(&Value::from("x86_64-unknown-linux-gnu"))
    );
    assert_eq!(selected_stages(&cfg, &args.stages)?.len(), 2);

    let args = CliArgs::try_parse_from(["stagerun", "--input", "nope=1"])?;
    let err = build_context(&cfg, &args).unwrap_err();
    assert!(err.to_string().contains("nope"), "{err}");

    let args = CliArgs::try_parse_from(["stagerun", "missing-stage"])?;
    assert!(matches!(
        selected_stages(&cfg, &args.stages),
        Err(StagerunError::StageNotFound(_))
    ));
    Ok(())
}

#[test]
fn cli_rejects_zero_parallelism_and_list_with_dry_run() {
    assert!(CliArgs::try_parse_from(["stagerun", "-j", "0"]).is_err());
    assert!(CliArgs::try_parse_from(["stagerun", "--list", "--dry-run"]).is_err());
    let args = CliArgs::try_parse_from(["stagerun", "-j", "2", "--dry-run"]).unwrap();
    assert_eq!(args.max_parallel, Some(2));
    assert!(args.dry_run);
}

#[test]
fn config_path_defaults_to_stagerun_toml() {
    let args = CliArgs::try_parse_from(["stagerun"]).unwrap();
    assert_eq!(args.config, default_config_path());
    assert_eq!(args.config, PathBuf::from("Stagerun.toml"));

    let args = CliArgs::try_parse_from(["stagerun", "--config", "ci/other.toml"]).unwrap();
    assert_eq!(args.config, PathBuf::from("ci/other.toml"));
}

#[cfg(unix)]
#[test]
fn non_utf8_environment_does_not_abort_the_run() -> TestResult {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let file = write_config(RELEASE);
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_stagerun"))
        .arg("--config")
        .arg(file.path())
        .arg("--dry-run")
        .env("STAGERUN_TEST_BAD_ENV", OsStr::from_bytes(&[0x66, 0xff, 0x6f]))
        .output()?;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stage 'release' (3 steps):"), "{stdout}");
    Ok(())
}
