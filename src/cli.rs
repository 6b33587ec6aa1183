// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `stagerun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagerun",
    version,
    about = "Run stages of dependent steps in parallel, with output in declaration order.",
    long_about = None
)]
pub struct CliArgs {
    /// Stages to run, in this order. Default: every stage, by name.
    #[arg(value_name = "STAGE")]
    pub stages: Vec<String>,

    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Maximum number of steps running at once.
    ///
    /// Overrides `[config].max_parallel`; default is the number of logical cores.
    #[arg(short = 'j', long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_parallel: Option<u32>,

    /// Set an expression variable, overriding every other source.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Set a declared input (visible as `inputs.NAME`).
    #[arg(long = "input", value_name = "NAME=VALUE")]
    pub inputs: Vec<String>,

    /// Activate an extra label for `only = [...]` filters.
    #[arg(long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    /// Referencing an unknown variable is an error instead of "".
    #[arg(long)]
    pub strict_variables: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGERUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print each stage's resolved plan, but don't execute
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// List stages and their steps, then exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub list: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
