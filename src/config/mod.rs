// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file through the [`FileSystem`](crate::fs::FileSystem)
//!   abstraction (`loader.rs`).
//! - Validate it and convert it into actions and stages (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    default_config_path, load_and_validate, load_from_path, parse_and_validate, resolve_workdir,
};
pub use model::{
    ActionConfig, ConfigFile, ConfigSection, InputConfig, RawConfigFile, StageConfig, StepConfig,
    VariantConfig,
};
pub use validate::validate_builtins;
