// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagerunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(
        "Configuration error: unknown dependency '{dependency}' required by step '{step}' in stage '{stage}'"
    )]
    UnknownDependency {
        stage: String,
        step: String,
        dependency: String,
    },

    #[error("Configuration error: unknown action '{action}' used by step '{step}' in stage '{stage}'")]
    UnknownAction {
        stage: String,
        step: String,
        action: String,
    },

    #[error("Configuration error: cycle in stage '{stage}': {}", members.join(" -> "))]
    DagCycle { stage: String, members: Vec<String> },

    #[error("Configuration error: action '{action}' references unknown builtin '{builtin}'")]
    UnknownBuiltin { action: String, builtin: String },

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StagerunError {
    /// Whether this error belongs to the configuration family, i.e. it was
    /// raised before anything was scheduled.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StagerunError::ConfigError(_)
                | StagerunError::UnknownDependency { .. }
                | StagerunError::UnknownAction { .. }
                | StagerunError::DagCycle { .. }
                | StagerunError::UnknownBuiltin { .. }
                | StagerunError::StageNotFound(_)
                | StagerunError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StagerunError>;
