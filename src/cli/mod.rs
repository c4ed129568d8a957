//! CLI support for sqlweave
//!
//! Provides programmatic access to the `sqlweave` subcommands so they can be
//! embedded in other tools.

mod check;
mod render;

pub use check::{CheckOptions, CheckReport, execute_check};
pub use render::{RenderOptions, execute_render, load_template};

use std::{io, path::Path};

use thiserror::Error;

use crate::{BuildError, ConfigError, Configuration, SqlError};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Template error: {0}")]
    Build(#[from] BuildError),

    #[error("Render error: {0}")]
    Sql(#[from] SqlError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No parameters provided. Use --params or pipe JSON to stdin.")]
    NoInput,
}

/// Loads the configuration file when given, else the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Configuration, CliError> {
    match path {
        Some(path) => Ok(Configuration::from_path(path)?),
        None => Ok(Configuration::default()),
    }
}

/// Runs the static property substitutor over `text`.
pub fn execute_substitute(text: &str, config: &Configuration) -> String {
    crate::substitute(text, Some(&config.variables))
}
