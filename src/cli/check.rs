//! Validate template files without applying them

use std::path::PathBuf;

use serde::Serialize;

use super::{CliError, load_config, load_template};
use crate::SqlNode;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Path of the JSON directive file
    pub template: PathBuf,
    /// Optional configuration file
    pub config: Option<PathBuf>,
}

/// Summary of a template that built successfully
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub dynamic: bool,
    pub expressions: Vec<String>,
}

/// Build the template and report what it contains
pub fn execute_check(options: &CheckOptions) -> Result<CheckReport, CliError> {
    let config = load_config(options.config.as_deref())?;
    let template = load_template(&options.template, &config)?;

    Ok(CheckReport {
        dynamic: template.is_dynamic(),
        expressions: collect_expressions(template.root()),
    })
}

fn collect_expressions(root: &SqlNode) -> Vec<String> {
    let mut expressions = Vec::new();
    root.visit_expressions(&mut |expression: &str| expressions.push(expression.to_string()));
    expressions
}
