//! Apply template files to JSON parameters

use std::{fs, path::{Path, PathBuf}};

use super::{CliError, load_config};
use crate::{BoundSql, Configuration, Directive, Template, Value};

/// Options for the render command
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Path of the JSON directive file
    pub template: PathBuf,
    /// JSON parameter object
    pub params: Option<String>,
    /// Optional configuration file
    pub config: Option<PathBuf>,
}

/// Reads a directive file and builds it.
pub fn load_template(path: &Path, config: &Configuration) -> Result<Template, CliError> {
    let text = fs::read_to_string(path)?;
    let directives: Vec<Directive> = serde_json::from_str(&text)?;
    Ok(Template::build(&directives, config)?)
}

/// Build the template and apply it to the parameters
pub fn execute_render(options: &RenderOptions) -> Result<BoundSql, CliError> {
    let json = options.params.as_ref().ok_or(CliError::NoInput)?;
    let parameter: serde_json::Value = serde_json::from_str(json)?;

    let config = load_config(options.config.as_deref())?;
    let template = load_template(&options.template, &config)?;
    Ok(template.apply(Value::from(parameter))?)
}
