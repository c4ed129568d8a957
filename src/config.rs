//! Build-time settings shared by every template of a registry.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{bound_sql::PlaceholderStyle, properties::Properties};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration consulted when templates are built and applied.
///
/// ```
/// use sqlweave::{Configuration, PlaceholderStyle};
///
/// let config = Configuration::from_json_str(
///     r#"{ "variables": { "schema": "blog" }, "placeholder_style": "dollar" }"#,
/// ).unwrap();
/// assert_eq!(config.placeholder_style, PlaceholderStyle::Dollar);
/// assert_eq!(config.variables["schema"], "blog");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Static `${key}` table applied to template text at build time.
    pub variables: Properties,
    pub placeholder_style: PlaceholderStyle,
    /// Exposed to expressions as `_databaseId`.
    pub database_id: Option<String>,
    /// Regex every `${}` value must match in full, e.g. `[A-Za-z0-9_.]+`.
    pub injection_filter: Option<String>,
}

impl Configuration {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = Some(database_id.into());
        self
    }

    pub fn with_injection_filter(mut self, pattern: impl Into<String>) -> Self {
        self.injection_filter = Some(pattern.into());
        self
    }
}
