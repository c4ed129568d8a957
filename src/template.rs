//! Templates: immutable node trees built once and applied per call.
//!
//! A template is usually built from a [`Directive`] list, the serialisable
//! form of a statement's dynamic SQL:
//!
//! ```json
//! [
//!   { "type": "text", "content": "SELECT * FROM ${schema}.post" },
//!   { "type": "where", "body": [
//!     { "type": "if", "test": "title != null",
//!       "body": [{ "type": "text", "content": "AND title = #{title}" }] }
//!   ]}
//! ]
//! ```
//!
//! Building substitutes configuration variables into the text, checks every
//! expression once, and produces a [`Template`] that can be shared freely
//! between threads.

use std::{fmt, sync::Arc};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    bound_sql::{BoundSql, PlaceholderStyle, assemble},
    config::Configuration,
    context::DynamicContext,
    error::{BuildError, SqlError},
    evaluator::{Evaluator, ExpressionEvaluator},
    node::{ForEachNode, IfNode, SqlNode, TextNode, TrimNode},
    parser::parse_expression,
    properties::{Properties, substitute},
    value::Value,
};

/// One element of the serialisable template format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Text {
        content: String,
    },
    If {
        test: String,
        body: Vec<Directive>,
    },
    Choose {
        when: Vec<WhenBranch>,
        #[serde(default)]
        otherwise: Option<Vec<Directive>>,
    },
    Foreach {
        collection: String,
        #[serde(default)]
        item: Option<String>,
        #[serde(default)]
        index: Option<String>,
        #[serde(default)]
        open: Option<String>,
        #[serde(default)]
        close: Option<String>,
        #[serde(default)]
        separator: Option<String>,
        body: Vec<Directive>,
    },
    Trim {
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
        /// `|`-separated, e.g. `"AND |OR "`
        #[serde(default)]
        prefix_overrides: Option<String>,
        #[serde(default)]
        suffix_overrides: Option<String>,
        body: Vec<Directive>,
    },
    Where {
        body: Vec<Directive>,
    },
    Set {
        body: Vec<Directive>,
    },
    Bind {
        name: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenBranch {
    pub test: String,
    pub body: Vec<Directive>,
}

/// A compiled statement template.
#[derive(Clone)]
pub struct Template {
    root: SqlNode,
    style: PlaceholderStyle,
    database_id: Option<String>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("root", &self.root)
            .field("style", &self.style)
            .field("database_id", &self.database_id)
            .finish_non_exhaustive()
    }
}

impl Template {
    /// Wraps a programmatically built tree, with default settings and the
    /// shared evaluator. No build-time checks or substitution are applied.
    pub fn new(root: SqlNode) -> Self {
        Template {
            root,
            style: PlaceholderStyle::default(),
            database_id: None,
            evaluator: Evaluator::shared(),
        }
    }

    /// Builds a template from directives.
    pub fn build(directives: &[Directive], config: &Configuration) -> Result<Self, BuildError> {
        let scope = BuildScope::new(config)?;
        let root = SqlNode::mixed(build_nodes(directives, &scope)?);

        let mut invalid = None;
        root.visit_expressions(&mut |expression: &str| {
            if invalid.is_none()
                && let Err(source) = parse_expression(expression)
            {
                invalid = Some(BuildError::Expression {
                    expression: expression.to_string(),
                    source,
                });
            }
        });
        if let Some(err) = invalid {
            return Err(err);
        }

        debug!(dynamic = root.is_dynamic(), "built template");
        Ok(Template {
            root,
            style: config.placeholder_style,
            database_id: config.database_id.clone(),
            evaluator: Evaluator::shared(),
        })
    }

    /// Replaces the expression evaluator used by [`apply`](Self::apply).
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = Some(database_id.into());
        self
    }

    pub fn root(&self) -> &SqlNode {
        &self.root
    }

    /// Whether the output can vary with the parameter object.
    pub fn is_dynamic(&self) -> bool {
        self.root.is_dynamic()
    }

    /// Applies the template to one parameter object.
    pub fn apply(&self, parameter: Value) -> Result<BoundSql, SqlError> {
        let evaluator = self.evaluator.as_ref();
        let mut ctx = DynamicContext::new(parameter, self.database_id.as_deref(), evaluator);
        self.root.apply(&mut ctx)?;

        let (sql, bindings) = ctx.into_parts();
        let bound = assemble(&sql, bindings, self.style, evaluator)?;
        debug!(
            sql = %bound.sql,
            parameters = bound.parameter_mappings.len(),
            "assembled bound sql"
        );
        Ok(bound)
    }
}

/// Settings resolved once per [`Template::build`] call.
struct BuildScope<'c> {
    variables: &'c Properties,
    injection_filter: Option<Regex>,
}

impl<'c> BuildScope<'c> {
    fn new(config: &'c Configuration) -> Result<Self, BuildError> {
        let injection_filter = config
            .injection_filter
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                    BuildError::InjectionFilter {
                        pattern: pattern.to_string(),
                        source,
                    }
                })
            })
            .transpose()?;
        Ok(BuildScope {
            variables: &config.variables,
            injection_filter,
        })
    }

    fn text(&self, content: &str) -> SqlNode {
        let node = TextNode::new(substitute(content, Some(self.variables)));
        match &self.injection_filter {
            Some(filter) => node.injection_filter(filter.clone()).into(),
            None => node.into(),
        }
    }
}

fn build_nodes(directives: &[Directive], scope: &BuildScope<'_>) -> Result<Vec<SqlNode>, BuildError> {
    directives
        .iter()
        .map(|directive| build_node(directive, scope))
        .collect()
}

fn build_body(directives: &[Directive], scope: &BuildScope<'_>) -> Result<SqlNode, BuildError> {
    let mut nodes = build_nodes(directives, scope)?;
    if nodes.len() == 1
        && let Some(node) = nodes.pop()
    {
        return Ok(node);
    }
    Ok(SqlNode::mixed(nodes))
}

fn build_node(directive: &Directive, scope: &BuildScope<'_>) -> Result<SqlNode, BuildError> {
    let node = match directive {
        Directive::Text { content } => scope.text(content),
        Directive::If { test, body } => SqlNode::if_(test.as_str(), build_body(body, scope)?),
        Directive::Choose { when, otherwise } => {
            if when.is_empty() {
                return Err(BuildError::EmptyChoose);
            }
            let branches = when
                .iter()
                .map(|branch| {
                    let body = build_body(&branch.body, scope)?;
                    Ok::<_, BuildError>(IfNode::new(branch.test.as_str(), body))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let otherwise = otherwise
                .as_deref()
                .map(|body| build_body(body, scope))
                .transpose()?;
            SqlNode::choose(branches, otherwise)
        }
        Directive::Foreach {
            collection,
            item,
            index,
            open,
            close,
            separator,
            body,
        } => {
            if collection.trim().is_empty() {
                return Err(BuildError::MissingCollection);
            }
            let mut node = ForEachNode::new(collection.as_str(), build_body(body, scope)?);
            if let Some(item) = item {
                node = node.item(checked_alias("item", item)?);
            }
            if let Some(index) = index {
                node = node.index(checked_alias("index", index)?);
            }
            if let Some(open) = open {
                node = node.open(open.as_str());
            }
            if let Some(close) = close {
                node = node.close(close.as_str());
            }
            if let Some(separator) = separator {
                node = node.separator(separator.as_str());
            }
            node.into()
        }
        Directive::Trim {
            prefix,
            suffix,
            prefix_overrides,
            suffix_overrides,
            body,
        } => {
            let mut node = TrimNode::new(build_body(body, scope)?);
            if let Some(prefix) = prefix {
                node = node.prefix(prefix.as_str());
            }
            if let Some(suffix) = suffix {
                node = node.suffix(suffix.as_str());
            }
            if let Some(overrides) = prefix_overrides {
                node = node.prefix_overrides(TrimNode::parse_overrides(overrides));
            }
            if let Some(overrides) = suffix_overrides {
                node = node.suffix_overrides(TrimNode::parse_overrides(overrides));
            }
            node.into()
        }
        Directive::Where { body } => SqlNode::where_(build_body(body, scope)?),
        Directive::Set { body } => SqlNode::set(build_body(body, scope)?),
        Directive::Bind { name, value } => {
            if name.trim().is_empty() {
                return Err(BuildError::MissingBindName);
            }
            SqlNode::bind(name.trim(), value.as_str())
        }
    };
    Ok(node)
}

/// Loop aliases end up inside placeholder text, so they must be plain
/// identifiers.
fn checked_alias<'a>(role: &'static str, alias: &'a str) -> Result<&'a str, BuildError> {
    let mut chars = alias.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(alias)
    } else {
        Err(BuildError::InvalidAlias {
            role,
            alias: alias.to_string(),
        })
    }
}
