use thiserror::Error;

use crate::{evaluator::EvalError, parser::ParseError};

/// Errors raised while turning a directive tree into a [`Template`](crate::Template).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("Invalid expression '{expression}': {source}")]
    Expression {
        expression: String,
        #[source]
        source: ParseError,
    },

    #[error("foreach requires a collection expression")]
    MissingCollection,

    #[error("'{alias}' is not a valid {role} alias")]
    InvalidAlias { role: &'static str, alias: String },

    #[error("bind requires a name")]
    MissingBindName,

    #[error("choose requires at least one when branch")]
    EmptyChoose,

    #[error("Invalid injection filter '{pattern}': {source}")]
    InjectionFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while applying a template to a parameter object.
///
/// No partial result is ever returned alongside one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Invalid parameter mapping '#{{{content}}}': {reason}")]
    InvalidMapping { content: String, reason: String },
}
