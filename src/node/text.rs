use regex::Regex;

use crate::{
    context::SqlContext,
    evaluator::EvalError,
    scanner::TokenScanner,
};

/// Binding under which a scalar parameter is exposed to `${}` tokens.
pub const VALUE_ALIAS: &str = "value";

/// Literal SQL, possibly containing `${expr}` tokens.
///
/// `#{}` placeholders are left untouched here; they are resolved by the
/// assembler once the whole tree has been applied.
#[derive(Debug, Clone)]
pub struct TextNode {
    content: String,
    dynamic: bool,
    injection_filter: Option<Regex>,
}

impl PartialEq for TextNode {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
            && self.injection_filter.as_ref().map(Regex::as_str)
                == other.injection_filter.as_ref().map(Regex::as_str)
    }
}

impl TextNode {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let dynamic = TokenScanner::static_tokens().contains_token(&content);
        TextNode {
            content,
            dynamic,
            injection_filter: None,
        }
    }

    /// Rejects any `${}` value that `filter` does not match in full.
    ///
    /// The leftmost match must span the value, so alternations should be
    /// anchored (`^(?:a|ab)$`). [`Template::build`](crate::Template::build)
    /// anchors the configured pattern itself.
    pub fn injection_filter(mut self, filter: Regex) -> Self {
        self.injection_filter = Some(filter);
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the content holds at least one `${}` token.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Inner texts of the `${}` tokens, in document order.
    pub fn static_tokens(&self) -> Vec<String> {
        if !self.dynamic {
            return Vec::new();
        }
        TokenScanner::static_tokens().tokens(&self.content)
    }

    pub(crate) fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool, EvalError> {
        if !self.dynamic {
            ctx.append_sql(&self.content);
            return Ok(true);
        }

        let parameter = ctx.bindings().parameter();
        if parameter.is_scalar() {
            let parameter = parameter.clone();
            ctx.bind(VALUE_ALIAS, parameter);
        }

        let filter = self.injection_filter.as_ref();
        let sql = TokenScanner::static_tokens().scan(&self.content, |expression| {
            let value = ctx
                .evaluator()
                .eval_value(expression, ctx.bindings())?
                .to_sql_string();
            check_injection(filter, value)
        })?;
        ctx.append_sql(&sql);
        Ok(true)
    }
}

fn check_injection(filter: Option<&Regex>, value: String) -> Result<String, EvalError> {
    match filter {
        Some(filter) if !fully_matches(filter, &value) => Err(EvalError::InjectionRejected {
            value,
            pattern: filter.as_str().to_string(),
        }),
        _ => Ok(value),
    }
}

fn fully_matches(filter: &Regex, value: &str) -> bool {
    filter
        .find(value)
        .is_some_and(|m| m.start() == 0 && m.end() == value.len())
}
