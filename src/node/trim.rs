use crate::{
    context::{Bindings, SqlContext, append_fragment},
    evaluator::{EvalError, ExpressionEvaluator},
    node::SqlNode,
    value::Value,
};

const WHERE_PREFIX_OVERRIDES: [&str; 8] = [
    "AND ", "OR ", "AND\n", "OR\n", "AND\r", "OR\r", "AND\t", "OR\t",
];

/// Buffers its body's output, then rewrites the boundaries once.
///
/// When the trimmed body is non-empty, the first prefix override (in
/// declared order) the body starts with is removed, case-insensitively, and
/// `prefix` is prepended; likewise the first matching suffix override is
/// removed from the end and `suffix` is appended. A blank body produces no
/// output at all, so an empty `WHERE` or `SET` never appears.
///
/// Overrides are matched in order and only one is removed per side. With
/// overlapping overrides such as `"AND "` and `"AND"` the declared order
/// decides which span goes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimNode {
    body: Box<SqlNode>,
    prefix: Option<String>,
    suffix: Option<String>,
    prefix_overrides: Vec<String>,
    suffix_overrides: Vec<String>,
}

impl TrimNode {
    pub fn new(body: SqlNode) -> Self {
        TrimNode {
            body: Box::new(body),
            prefix: None,
            suffix: None,
            prefix_overrides: Vec::new(),
            suffix_overrides: Vec::new(),
        }
    }

    pub fn where_clause(body: SqlNode) -> Self {
        TrimNode::new(body)
            .prefix("WHERE")
            .prefix_overrides(WHERE_PREFIX_OVERRIDES)
    }

    pub fn set_clause(body: SqlNode) -> Self {
        TrimNode::new(body)
            .prefix("SET")
            .prefix_overrides([","])
            .suffix_overrides([","])
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn prefix_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.prefix_overrides = normalize_overrides(overrides);
        self
    }

    pub fn suffix_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.suffix_overrides = normalize_overrides(overrides);
        self
    }

    /// Splits a `|`-separated override list such as `"AND |OR "`.
    pub fn parse_overrides(overrides: &str) -> Vec<String> {
        normalize_overrides(overrides.split('|'))
    }

    pub fn body(&self) -> &SqlNode {
        &self.body
    }

    pub(crate) fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool, EvalError> {
        let mut buffered = TrimContext::new(&mut *ctx);
        let result = self.body.apply(&mut buffered)?;
        let body = buffered.into_buffer();

        ctx.append_sql(&self.rewrite(&body));
        Ok(result)
    }

    /// Applies the prefix and suffix rules to buffered body text.
    pub fn rewrite(&self, body: &str) -> String {
        let mut sql = body.trim().to_string();
        if sql.is_empty() {
            return sql;
        }
        let upper = sql.to_ascii_uppercase();

        if let Some(matched) = self
            .prefix_overrides
            .iter()
            .find(|candidate| upper.starts_with(candidate.as_str()))
        {
            sql.replace_range(..matched.len(), "");
            tracing::trace!(removed = %matched.escape_debug(), "trimmed prefix override");
        }
        if let Some(prefix) = &self.prefix {
            sql.insert(0, ' ');
            sql.insert_str(0, prefix);
        }

        for candidate in &self.suffix_overrides {
            let trimmed = candidate.trim();
            let span = if upper.ends_with(candidate.as_str()) {
                candidate.len()
            } else if !trimmed.is_empty() && upper.ends_with(trimmed) {
                trimmed.len()
            } else {
                continue;
            };
            let cut = sql.len().saturating_sub(span);
            if sql.is_char_boundary(cut) {
                sql.truncate(cut);
                tracing::trace!(removed = %candidate.escape_debug(), "trimmed suffix override");
            }
            break;
        }
        if let Some(suffix) = &self.suffix {
            sql.push(' ');
            sql.push_str(suffix);
        }
        sql
    }
}

/// Upper-cases overrides for case-insensitive matching and drops empties.
fn normalize_overrides<I, S>(overrides: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    overrides
        .into_iter()
        .map(|o| o.as_ref().to_ascii_uppercase())
        .filter(|o| !o.is_empty())
        .collect()
}

/// Collects the body's SQL privately; everything else reaches the parent.
struct TrimContext<'a> {
    parent: &'a mut dyn SqlContext,
    buffer: String,
}

impl<'a> TrimContext<'a> {
    fn new(parent: &'a mut dyn SqlContext) -> Self {
        TrimContext {
            parent,
            buffer: String::new(),
        }
    }

    fn into_buffer(self) -> String {
        self.buffer
    }
}

impl SqlContext for TrimContext<'_> {
    fn bindings(&self) -> &Bindings {
        self.parent.bindings()
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.parent.bind(name, value);
    }

    fn unbind(&mut self, name: &str) {
        self.parent.unbind(name);
    }

    fn append_sql(&mut self, fragment: &str) {
        append_fragment(&mut self.buffer, fragment);
    }

    fn next_unique_id(&mut self) -> usize {
        self.parent.next_unique_id()
    }

    fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.parent.evaluator()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn where_node() -> TrimNode {
        TrimNode::where_clause(SqlNode::mixed(vec![]))
    }

    #[test]
    fn where_strips_first_connective_only() {
        assert_eq!(
            where_node().rewrite("AND state = 1 AND title = 2"),
            "WHERE state = 1 AND title = 2"
        );
        assert_eq!(where_node().rewrite("  or x = 1  "), "WHERE x = 1");
    }

    #[test]
    fn where_keeps_identifiers_that_start_with_a_connective() {
        assert_eq!(where_node().rewrite("ORDER_ID = 1"), "WHERE ORDER_ID = 1");
        assert_eq!(where_node().rewrite("AND\tx = 1"), "WHERE x = 1");
    }

    #[test]
    fn blank_body_produces_nothing() {
        assert_eq!(where_node().rewrite("   \n "), "");
        let set = TrimNode::set_clause(SqlNode::mixed(vec![]));
        assert_eq!(set.rewrite(""), "");
    }

    #[test]
    fn set_strips_trailing_comma() {
        let set = TrimNode::set_clause(SqlNode::mixed(vec![]));
        assert_eq!(set.rewrite("a = 1, b = 2,"), "SET a = 1, b = 2");
        assert_eq!(set.rewrite(", a = 1"), "SET  a = 1");
    }

    #[test]
    fn prefix_and_suffix_wrap_the_body() {
        let node = TrimNode::new(SqlNode::mixed(vec![]))
            .prefix("(")
            .suffix(")")
            .suffix_overrides(TrimNode::parse_overrides(" OR|AND"));
        assert_eq!(node.rewrite("a = 1 OR b = 2 OR"), "( a = 1 OR b = 2 )");
    }

    #[test]
    fn overlapping_overrides_follow_declared_order() {
        let spaced_first = TrimNode::new(SqlNode::mixed(vec![]))
            .prefix("WHERE")
            .prefix_overrides(["AND ", "AND"]);
        assert_eq!(spaced_first.rewrite("AND x = 1"), "WHERE x = 1");

        let bare_first = TrimNode::new(SqlNode::mixed(vec![]))
            .prefix("WHERE")
            .prefix_overrides(["AND", "AND "]);
        // "AND" wins, the following space stays, no second pass
        assert_eq!(bare_first.rewrite("AND x = 1"), "WHERE  x = 1");
    }

    #[test]
    fn parse_overrides_drops_empty_entries() {
        assert_eq!(TrimNode::parse_overrides("and |or ||"), vec!["AND ", "OR "]);
    }
}
