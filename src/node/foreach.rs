use std::convert::Infallible;

use crate::{
    context::{Bindings, SqlContext, synthetic_alias},
    evaluator::{EvalError, ExpressionEvaluator},
    node::SqlNode,
    scanner::TokenScanner,
    value::Value,
};

/// Iterates a collection, applying the body once per element.
///
/// Each element gets a fresh id from the call's counter. The item and index
/// are bound both under their plain aliases and under synthetic names built
/// from that id, and every `#{alias...}` placeholder the body writes is
/// renamed to the synthetic form. The accumulated SQL therefore refers to a
/// distinct binding per element, even for nested loops reusing an alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachNode {
    collection: String,
    item: Option<String>,
    index: Option<String>,
    open: Option<String>,
    close: Option<String>,
    separator: Option<String>,
    body: Box<SqlNode>,
}

impl ForEachNode {
    pub fn new(collection: impl Into<String>, body: SqlNode) -> Self {
        ForEachNode {
            collection: collection.into(),
            item: None,
            index: None,
            open: None,
            close: None,
            separator: None,
            body: Box::new(body),
        }
    }

    pub fn item(mut self, alias: impl Into<String>) -> Self {
        self.item = Some(alias.into());
        self
    }

    pub fn index(mut self, alias: impl Into<String>) -> Self {
        self.index = Some(alias.into());
        self
    }

    pub fn open(mut self, open: impl Into<String>) -> Self {
        self.open = Some(open.into());
        self
    }

    pub fn close(mut self, close: impl Into<String>) -> Self {
        self.close = Some(close.into());
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn item_alias(&self) -> Option<&str> {
        self.item.as_deref()
    }

    pub fn index_alias(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn body(&self) -> &SqlNode {
        &self.body
    }

    pub(crate) fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool, EvalError> {
        let entries = ctx
            .evaluator()
            .eval_iterable(&self.collection, ctx.bindings())?;
        if entries.is_empty() {
            return Ok(true);
        }
        let count = entries.len();

        if let Some(open) = &self.open {
            ctx.append_sql(open);
        }

        let mut first = true;
        for entry in entries {
            let uid = ctx.next_unique_id();
            if let Some(index) = self.index.as_deref() {
                ctx.bind(index, entry.index.clone());
                ctx.bind(&synthetic_alias(index, uid), entry.index);
            }
            if let Some(item) = self.item.as_deref() {
                ctx.bind(item, entry.item.clone());
                ctx.bind(&synthetic_alias(item, uid), entry.item);
            }

            let separator = if first { None } else { self.separator.as_deref() };
            let mut separated = SeparatorContext::new(&mut *ctx, separator);
            {
                let mut aliased = AliasContext::new(
                    &mut separated,
                    self.item.as_deref(),
                    self.index.as_deref(),
                    uid,
                );
                self.body.apply(&mut aliased)?;
            }
            if separated.contributed() {
                first = false;
            }
        }

        if let Some(close) = &self.close {
            ctx.append_sql(close);
        }
        for alias in [&self.item, &self.index].into_iter().flatten() {
            ctx.unbind(alias);
        }

        tracing::trace!(collection = %self.collection, count, "expanded foreach");
        Ok(true)
    }
}

/// Rewrites the leading `alias` of a placeholder body to `replacement`.
///
/// Leading whitespace is dropped. The alias only matches as a whole word:
/// it must be followed by the end of the text, whitespace, or one of
/// `.` `,` `:` `[`. Returns `None` when the alias does not lead `content`.
///
/// ```
/// use sqlweave::node::foreach::rewrite_leading_alias;
///
/// assert_eq!(
///     rewrite_leading_alias(" item.name,jdbcType=VARCHAR", "item", "__gen_item_0").as_deref(),
///     Some("__gen_item_0.name,jdbcType=VARCHAR"),
/// );
/// assert_eq!(rewrite_leading_alias("items", "item", "__gen_item_0"), None);
/// ```
pub fn rewrite_leading_alias(content: &str, alias: &str, replacement: &str) -> Option<String> {
    if alias.is_empty() {
        return None;
    }
    let rest = content.trim_start().strip_prefix(alias)?;
    match rest.chars().next() {
        None => {}
        Some(c) if c.is_whitespace() || matches!(c, '.' | ',' | ':' | '[') => {}
        Some(_) => return None,
    }
    Some(format!("{replacement}{rest}"))
}

/// Emits the separator before the first non-blank fragment of an element.
struct SeparatorContext<'a> {
    parent: &'a mut dyn SqlContext,
    separator: Option<&'a str>,
    contributed: bool,
}

impl<'a> SeparatorContext<'a> {
    fn new(parent: &'a mut dyn SqlContext, separator: Option<&'a str>) -> Self {
        SeparatorContext {
            parent,
            separator,
            contributed: false,
        }
    }

    /// Whether the element wrote anything other than whitespace.
    fn contributed(&self) -> bool {
        self.contributed
    }
}

impl SqlContext for SeparatorContext<'_> {
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
        if !self.contributed && !fragment.trim().is_empty() {
            if let Some(separator) = self.separator {
                self.parent.append_sql(separator);
            }
            self.contributed = true;
        }
        self.parent.append_sql(fragment);
    }

    fn next_unique_id(&mut self) -> usize {
        self.parent.next_unique_id()
    }

    fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.parent.evaluator()
    }
}

/// Renames loop aliases inside `#{}` placeholders to their synthetic form.
struct AliasContext<'a> {
    parent: &'a mut dyn SqlContext,
    item: Option<(&'a str, String)>,
    index: Option<(&'a str, String)>,
}

impl<'a> AliasContext<'a> {
    fn new(
        parent: &'a mut dyn SqlContext,
        item: Option<&'a str>,
        index: Option<&'a str>,
        uid: usize,
    ) -> Self {
        let mint = |alias: &'a str| (alias, synthetic_alias(alias, uid));
        AliasContext {
            parent,
            item: item.map(mint),
            index: index.map(mint),
        }
    }

    fn rename(&self, content: &str) -> String {
        let renamed = self
            .item
            .as_ref()
            .and_then(|(alias, synthetic)| rewrite_leading_alias(content, alias, synthetic))
            .or_else(|| {
                self.index
                    .as_ref()
                    .and_then(|(alias, synthetic)| rewrite_leading_alias(content, alias, synthetic))
            });
        format!("#{{{}}}", renamed.as_deref().unwrap_or(content))
    }
}

impl SqlContext for AliasContext<'_> {
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
        let rewritten = match TokenScanner::placeholders()
            .scan::<Infallible, _>(fragment, |content| Ok(self.rename(content)))
        {
            Ok(sql) => sql,
            Err(never) => match never {},
        };
        self.parent.append_sql(&rewritten);
    }

    fn next_unique_id(&mut self) -> usize {
        self.parent.next_unique_id()
    }

    fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.parent.evaluator()
    }
}
