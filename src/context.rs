//! Per-call mutable state threaded through node evaluation.
//!
//! A [`DynamicContext`] owns the SQL buffer, the bindings and the unique-id
//! counter for exactly one `Template::apply` call. Nodes only ever see it as
//! `&mut dyn SqlContext`, so directive nodes can interpose wrapper contexts
//! (the trim buffer, the foreach separator and alias rewriting) that forward
//! bindings and ids to the real context while intercepting SQL text.

use std::collections::BTreeMap;

use crate::{evaluator::ExpressionEvaluator, value::Value};

/// Reserved binding holding the caller's parameter object.
pub const PARAMETER_OBJECT_KEY: &str = "_parameter";

/// Reserved binding holding the configured database id (null when unset).
pub const DATABASE_ID_KEY: &str = "_databaseId";

/// Prefix of every synthetic foreach alias.
pub const SYNTHETIC_ALIAS_PREFIX: &str = "__gen_";

/// Mints the collision-free per-iteration name for a loop alias.
///
/// The result is always a valid identifier of the expression language as
/// long as `alias` is one.
pub fn synthetic_alias(alias: &str, unique_id: usize) -> String {
    format!("{SYNTHETIC_ALIAS_PREFIX}{alias}_{unique_id}")
}

/// Name-to-value table visible to every expression evaluated during a call.
///
/// Bindings are flat: a nested node sees and may overwrite anything bound by
/// its ancestors. A name that is not bound falls back to the field of the
/// same name on the parameter object, when the parameter is an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: BTreeMap<String, Value>,
}

impl Bindings {
    /// Bindings seeded with the parameter object and database id.
    pub fn new(parameter: Value, database_id: Option<&str>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PARAMETER_OBJECT_KEY.to_string(), parameter);
        entries.insert(DATABASE_ID_KEY.to_string(), Value::from(database_id));
        Bindings { entries }
    }

    pub fn parameter(&self) -> &Value {
        self.entries
            .get(PARAMETER_OBJECT_KEY)
            .unwrap_or(&Value::Null)
    }

    /// Exact lookup, without the parameter fallback.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Lookup used by expressions: bound names first, then parameter fields.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).or_else(|| match self.parameter() {
            Value::Object(fields) => fields.get(name),
            _ => None,
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.entries
    }
}

/// The interface nodes use to contribute SQL text and bindings.
pub trait SqlContext {
    fn bindings(&self) -> &Bindings;

    /// Inserts or overwrites a binding.
    fn bind(&mut self, name: &str, value: Value);

    fn unbind(&mut self, name: &str);

    fn append_sql(&mut self, fragment: &str);

    /// Returns the current counter value, then increments it.
    fn next_unique_id(&mut self) -> usize;

    fn evaluator(&self) -> &dyn ExpressionEvaluator;
}

/// Appends `fragment` to `buffer` with the single-space separator policy.
///
/// Empty fragments are dropped. A space is inserted unless the buffer is
/// empty, whitespace already sits at the boundary, the buffer ends with `(`
/// or `,`, or the fragment starts with `)` or `,`.
pub fn append_fragment(buffer: &mut String, fragment: &str) {
    let Some(first) = fragment.chars().next() else {
        return;
    };
    if let Some(last) = buffer.chars().next_back() {
        let glued = last.is_whitespace()
            || first.is_whitespace()
            || matches!(last, '(' | ',')
            || matches!(first, ')' | ',');
        if !glued {
            buffer.push(' ');
        }
    }
    buffer.push_str(fragment);
}

/// The root context of one `Template::apply` call.
pub struct DynamicContext<'e> {
    sql: String,
    bindings: Bindings,
    unique_counter: usize,
    evaluator: &'e dyn ExpressionEvaluator,
}

impl<'e> DynamicContext<'e> {
    pub fn new(
        parameter: Value,
        database_id: Option<&str>,
        evaluator: &'e dyn ExpressionEvaluator,
    ) -> Self {
        DynamicContext {
            sql: String::new(),
            bindings: Bindings::new(parameter, database_id),
            unique_counter: 0,
            evaluator,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Consumes the context, returning the accumulated text and bindings.
    pub fn into_parts(self) -> (String, Bindings) {
        (self.sql, self.bindings)
    }
}

impl SqlContext for DynamicContext<'_> {
    fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn bind(&mut self, name: &str, value: Value) {
        self.bindings.insert(name, value);
    }

    fn unbind(&mut self, name: &str) {
        self.bindings.remove(name);
    }

    fn append_sql(&mut self, fragment: &str) {
        append_fragment(&mut self.sql, fragment);
    }

    fn next_unique_id(&mut self) -> usize {
        let id = self.unique_counter;
        self.unique_counter += 1;
        id
    }

    fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.evaluator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;

    fn joined(fragments: &[&str]) -> String {
        let mut buffer = String::new();
        for fragment in fragments {
            append_fragment(&mut buffer, fragment);
        }
        buffer
    }

    #[test]
    fn words_are_separated_by_one_space() {
        assert_eq!(
            joined(&["SELECT *", "FROM blog", "WHERE id = #{id}"]),
            "SELECT * FROM blog WHERE id = #{id}"
        );
    }

    #[test]
    fn existing_whitespace_is_not_doubled() {
        assert_eq!(joined(&["SELECT * FROM t ", "WHERE x"]), "SELECT * FROM t WHERE x");
        assert_eq!(joined(&["a", " OR ", "b"]), "a OR b");
    }

    #[test]
    fn list_punctuation_is_glued() {
        assert_eq!(joined(&["IN ", "(", "#{a}", ",", "#{b}", ")"]), "IN (#{a},#{b})");
    }

    #[test]
    fn empty_fragments_are_dropped() {
        assert_eq!(joined(&["", "a", "", "b"]), "a b");
    }

    #[test]
    fn unique_ids_increase_monotonically() {
        let evaluator = Evaluator::new();
        let mut ctx = DynamicContext::new(Value::Null, None, &evaluator);
        assert_eq!(ctx.next_unique_id(), 0);
        assert_eq!(ctx.next_unique_id(), 1);
        assert_eq!(ctx.next_unique_id(), 2);
    }

    #[test]
    fn lookup_falls_back_to_parameter_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), Value::from("rust"));
        let mut bindings = Bindings::new(Value::Object(fields), Some("postgres"));

        assert_eq!(bindings.lookup("title"), Some(&Value::from("rust")));
        assert_eq!(bindings.get("title"), None);
        assert_eq!(bindings.lookup(DATABASE_ID_KEY), Some(&Value::from("postgres")));

        bindings.insert("title", Value::from("bound"));
        assert_eq!(bindings.lookup("title"), Some(&Value::from("bound")));
    }

    #[test]
    fn synthetic_alias_format() {
        assert_eq!(synthetic_alias("item", 3), "__gen_item_3");
    }
}
