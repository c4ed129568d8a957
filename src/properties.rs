//! Static `${key}` substitution from a property table.
//!
//! This is the configuration-time phase: text is rewritten from a flat
//! string table before any parameter is seen. Tokens that cannot be resolved
//! are left in place as `${key}` so that the runtime phase can still bind
//! them against the parameter object.

use std::collections::BTreeMap;

use crate::scanner::TokenScanner;

/// Static property table.
pub type Properties = BTreeMap<String, String>;

/// Reserved key enabling `${key:default}` syntax (`"true"` / `"false"`).
pub const KEY_ENABLE_DEFAULT_VALUE: &str = "sqlweave.properties.enable-default-value";

/// Reserved key overriding the key/default separator.
pub const KEY_DEFAULT_VALUE_SEPARATOR: &str = "sqlweave.properties.default-value-separator";

const DEFAULT_SEPARATOR: &str = ":";

/// Substitutes every `${...}` token in `text` from `properties`.
///
/// # Examples
///
/// ```
/// use sqlweave::properties::{substitute, Properties, KEY_ENABLE_DEFAULT_VALUE};
///
/// let mut props = Properties::new();
/// props.insert("schema".into(), "blog".into());
/// assert_eq!(substitute("SELECT * FROM ${schema}.post", Some(&props)), "SELECT * FROM blog.post");
/// assert_eq!(substitute("${missing}", Some(&props)), "${missing}");
///
/// props.insert(KEY_ENABLE_DEFAULT_VALUE.into(), "true".into());
/// assert_eq!(substitute("${db.user:guest}", Some(&props)), "guest");
/// ```
pub fn substitute(text: &str, properties: Option<&Properties>) -> String {
    let resolver = PropertyResolver::new(properties);
    match TokenScanner::static_tokens()
        .scan::<std::convert::Infallible, _>(text, |content| Ok(resolver.resolve(content)))
    {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

struct PropertyResolver<'p> {
    properties: Option<&'p Properties>,
    enable_default_value: bool,
    separator: &'p str,
}

impl<'p> PropertyResolver<'p> {
    fn new(properties: Option<&'p Properties>) -> Self {
        let setting = |key: &str| properties.and_then(|p| p.get(key)).map(String::as_str);
        PropertyResolver {
            properties,
            enable_default_value: setting(KEY_ENABLE_DEFAULT_VALUE)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            separator: setting(KEY_DEFAULT_VALUE_SEPARATOR).unwrap_or(DEFAULT_SEPARATOR),
        }
    }

    fn resolve(&self, content: &str) -> String {
        if let Some(properties) = self.properties {
            if self.enable_default_value
                && !self.separator.is_empty()
                && let Some((key, default)) = content.split_once(self.separator)
            {
                return properties
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| default.to_string());
            }
            if let Some(value) = properties.get(content) {
                return value.clone();
            }
        }
        tracing::trace!(token = content, "static token left unresolved");
        format!("${{{content}}}")
    }
}
