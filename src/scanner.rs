//! Escape-aware scanner for delimited tokens such as `${name}` and `#{id}`.
//!
//! The scanner finds every `open ... close` span, hands the inner text to a
//! handler and splices the handler's output in place of the whole span.
//! A backslash directly before `open` makes it literal; a backslash before
//! `close` inside a token makes that close literal. Unterminated tokens are
//! copied through verbatim.

use std::convert::Infallible;

/// Delimiters of static `${...}` tokens.
pub const STATIC_OPEN: &str = "${";
/// Delimiters of `#{...}` placeholders.
pub const PLACEHOLDER_OPEN: &str = "#{";
pub const TOKEN_CLOSE: &str = "}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenScanner<'d> {
    open: &'d str,
    close: &'d str,
}

impl<'d> TokenScanner<'d> {
    pub const fn new(open: &'d str, close: &'d str) -> Self {
        TokenScanner { open, close }
    }

    /// Scanner for `${...}` tokens.
    pub const fn static_tokens() -> TokenScanner<'static> {
        TokenScanner::new(STATIC_OPEN, TOKEN_CLOSE)
    }

    /// Scanner for `#{...}` placeholders.
    pub const fn placeholders() -> TokenScanner<'static> {
        TokenScanner::new(PLACEHOLDER_OPEN, TOKEN_CLOSE)
    }

    /// Scans `text`, replacing each token with the handler's output.
    ///
    /// The first handler error aborts the scan.
    pub fn scan<E, F>(&self, text: &str, mut handler: F) -> Result<String, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        if text.is_empty() {
            return Ok(String::new());
        }
        let Some(mut start) = text.find(self.open) else {
            return Ok(text.to_string());
        };

        let mut builder = String::with_capacity(text.len());
        let mut expression = String::new();
        let mut offset = 0;

        loop {
            if start > offset && text[..start].ends_with('\\') {
                // Escaped open: drop the backslash, keep the delimiter.
                builder.push_str(&text[offset..start - 1]);
                builder.push_str(self.open);
                offset = start + self.open.len();
            } else {
                expression.clear();
                builder.push_str(&text[offset..start]);
                offset = start + self.open.len();

                let mut end = find_from(text, self.close, offset);
                while let Some(e) = end {
                    if e > offset && text[..e].ends_with('\\') {
                        expression.push_str(&text[offset..e - 1]);
                        expression.push_str(self.close);
                        offset = e + self.close.len();
                        end = find_from(text, self.close, offset);
                    } else {
                        expression.push_str(&text[offset..e]);
                        break;
                    }
                }

                match end {
                    None => {
                        builder.push_str(&text[start..]);
                        offset = text.len();
                    }
                    Some(e) => {
                        builder.push_str(&handler(&expression)?);
                        offset = e + self.close.len();
                    }
                }
            }

            match find_from(text, self.open, offset) {
                Some(next) => start = next,
                None => break,
            }
        }

        if offset < text.len() {
            builder.push_str(&text[offset..]);
        }
        Ok(builder)
    }

    /// Whether `text` contains at least one complete, unescaped token.
    pub fn contains_token(&self, text: &str) -> bool {
        let mut found = false;
        let _ = self.scan::<Infallible, _>(text, |_| {
            found = true;
            Ok(String::new())
        });
        found
    }

    /// Inner texts of every complete token, in document order.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let _ = self.scan::<Infallible, _>(text, |inner| {
            tokens.push(inner.to_string());
            Ok(String::new())
        });
        tokens
    }
}

fn find_from(text: &str, needle: &str, from: usize) -> Option<usize> {
    text.get(from..)?.find(needle).map(|i| i + from)
}

/// Infallible convenience form of [`TokenScanner::scan`].
pub fn scan<F>(text: &str, open: &str, close: &str, mut handler: F) -> String
where
    F: FnMut(&str) -> String,
{
    match TokenScanner::new(open, close).scan::<Infallible, _>(text, |inner| Ok(handler(inner))) {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn replace_from(vars: &HashMap<&str, &str>, text: &str) -> String {
        scan(text, "${", "}", |key| vars.get(key).copied().unwrap_or("").to_string())
    }

    #[test]
    fn replaces_every_token() {
        let vars = HashMap::from([
            ("first_name", "James"),
            ("initial", "T"),
            ("last_name", "Kirk"),
        ]);
        assert_eq!(
            replace_from(&vars, "${first_name} ${initial} ${last_name} reporting."),
            "James T Kirk reporting."
        );
        assert_eq!(replace_from(&vars, "${first_name}${initial}"), "JamesT");
    }

    #[test]
    fn escaped_close_stays_inside_token() {
        let mut seen = Vec::new();
        let out = scan("Hello ${var{with\\}brace}", "${", "}", |inner| {
            seen.push(inner.to_string());
            "X".to_string()
        });
        assert_eq!(out, "Hello X");
        assert_eq!(seen, vec!["var{with}brace"]);
    }

    #[test]
    fn escaped_open_is_literal_and_skips_handler() {
        let mut calls = 0;
        let out = scan("\\${skipped} variable", "${", "}", |_| {
            calls += 1;
            String::new()
        });
        assert_eq!(out, "${skipped} variable");
        assert_eq!(calls, 0);
    }

    #[test]
    fn unterminated_token_is_copied_verbatim() {
        let out = scan("Hello ${ this is a test.", "${", "}", |_| "X".to_string());
        assert_eq!(out, "Hello ${ this is a test.");
        let out = scan("${a} and ${b", "${", "}", |_| "X".to_string());
        assert_eq!(out, "X and ${b");
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        assert_eq!(scan("a } b {", "${", "}", |_| "X".to_string()), "a } b {");
        assert_eq!(scan("", "${", "}", |_| "X".to_string()), "");
    }

    #[test]
    fn empty_token_still_reaches_handler() {
        assert_eq!(scan("[${}]", "${", "}", |inner| format!("<{inner}>")), "[<>]");
    }

    #[test]
    fn handler_errors_abort_the_scan() {
        let result: Result<String, String> = TokenScanner::placeholders()
            .scan("#{a} #{b}", |inner| {
                if inner == "b" {
                    Err("bad".to_string())
                } else {
                    Ok("?".to_string())
                }
            });
        assert_eq!(result, Err("bad".to_string()));
    }

    #[test]
    fn detects_real_tokens_only() {
        let scanner = TokenScanner::static_tokens();
        assert!(scanner.contains_token("ORDER BY ${column}"));
        assert!(!scanner.contains_token("price \\${literal}"));
        assert!(!scanner.contains_token("cost is $5 {approx}"));
        assert_eq!(scanner.tokens("${a} \\${b} ${c}"), vec!["a", "c"]);
    }
}
