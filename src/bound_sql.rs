//! The driver-ready result of applying a template.
//!
//! After the node tree has run, the accumulated text still carries `#{...}`
//! placeholders. [`assemble`] replaces each one, left to right, with the
//! driver's positional marker and records a [`ParameterMapping`] and the
//! resolved value for it. Marker `n` in the SQL always corresponds to
//! `parameter_mappings[n - 1]` and `parameters[n - 1]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    context::Bindings,
    error::SqlError,
    evaluator::ExpressionEvaluator,
    scanner::TokenScanner,
    value::Value,
};

/// Positional parameter marker flavour of the target driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `?` (JDBC, MySQL, SQLite)
    #[default]
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `:1`, `:2`, ... (Oracle)
    Colon,
    /// `@p1`, `@p2`, ... (SQL Server)
    AtP,
}

impl PlaceholderStyle {
    /// Marker for the `position`-th parameter, counted from 1.
    pub fn marker(self, position: usize) -> String {
        match self {
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::Dollar => format!("${position}"),
            PlaceholderStyle::Colon => format!(":{position}"),
            PlaceholderStyle::AtP => format!("@p{position}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl std::str::FromStr for ParameterMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(ParameterMode::In),
            "OUT" => Ok(ParameterMode::Out),
            "INOUT" => Ok(ParameterMode::InOut),
            _ => Err(()),
        }
    }
}

/// Metadata parsed from one `#{...}` placeholder.
///
/// Type information is passed through untouched; the engine never interprets
/// it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMapping {
    pub property: String,
    pub mode: ParameterMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jdbc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jdbc_type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_handler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_map: Option<String>,
}

impl ParameterMapping {
    /// Parses a placeholder body such as `id`, `name:VARCHAR`,
    /// `(a + 1),jdbcType=INTEGER` or `price, javaType=double, numericScale=2`.
    pub fn parse(content: &str) -> Result<Self, SqlError> {
        let invalid = |reason: String| SqlError::InvalidMapping {
            content: content.to_string(),
            reason,
        };

        let text = content.trim();
        let (property, rest) = if let Some(inner) = text.strip_prefix('(') {
            let close = matching_paren(inner)
                .ok_or_else(|| invalid("unbalanced parentheses in expression".into()))?;
            (inner[..close].trim(), inner[close + 1..].trim_start())
        } else {
            let end = text.find([',', ':']).unwrap_or(text.len());
            (text[..end].trim(), &text[end..])
        };
        if property.is_empty() {
            return Err(invalid("missing property".into()));
        }

        let mut mapping = ParameterMapping {
            property: property.to_string(),
            ..Default::default()
        };

        let attributes = if let Some(shorthand) = rest.strip_prefix(':') {
            let end = shorthand.find(',').unwrap_or(shorthand.len());
            let jdbc_type = shorthand[..end].trim();
            if jdbc_type.is_empty() {
                return Err(invalid("missing jdbc type after ':'".into()));
            }
            mapping.jdbc_type = Some(jdbc_type.to_string());
            &shorthand[end..]
        } else {
            rest
        };

        let attributes = match attributes.strip_prefix(',') {
            Some(list) => list,
            None if attributes.trim().is_empty() => "",
            None => return Err(invalid(format!("unexpected '{}'", attributes.trim()))),
        };

        for pair in attributes.split(',').filter(|p| !p.trim().is_empty()) {
            let Some((name, value)) = pair.split_once('=') else {
                return Err(invalid(format!("attribute '{}' has no value", pair.trim())));
            };
            let (name, value) = (name.trim(), value.trim().to_string());
            match name {
                "javaType" => mapping.java_type = Some(value),
                "jdbcType" => mapping.jdbc_type = Some(value),
                "jdbcTypeName" => mapping.jdbc_type_name = Some(value),
                "typeHandler" => mapping.type_handler = Some(value),
                "resultMap" => mapping.result_map = Some(value),
                "mode" => {
                    mapping.mode = value
                        .parse()
                        .map_err(|_| invalid(format!("unknown mode '{value}'")))?;
                }
                "numericScale" => {
                    mapping.numeric_scale = Some(
                        value
                            .parse()
                            .map_err(|_| invalid(format!("invalid numericScale '{value}'")))?,
                    );
                }
                other => return Err(invalid(format!("unknown attribute '{other}'"))),
            }
        }
        Ok(mapping)
    }

    /// Leading identifier of the property path (`user` for `user.name[0]`).
    pub fn root_name(&self) -> &str {
        let end = self
            .property
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(self.property.len());
        &self.property[..end]
    }
}

fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// SQL ready for the driver together with its ordered parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundSql {
    pub sql: String,
    pub parameter_mappings: Vec<ParameterMapping>,
    pub parameters: Vec<Value>,
    /// Every binding visible at the end of the call, including synthetic
    /// foreach aliases.
    pub additional_parameters: BTreeMap<String, Value>,
}

impl BoundSql {
    pub fn additional_parameter(&self, name: &str) -> Option<&Value> {
        self.additional_parameters.get(name)
    }

    pub fn has_additional_parameter(&self, name: &str) -> bool {
        self.additional_parameters.contains_key(name)
    }
}

/// Replaces the placeholders in `sql` and resolves their values.
pub fn assemble(
    sql: &str,
    bindings: Bindings,
    style: PlaceholderStyle,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<BoundSql, SqlError> {
    let mut parameter_mappings = Vec::new();
    let mut parameters = Vec::new();

    let sql = TokenScanner::placeholders().scan(sql, |content| {
        let mapping = ParameterMapping::parse(content)?;
        parameters.push(resolve(&mapping, &bindings, evaluator)?);
        parameter_mappings.push(mapping);
        Ok::<_, SqlError>(style.marker(parameter_mappings.len()))
    })?;

    Ok(BoundSql {
        sql,
        parameter_mappings,
        parameters,
        additional_parameters: bindings.into_map(),
    })
}

fn resolve(
    mapping: &ParameterMapping,
    bindings: &Bindings,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<Value, SqlError> {
    if bindings.contains(mapping.root_name()) {
        return Ok(evaluator.eval_value(&mapping.property, bindings)?);
    }
    let parameter = bindings.parameter();
    if parameter.is_scalar() {
        // Null included: any name resolves to the parameter itself.
        return Ok(parameter.clone());
    }
    Ok(evaluator.eval_value(&mapping.property, bindings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;

    #[test]
    fn parses_plain_property() {
        let mapping = ParameterMapping::parse(" id ").unwrap();
        assert_eq!(mapping.property, "id");
        assert_eq!(mapping.jdbc_type, None);
        assert_eq!(mapping.mode, ParameterMode::In);
    }

    #[test]
    fn parses_jdbc_type_shorthand_and_attributes() {
        let mapping = ParameterMapping::parse("name:VARCHAR, typeHandler=Trim").unwrap();
        assert_eq!(mapping.property, "name");
        assert_eq!(mapping.jdbc_type.as_deref(), Some("VARCHAR"));
        assert_eq!(mapping.type_handler.as_deref(), Some("Trim"));

        let mapping =
            ParameterMapping::parse("price,javaType=double,numericScale=2,mode=INOUT").unwrap();
        assert_eq!(mapping.java_type.as_deref(), Some("double"));
        assert_eq!(mapping.numeric_scale, Some(2));
        assert_eq!(mapping.mode, ParameterMode::InOut);
    }

    #[test]
    fn parses_parenthesised_expression() {
        let mapping = ParameterMapping::parse("(a + (b * 2)), jdbcType=INTEGER").unwrap();
        assert_eq!(mapping.property, "a + (b * 2)");
        assert_eq!(mapping.jdbc_type.as_deref(), Some("INTEGER"));
    }

    #[test]
    fn rejects_unknown_attributes() {
        assert!(matches!(
            ParameterMapping::parse("id, color=red"),
            Err(SqlError::InvalidMapping { .. })
        ));
        assert!(ParameterMapping::parse("").is_err());
        assert!(ParameterMapping::parse("id, jdbcType").is_err());
        assert!(ParameterMapping::parse("(a + 1").is_err());
    }

    #[test]
    fn root_name_stops_at_path_separators() {
        let mapping = ParameterMapping::parse("user.tags[0]").unwrap();
        assert_eq!(mapping.root_name(), "user");
    }

    #[test]
    fn markers_follow_style() {
        assert_eq!(PlaceholderStyle::Question.marker(3), "?");
        assert_eq!(PlaceholderStyle::Dollar.marker(3), "$3");
        assert_eq!(PlaceholderStyle::Colon.marker(1), ":1");
        assert_eq!(PlaceholderStyle::AtP.marker(2), "@p2");
    }

    #[test]
    fn scalar_parameter_answers_every_name() {
        let evaluator = Evaluator::new();
        let bindings = Bindings::new(Value::from(42), None);
        let bound = assemble(
            "SELECT * FROM t WHERE id = #{anything}",
            bindings,
            PlaceholderStyle::Dollar,
            &evaluator,
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM t WHERE id = $1");
        assert_eq!(bound.parameters, vec![Value::from(42)]);
    }
}
