// tests/template_tests.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlweave::context::Bindings;
use sqlweave::evaluator::{EvalError, ExpressionEvaluator};
use sqlweave::node::{ForEachNode, TrimNode};
use sqlweave::properties::{KEY_ENABLE_DEFAULT_VALUE, Properties, substitute};
use sqlweave::{
    BuildError, Configuration, Directive, ParameterMode, PlaceholderStyle, SqlError, SqlNode,
    Template, Value,
};

fn json_object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = BTreeMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

fn directives(json: &str) -> Vec<Directive> {
    serde_json::from_str(json).unwrap()
}

fn build(json: &str) -> Template {
    Template::build(&directives(json), &Configuration::default()).unwrap()
}

/// Counts `#{` openings the way the assembler sees them.
fn placeholder_count(sql: &str) -> usize {
    sqlweave::TokenScanner::placeholders().tokens(sql).len()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_foreach_in_list() {
    let template = Template::new(SqlNode::mixed(vec![
        SqlNode::text("SELECT * FROM POST WHERE ID IN "),
        ForEachNode::new("list", SqlNode::text("#{item}"))
            .item("item")
            .open("(")
            .close(")")
            .separator(",")
            .into(),
    ]));
    let bound = template
        .apply(json_object(vec![("list", Value::from(vec![1, 2, 3]))]))
        .unwrap();

    assert_eq!(bound.sql, "SELECT * FROM POST WHERE ID IN (?,?,?)");
    let properties: Vec<_> = bound
        .parameter_mappings
        .iter()
        .map(|m| m.property.as_str())
        .collect();
    assert_eq!(properties, vec!["__gen_item_0", "__gen_item_1", "__gen_item_2"]);
    assert_eq!(
        bound.parameters,
        vec![Value::from(1), Value::from(2), Value::from(3)]
    );
    assert_eq!(bound.additional_parameter("__gen_item_2"), Some(&Value::from(3)));
    assert!(!bound.has_additional_parameter("item"));
}

#[test]
fn test_set_with_skipped_first_assignment() {
    let template = Template::new(SqlNode::mixed(vec![
        SqlNode::text("UPDATE author"),
        SqlNode::trim(
            TrimNode::new(SqlNode::mixed(vec![
                SqlNode::if_("username!=null", SqlNode::text("username=#{username},")),
                SqlNode::if_("email!=null", SqlNode::text("email=#{email},")),
            ]))
            .prefix("SET")
            .suffix_overrides([","]),
        ),
        SqlNode::text("WHERE id = #{id}"),
    ]));
    let bound = template
        .apply(json_object(vec![
            ("id", Value::from(7)),
            ("email", Value::from("jim@example.com")),
        ]))
        .unwrap();

    assert_eq!(bound.sql, "UPDATE author SET email=? WHERE id = ?");
    assert_eq!(
        bound.parameters,
        vec![Value::from("jim@example.com"), Value::from(7)]
    );
}

#[test]
fn test_where_with_two_conditions() {
    let template = build(
        r#"[
            { "type": "where", "body": [
                { "type": "if", "test": "state != null",
                  "body": [{ "type": "text", "content": "AND state=#{state}" }] },
                { "type": "if", "test": "title != null",
                  "body": [{ "type": "text", "content": "AND title=#{title}" }] }
            ]}
        ]"#,
    );
    let bound = template
        .apply(json_object(vec![
            ("state", Value::from("ACTIVE")),
            ("title", Value::from("Rust")),
        ]))
        .unwrap();

    assert_eq!(bound.sql, "WHERE state=? AND title=?");
    assert_eq!(
        bound.parameters,
        vec![Value::from("ACTIVE"), Value::from("Rust")]
    );
}

#[test]
fn test_default_value_substitution() {
    let props: Properties = [(KEY_ENABLE_DEFAULT_VALUE.to_string(), "true".to_string())]
        .into_iter()
        .collect();
    assert_eq!(substitute("${db.user:guest}", Some(&props)), "guest");
}

// ============================================================================
// Building
// ============================================================================

#[test]
fn test_build_substitutes_configuration_variables() {
    let config = Configuration::default().with_variable("schema", "blog");
    let template = Template::build(
        &directives(r#"[{ "type": "text", "content": "SELECT * FROM ${schema}.post" }]"#),
        &config,
    )
    .unwrap();

    assert!(!template.is_dynamic());
    assert_eq!(template.apply(Value::Null).unwrap().sql, "SELECT * FROM blog.post");
}

#[test]
fn test_unresolved_variables_stay_dynamic() {
    let template = build(r#"[{ "type": "text", "content": "ORDER BY ${column}" }]"#);
    assert!(template.is_dynamic());
    let bound = template
        .apply(json_object(vec![("column", Value::from("title"))]))
        .unwrap();
    assert_eq!(bound.sql, "ORDER BY title");
}

#[test]
fn test_build_rejects_malformed_expressions() {
    let result = Template::build(
        &directives(
            r#"[{ "type": "if", "test": "title !=",
                  "body": [{ "type": "text", "content": "x" }] }]"#,
        ),
        &Configuration::default(),
    );
    match result {
        Err(BuildError::Expression { expression, .. }) => assert_eq!(expression, "title !="),
        other => panic!("Expected expression error, got {:?}", other),
    }
}

#[test]
fn test_build_rejects_bad_foreach_and_bind() {
    let config = Configuration::default();
    let missing = directives(r#"[{ "type": "foreach", "collection": " ", "body": [] }]"#);
    assert_eq!(
        Template::build(&missing, &config).unwrap_err(),
        BuildError::MissingCollection
    );

    let alias = directives(r#"[{ "type": "foreach", "collection": "ids", "item": "a b", "body": [] }]"#);
    assert!(matches!(
        Template::build(&alias, &config),
        Err(BuildError::InvalidAlias { role: "item", .. })
    ));

    let bind = directives(r#"[{ "type": "bind", "name": "", "value": "1" }]"#);
    assert_eq!(
        Template::build(&bind, &config).unwrap_err(),
        BuildError::MissingBindName
    );

    let choose = directives(r#"[{ "type": "choose", "when": [] }]"#);
    assert_eq!(
        Template::build(&choose, &config).unwrap_err(),
        BuildError::EmptyChoose
    );
}

// ============================================================================
// Injection filter
// ============================================================================

fn order_by_template(filter: &str) -> Template {
    let config = Configuration::default().with_injection_filter(filter);
    Template::build(
        &directives(r#"[{ "type": "text", "content": "SELECT * FROM t ORDER BY ${col}" }]"#),
        &config,
    )
    .unwrap()
}

#[test]
fn test_injection_filter_rejects_statement_text() {
    let template = order_by_template("[A-Za-z0-9_.]+");
    match template.apply(json_object(vec![("col", Value::from("id; DROP TABLE t"))])) {
        Err(SqlError::Eval(EvalError::InjectionRejected { value, .. })) => {
            assert_eq!(value, "id; DROP TABLE t")
        }
        other => panic!("Expected rejected value, got {:?}", other),
    }
}

#[test]
fn test_injection_filter_accepts_matching_values() {
    let template = order_by_template("[A-Za-z0-9_.]+");
    let bound = template
        .apply(json_object(vec![("col", Value::from("created_at"))]))
        .unwrap();
    assert_eq!(bound.sql, "SELECT * FROM t ORDER BY created_at");

    // alternatives are matched against the whole value
    let template = order_by_template("id|id DESC");
    let bound = template
        .apply(json_object(vec![("col", Value::from("id DESC"))]))
        .unwrap();
    assert_eq!(bound.sql, "SELECT * FROM t ORDER BY id DESC");
}

#[test]
fn test_without_filter_values_are_spliced() {
    let template = build(r#"[{ "type": "text", "content": "ORDER BY ${col}" }]"#);
    let bound = template
        .apply(json_object(vec![("col", Value::from("id; DROP TABLE t"))]))
        .unwrap();
    assert_eq!(bound.sql, "ORDER BY id; DROP TABLE t");
}

#[test]
fn test_invalid_injection_filter_fails_the_build() {
    let config = Configuration::default().with_injection_filter("(");
    let result = Template::build(
        &directives(r#"[{ "type": "text", "content": "x" }]"#),
        &config,
    );
    assert!(matches!(
        result,
        Err(BuildError::InjectionFilter { ref pattern, .. }) if pattern == "("
    ));
}

#[test]
fn test_full_directive_document() {
    let template = build(
        r##"[
            { "type": "bind", "name": "pattern", "value": "'%' + title + '%'" },
            { "type": "text", "content": "SELECT * FROM post" },
            { "type": "where", "body": [
                { "type": "choose",
                  "when": [
                    { "test": "title != null",
                      "body": [{ "type": "text", "content": "AND title LIKE #{pattern}" }] }
                  ],
                  "otherwise": [{ "type": "text", "content": "AND featured = 1" }] },
                { "type": "foreach", "collection": "ids", "item": "id",
                  "open": "AND id IN (", "close": ")", "separator": ",",
                  "body": [{ "type": "text", "content": "#{id}" }] }
            ]},
            { "type": "trim", "prefix": "ORDER BY", "suffix_overrides": ",",
              "body": [{ "type": "text", "content": "created_at DESC," }] }
        ]"##,
    );

    let bound = template
        .apply(json_object(vec![
            ("title", Value::from("rust")),
            ("ids", Value::from(vec![4, 5])),
        ]))
        .unwrap();
    assert_eq!(
        bound.sql,
        "SELECT * FROM post WHERE title LIKE ? AND id IN (?,?) ORDER BY created_at DESC"
    );
    assert_eq!(
        bound.parameters,
        vec![Value::from("%rust%"), Value::from(4), Value::from(5)]
    );
}

// ============================================================================
// Assembly
// ============================================================================

#[test]
fn test_placeholder_styles() {
    let template = Template::new(SqlNode::text("a = #{a} AND b = #{b}"));
    let param = json_object(vec![("a", Value::from(1)), ("b", Value::from(2))]);

    let cases = [
        (PlaceholderStyle::Question, "a = ? AND b = ?"),
        (PlaceholderStyle::Dollar, "a = $1 AND b = $2"),
        (PlaceholderStyle::Colon, "a = :1 AND b = :2"),
        (PlaceholderStyle::AtP, "a = @p1 AND b = @p2"),
    ];
    for (style, expected) in cases {
        let bound = template
            .clone()
            .with_placeholder_style(style)
            .apply(param.clone())
            .unwrap();
        assert_eq!(bound.sql, expected, "Failed for style: {:?}", style);
    }
}

#[test]
fn test_mapping_metadata_passes_through() {
    let template = Template::new(SqlNode::text(
        "CALL p(#{id, mode=IN, jdbcType=INTEGER}, #{name:VARCHAR}, #{total, mode=OUT, javaType=long})",
    ));
    let bound = template
        .apply(json_object(vec![("id", Value::from(1)), ("name", Value::from("n"))]))
        .unwrap();

    assert_eq!(bound.sql, "CALL p(?, ?, ?)");
    let mappings = &bound.parameter_mappings;
    assert_eq!(mappings[0].jdbc_type.as_deref(), Some("INTEGER"));
    assert_eq!(mappings[1].jdbc_type.as_deref(), Some("VARCHAR"));
    assert_eq!(mappings[2].mode, ParameterMode::Out);
    assert_eq!(mappings[2].java_type.as_deref(), Some("long"));
    assert_eq!(bound.parameters[2], Value::Null);
}

#[test]
fn test_invalid_mapping_aborts_the_call() {
    let template = Template::new(SqlNode::text("id = #{id, colour=blue}"));
    assert!(matches!(
        template.apply(json_object(vec![("id", Value::from(1))])),
        Err(SqlError::InvalidMapping { .. })
    ));
}

#[test]
fn test_scalar_and_null_parameters() {
    let template = Template::new(SqlNode::text("SELECT * FROM post WHERE id = #{id}"));
    let bound = template.apply(Value::from(42)).unwrap();
    assert_eq!(bound.parameters, vec![Value::from(42)]);

    let bound = template.apply(Value::Null).unwrap();
    assert_eq!(bound.parameters, vec![Value::Null]);
}

#[test]
fn test_nested_property_paths() {
    let template = Template::new(SqlNode::text("#{author.name} #{tags[1]}"));
    let param = json_object(vec![
        ("author", json_object(vec![("name", Value::from("jim"))])),
        ("tags", Value::from(vec!["a", "b"])),
    ]);
    let bound = template.apply(param).unwrap();
    assert_eq!(bound.parameters, vec![Value::from("jim"), Value::from("b")]);
}

#[test]
fn test_database_id_is_bound() {
    let template = Template::new(SqlNode::choose(
        vec![sqlweave::node::IfNode::new(
            "_databaseId == 'postgres'",
            SqlNode::text("LIMIT #{n}"),
        )],
        Some(SqlNode::text("FETCH FIRST #{n} ROWS ONLY")),
    ));
    let param = json_object(vec![("n", Value::from(5))]);

    let bound = template.clone().with_database_id("postgres").apply(param.clone()).unwrap();
    assert_eq!(bound.sql, "LIMIT ?");
    let bound = template.apply(param).unwrap();
    assert_eq!(bound.sql, "FETCH FIRST ? ROWS ONLY");
}

#[test]
fn test_placeholder_count_matches_mappings() {
    let template = build(
        r#"[
            { "type": "text", "content": "INSERT INTO t (a, b) VALUES" },
            { "type": "foreach", "collection": "rows", "item": "r", "separator": ",",
              "body": [{ "type": "text", "content": "(#{r.a}, #{r.b})" }] }
        ]"#,
    );
    let rows = Value::from(vec![
        json_object(vec![("a", Value::from(1)), ("b", Value::from(2))]),
        json_object(vec![("a", Value::from(3)), ("b", Value::from(4))]),
    ]);
    let bound = template.apply(json_object(vec![("rows", rows)])).unwrap();

    assert_eq!(bound.sql, "INSERT INTO t (a, b) VALUES (?, ?),(?, ?)");
    assert_eq!(placeholder_count(&bound.sql), 0);
    assert_eq!(bound.sql.matches('?').count(), bound.parameter_mappings.len());
    assert_eq!(
        bound.parameters,
        vec![Value::from(1), Value::from(2), Value::from(3), Value::from(4)]
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_null_collection_aborts_the_call() {
    let template = build(
        r##"[{ "type": "foreach", "collection": "ids", "item": "id",
              "body": [{ "type": "text", "content": "#{id}" }] }]"##,
    );
    match template.apply(json_object(vec![])) {
        Err(SqlError::Eval(EvalError::NullIterable { expression })) => {
            assert_eq!(expression, "ids")
        }
        other => panic!("Expected null iterable error, got {:?}", other),
    }
}

#[test]
fn test_scalar_collection_aborts_the_call() {
    let template = build(
        r##"[{ "type": "foreach", "collection": "ids", "item": "id",
              "body": [{ "type": "text", "content": "#{id}" }] }]"##,
    );
    assert!(matches!(
        template.apply(json_object(vec![("ids", Value::from("1,2"))])),
        Err(SqlError::Eval(EvalError::NotIterable { .. }))
    ));
}

#[test]
fn test_empty_collection_and_empty_where() {
    let template = build(
        r##"[
            { "type": "text", "content": "SELECT * FROM post" },
            { "type": "where", "body": [
                { "type": "foreach", "collection": "ids", "item": "id",
                  "open": "id IN (", "close": ")", "separator": ",",
                  "body": [{ "type": "text", "content": "#{id}" }] }
            ]}
        ]"##,
    );
    let bound = template
        .apply(json_object(vec![("ids", Value::Array(vec![]))]))
        .unwrap();
    assert_eq!(bound.sql, "SELECT * FROM post");
    assert!(bound.parameter_mappings.is_empty());
}

// ============================================================================
// Custom evaluator
// ============================================================================

/// Treats every expression as the name of a binding.
struct NameOnly;

impl ExpressionEvaluator for NameOnly {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value, EvalError> {
        Ok(bindings.lookup(expression.trim()).cloned().unwrap_or(Value::Null))
    }
}

#[test]
fn test_custom_evaluator() {
    let template = Template::new(SqlNode::mixed(vec![
        SqlNode::text("SELECT 1"),
        SqlNode::if_("flag", SqlNode::text("WHERE x = #{x}")),
    ]))
    .with_evaluator(Arc::new(NameOnly));

    let bound = template
        .apply(json_object(vec![("flag", Value::from(true)), ("x", Value::from(9))]))
        .unwrap();
    assert_eq!(bound.sql, "SELECT 1 WHERE x = ?");
    assert_eq!(bound.parameters, vec![Value::from(9)]);
}

#[test]
fn test_templates_are_shareable_across_threads() {
    let template = Arc::new(build(
        r#"[{ "type": "text", "content": "SELECT #{n}" }]"#,
    ));
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let template = Arc::clone(&template);
            std::thread::spawn(move || template.apply(json_object(vec![("n", Value::from(n))])))
        })
        .collect();
    for (n, handle) in handles.into_iter().enumerate() {
        let bound = handle.join().unwrap().unwrap();
        assert_eq!(bound.parameters, vec![Value::from(n)]);
    }
}
