//! # sqlweave
//!
//! Dynamic SQL composition: a statement is declared once as a tree of text
//! and directives (`if`, `choose`, `foreach`, `where`, `set`, `trim`,
//! `bind`), then applied to a parameter object on every call to produce
//! driver-ready SQL with an ordered parameter list.
//!
//! ```
//! use sqlweave::{SqlNode, Template, Value};
//! use sqlweave::node::ForEachNode;
//!
//! let template = Template::new(SqlNode::mixed(vec![
//!     SqlNode::text("SELECT * FROM post WHERE id IN"),
//!     ForEachNode::new("list", SqlNode::text("#{item}"))
//!         .item("item")
//!         .open("(")
//!         .close(")")
//!         .separator(",")
//!         .into(),
//! ]));
//!
//! let list: Value = vec![1, 2, 3].into();
//! let bound = template.apply(Value::Object([("list".to_string(), list)].into())).unwrap();
//! assert_eq!(bound.sql, "SELECT * FROM post WHERE id IN (?,?,?)");
//! assert_eq!(bound.parameters, vec![Value::from(1), Value::from(2), Value::from(3)]);
//! ```

pub mod ast;
pub mod bound_sql;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod properties;
pub mod scanner;
pub mod template;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, Token, UnaryOp};
pub use bound_sql::{BoundSql, ParameterMapping, ParameterMode, PlaceholderStyle};
pub use config::{ConfigError, Configuration};
pub use context::{Bindings, DynamicContext, SqlContext};
pub use error::{BuildError, SqlError};
pub use evaluator::{EvalError, Evaluator, ExpressionEvaluator, IterEntry};
pub use lexer::{LexError, Lexer};
pub use node::SqlNode;
pub use parser::{ParseError, Parser, parse_expression};
pub use properties::{Properties, substitute};
pub use scanner::TokenScanner;
pub use template::{Directive, Template, WhenBranch};
pub use value::Value;
