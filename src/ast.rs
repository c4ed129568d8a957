//! # Expression language - Abstract Syntax Tree
//!
//! Directive attributes (`test`, `collection`, `bind` values) and the
//! property part of `#{}` / `${}` tokens are written in a small expression
//! language. This module defines its syntax tree:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, references, access, operations)
//! - **[operators]** - Unary and binary operators
//!
//! ## Examples
//!
//! ```text
//! username != null and username.trim() != ''
//! ids != null && ids.size() > 0
//! author.name
//! rows[0]['id']
//! ```
//!
//! Names resolve against the per-call bindings first; a name that is not
//! bound falls back to the field of the same name on the parameter object.
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::Expr;
pub use operators::{BinOp, UnaryOp};
pub use tokens::Token;
