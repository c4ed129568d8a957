//! # SQL node tree
//!
//! A template is a tree of [`SqlNode`]s built once and applied once per call.
//! Applying a node mutates the call's [`SqlContext`]: it appends SQL text,
//! adds bindings, or both.
//!
//! - **[text]** - literal SQL, with optional `${}` tokens resolved per call
//! - **[trim]** - prefix/suffix rewriting wrapper (`where`, `set`, `trim`)
//! - **[foreach]** - iteration with per-element alias renaming
//!
//! `If`, `Choose`, `Bind` and `Mixed` are small enough to live here.
//!
//! ## Example
//!
//! ```
//! use sqlweave::node::{ForEachNode, SqlNode};
//!
//! let tree = SqlNode::mixed(vec![
//!     SqlNode::text("SELECT * FROM post"),
//!     SqlNode::where_(SqlNode::mixed(vec![
//!         SqlNode::if_("title != null", SqlNode::text("AND title = #{title}")),
//!         SqlNode::if_(
//!             "ids != null",
//!             ForEachNode::new("ids", SqlNode::text("#{id}"))
//!                 .item("id")
//!                 .open("AND id IN (")
//!                 .close(")")
//!                 .separator(",")
//!                 .into(),
//!         ),
//!     ])),
//! ]);
//! assert!(tree.is_dynamic());
//! ```
pub mod foreach;
pub mod text;
pub mod trim;

pub use foreach::ForEachNode;
pub use text::TextNode;
pub use trim::TrimNode;

use crate::{context::SqlContext, evaluator::EvalError};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlNode {
    Text(TextNode),
    If(IfNode),
    Choose(ChooseNode),
    ForEach(ForEachNode),
    Trim(TrimNode),
    Bind(BindNode),
    Mixed(Vec<SqlNode>),
}

impl SqlNode {
    /// Applies the node to `ctx`.
    ///
    /// Returns whether the node contributed: always true except for an `If`
    /// whose test failed and a `Choose` with no matching branch. Expression
    /// faults propagate and abort the call.
    pub fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool, EvalError> {
        match self {
            SqlNode::Text(node) => node.apply(ctx),
            SqlNode::If(node) => node.apply(ctx),
            SqlNode::Choose(node) => node.apply(ctx),
            SqlNode::ForEach(node) => node.apply(ctx),
            SqlNode::Trim(node) => node.apply(ctx),
            SqlNode::Bind(node) => node.apply(ctx),
            SqlNode::Mixed(children) => {
                for child in children {
                    child.apply(ctx)?;
                }
                Ok(true)
            }
        }
    }

    /// Whether applying the node can depend on the parameter object.
    pub fn is_dynamic(&self) -> bool {
        match self {
            SqlNode::Text(node) => node.is_dynamic(),
            SqlNode::Mixed(children) => children.iter().any(SqlNode::is_dynamic),
            _ => true,
        }
    }

    /// Visits every expression the node evaluates, depth first.
    pub fn visit_expressions(&self, visit: &mut dyn FnMut(&str)) {
        match self {
            SqlNode::Text(node) => node.static_tokens().iter().for_each(|t| visit(t.as_str())),
            SqlNode::If(node) => {
                visit(node.test.as_str());
                node.body.visit_expressions(visit);
            }
            SqlNode::Choose(node) => {
                for when in &node.when {
                    visit(when.test.as_str());
                    when.body.visit_expressions(visit);
                }
                if let Some(otherwise) = &node.otherwise {
                    otherwise.visit_expressions(visit);
                }
            }
            SqlNode::ForEach(node) => {
                visit(node.collection());
                node.body().visit_expressions(visit);
            }
            SqlNode::Trim(node) => node.body().visit_expressions(visit),
            SqlNode::Bind(node) => visit(node.value.as_str()),
            SqlNode::Mixed(children) => {
                for child in children {
                    child.visit_expressions(visit);
                }
            }
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        SqlNode::Text(TextNode::new(content))
    }

    pub fn if_(test: impl Into<String>, body: SqlNode) -> Self {
        SqlNode::If(IfNode::new(test, body))
    }

    pub fn choose(when: Vec<IfNode>, otherwise: Option<SqlNode>) -> Self {
        SqlNode::Choose(ChooseNode {
            when,
            otherwise: otherwise.map(Box::new),
        })
    }

    pub fn trim(node: TrimNode) -> Self {
        SqlNode::Trim(node)
    }

    /// `WHERE` clause: drops a leading `AND`/`OR` and emits nothing when
    /// the body is blank.
    pub fn where_(body: SqlNode) -> Self {
        SqlNode::Trim(TrimNode::where_clause(body))
    }

    /// `SET` clause: drops leading and trailing commas.
    pub fn set(body: SqlNode) -> Self {
        SqlNode::Trim(TrimNode::set_clause(body))
    }

    pub fn bind(name: impl Into<String>, value: impl Into<String>) -> Self {
        SqlNode::Bind(BindNode {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn mixed(children: Vec<SqlNode>) -> Self {
        SqlNode::Mixed(children)
    }
}

impl From<TextNode> for SqlNode {
    fn from(node: TextNode) -> Self {
        SqlNode::Text(node)
    }
}

impl From<ForEachNode> for SqlNode {
    fn from(node: ForEachNode) -> Self {
        SqlNode::ForEach(node)
    }
}

impl From<TrimNode> for SqlNode {
    fn from(node: TrimNode) -> Self {
        SqlNode::Trim(node)
    }
}

impl From<IfNode> for SqlNode {
    fn from(node: IfNode) -> Self {
        SqlNode::If(node)
    }
}

/// Conditional inclusion of a body.
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    test: String,
    body: Box<SqlNode>,
}

impl IfNode {
    pub fn new(test: impl Into<String>, body: SqlNode) -> Self {
        IfNode {
            test: test.into(),
            body: Box::new(body),
        }
    }

    pub fn test(&self) -> &str {
        &self.test
    }

    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool, EvalError> {
        if ctx.evaluator().eval_boolean(&self.test, ctx.bindings())? {
            self.body.apply(ctx)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// First matching `when` branch, else `otherwise`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChooseNode {
    when: Vec<IfNode>,
    otherwise: Option<Box<SqlNode>>,
}

impl ChooseNode {
    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool, EvalError> {
        for branch in &self.when {
            if branch.apply(ctx)? {
                return Ok(true);
            }
        }
        if let Some(otherwise) = &self.otherwise {
            otherwise.apply(ctx)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Binds the value of an expression under a name for the rest of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct BindNode {
    name: String,
    value: String,
}

impl BindNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, ctx: &mut dyn SqlContext) -> Result<bool, EvalError> {
        let value = ctx.evaluator().eval_value(&self.value, ctx.bindings())?;
        ctx.bind(&self.name, value);
        Ok(true)
    }
}
