use crate::ast::{BinOp, UnaryOp};

/// Abstract Syntax Tree node representing a parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal floating point number
    Float(f64),

    /// Literal integer
    Integer(i64),

    /// String literal
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// Null literal
    Null,

    // References
    /// Binding reference, resolved against the current bindings
    ///
    /// # Examples
    /// ```text
    /// username          // Variable("username")
    /// _parameter        // Variable("_parameter")
    /// ```
    Variable(String),

    // Access
    /// Field access with a static name
    ///
    /// # Examples
    /// ```text
    /// author.name
    /// ```
    Field {
        object: Box<Expr>,
        name: String,
    },

    /// Index or computed-key access
    ///
    /// # Examples
    /// ```text
    /// ids[0]
    /// row['first name']
    /// ```
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    // Operations
    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Method call
    ///
    /// # Examples
    /// ```text
    /// ids.size()
    /// name.startsWith('A')
    /// ```
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}
