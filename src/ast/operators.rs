/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    // Comparison
    /// Equal (`==`, `eq`)
    Equal,
    /// Not equal (`!=`, `neq`)
    NotEqual,
    /// Less than (`<`, `lt`)
    LessThan,
    /// Greater than (`>`, `gt`)
    GreaterThan,
    /// Less than or equal (`<=`, `lte`)
    LessEqual,
    /// Greater than or equal (`>=`, `gte`)
    GreaterEqual,

    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Modulo (`%`)
    Modulo,

    // Logical
    /// Logical AND (`&&`, `and`), short-circuiting
    And,
    /// Logical OR (`||`, `or`), short-circuiting
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Logical negation (`!`, `not`)
    Not,
    /// Arithmetic negation (`-`)
    Negate,
}
