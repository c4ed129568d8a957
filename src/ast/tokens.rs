/// Lexical tokens of the expression language used by `test`, `collection`
/// and placeholder expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// String literal enclosed in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// 'active'
    /// "O'Brien"
    /// ```
    String(String),

    /// Boolean values
    Boolean(bool),

    /// Null value
    Null,

    /// Binding name, field name or method name
    ///
    /// Must start with a letter or underscore, followed by letters, digits
    /// or underscores.
    ///
    /// # Examples
    /// ```text
    /// username
    /// _parameter
    /// __gen_item_0
    /// ```
    Identifier(String),

    // Comparison
    /// `==` or `eq`
    EqEq,
    /// `!=` or `neq`
    NotEq,
    /// `<` or `lt`
    Lt,
    /// `>` or `gt`
    Gt,
    /// `<=` or `lte`
    LtEq,
    /// `>=` or `gte`
    GtEq,

    // Arithmetic
    /// Addition or string concatenation
    Plus,
    /// Subtraction or unary minus
    Minus,
    /// Multiplication
    Star,
    /// Division
    Slash,
    /// Modulo
    Percent,

    // Logical
    /// `&&` or `and`
    And,
    /// `||` or `or`
    Or,
    /// `!` or `not`
    Not,

    // Delimiters
    /// Left bracket for index access
    LBracket,
    /// Right bracket
    RBracket,
    /// Left parenthesis for grouping or method arguments
    LParen,
    /// Right parenthesis
    RParen,
    /// Dot for field access or method calls
    Dot,
    /// Comma between method arguments
    Comma,

    /// End of input
    Eof,
}
