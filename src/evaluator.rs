use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, RwLock},
};

use regex::Regex;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::{
    ast::{BinOp, Expr, UnaryOp},
    context::Bindings,
    parser::{ParseError, parse_expression},
    value::Value,
};

/// Errors that can occur while evaluating directive and placeholder
/// expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The expression text could not be parsed
    #[error("Error parsing expression '{expression}': {source}")]
    Syntax {
        expression: String,
        #[source]
        source: ParseError,
    },

    /// A `foreach` collection expression produced null
    #[error("The expression '{expression}' evaluated to a null value.")]
    NullIterable { expression: String },

    /// A `foreach` collection expression produced a scalar
    #[error("Error evaluating expression '{expression}'. Return value ({value}) was not iterable.")]
    NotIterable { expression: String, value: Value },

    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeError(String),

    /// Call of a method the expression language does not provide
    #[error("Unknown method '{method}' on {type_name}")]
    UnknownMethod {
        method: String,
        type_name: &'static str,
    },

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A `${}` value failed the configured injection filter
    #[error("Invalid input '{value}'. Please conform to regex {pattern}")]
    InjectionRejected { value: String, pattern: String },
}

/// One element produced by [`ExpressionEvaluator::eval_iterable`].
///
/// For sequences `index` is the zero-based position; for objects it is the
/// entry key and `item` the entry value.
#[derive(Debug, Clone, PartialEq)]
pub struct IterEntry {
    pub index: Value,
    pub item: Value,
}

/// The expression capability consumed by directive nodes and the assembler.
///
/// Only [`evaluate`](Self::evaluate) is required; the three result shapes the
/// engine relies on are derived from it.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value, EvalError>;

    /// Evaluate a condition; see [`Value::is_truthy`] for the coercion rules.
    fn eval_boolean(&self, expression: &str, bindings: &Bindings) -> Result<bool, EvalError> {
        Ok(self.evaluate(expression, bindings)?.is_truthy())
    }

    /// Evaluate a collection. Arrays and objects are iterable; null and
    /// scalars are configuration errors naming the expression.
    fn eval_iterable(
        &self,
        expression: &str,
        bindings: &Bindings,
    ) -> Result<Vec<IterEntry>, EvalError> {
        match self.evaluate(expression, bindings)? {
            Value::Null => Err(EvalError::NullIterable {
                expression: expression.to_string(),
            }),
            Value::Array(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, item)| IterEntry {
                    index: Value::from(i),
                    item,
                })
                .collect()),
            Value::Object(entries) => Ok(entries
                .into_iter()
                .map(|(key, item)| IterEntry {
                    index: Value::String(key),
                    item,
                })
                .collect()),
            value => Err(EvalError::NotIterable {
                expression: expression.to_string(),
                value,
            }),
        }
    }

    fn eval_value(&self, expression: &str, bindings: &Bindings) -> Result<Value, EvalError> {
        self.evaluate(expression, bindings)
    }
}

/// The default expression evaluator.
///
/// Parsed expressions are cached by source text, so each distinct
/// expression of a template is parsed once per process. `matches()`
/// patterns are cached the same way.
#[derive(Default)]
pub struct Evaluator {
    cache: RwLock<HashMap<String, Arc<Expr>>>,
    patterns: RwLock<HashMap<String, Regex>>,
}

impl Evaluator {
    /// Creates a new evaluator with an empty expression cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide evaluator shared by templates that do not supply
    /// their own.
    pub fn shared() -> Arc<Evaluator> {
        static SHARED: OnceLock<Arc<Evaluator>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Evaluator::new())).clone()
    }

    /// Parses `expression`, consulting the cache first.
    pub fn compile(&self, expression: &str) -> Result<Arc<Expr>, EvalError> {
        if let Ok(cache) = self.cache.read()
            && let Some(expr) = cache.get(expression)
        {
            return Ok(expr.clone());
        }

        let expr = parse_expression(expression).map_err(|source| EvalError::Syntax {
            expression: expression.to_string(),
            source,
        })?;
        let expr = Arc::new(expr);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(expression.to_string(), expr.clone());
        }
        Ok(expr)
    }

    /// Compiles a `matches()` pattern anchored at both ends, consulting the
    /// pattern cache first.
    fn pattern(&self, pattern: &str) -> Result<Regex, EvalError> {
        if let Ok(patterns) = self.patterns.read()
            && let Some(re) = patterns.get(pattern)
        {
            return Ok(re.clone());
        }

        let re = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| EvalError::TypeError(format!("invalid regex: {e}")))?;
        if let Ok(mut patterns) = self.patterns.write() {
            patterns.insert(pattern.to_string(), re.clone());
        }
        Ok(re)
    }

    /// Evaluates an already parsed expression.
    pub fn eval_expr(&self, expr: &Expr, bindings: &Bindings) -> Result<Value, EvalError> {
        match expr {
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Variable(name) => Ok(bindings.lookup(name).cloned().unwrap_or(Value::Null)),
            Expr::Field { object, name } => {
                let obj_value = self.eval_expr(object, bindings)?;
                apply_field(&obj_value, name)
            }
            Expr::Index { object, index } => {
                let obj_value = self.eval_expr(object, bindings)?;
                let index_value = self.eval_expr(index, bindings)?;
                apply_index(&obj_value, &index_value)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, bindings)?;
                match op {
                    UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
                    UnaryOp::Negate => match value {
                        Value::Integer(n) => n
                            .checked_neg()
                            .map(Value::Integer)
                            .ok_or_else(|| EvalError::TypeError(format!("Cannot negate {}", n))),
                        Value::Float(n) => Ok(Value::Float(-n)),
                        other => Err(EvalError::TypeError(format!(
                            "Cannot negate {}",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::BinaryOp { op, left, right } => match op {
                BinOp::And => {
                    if !self.eval_expr(left, bindings)?.is_truthy() {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(self.eval_expr(right, bindings)?.is_truthy()))
                }
                BinOp::Or => {
                    if self.eval_expr(left, bindings)?.is_truthy() {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(self.eval_expr(right, bindings)?.is_truthy()))
                }
                _ => {
                    let left_val = self.eval_expr(left, bindings)?;
                    let right_val = self.eval_expr(right, bindings)?;
                    apply_binop(*op, &left_val, &right_val)
                }
            },
            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                let obj_value = self.eval_expr(object, bindings)?;
                let arg_values = args
                    .iter()
                    .map(|arg| self.eval_expr(arg, bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                eval_method_call(self, &obj_value, method, &arg_values)
            }
        }
    }
}

impl ExpressionEvaluator for Evaluator {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value, EvalError> {
        let expr = self.compile(expression)?;
        self.eval_expr(&expr, bindings)
    }
}

fn apply_field(object: &Value, name: &str) -> Result<Value, EvalError> {
    match object {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        v => Err(EvalError::TypeError(format!(
            "Cannot read field '{}' of {}",
            name,
            v.type_name()
        ))),
    }
}

fn apply_index(object: &Value, index: &Value) -> Result<Value, EvalError> {
    match (object, index) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Object(map), Value::String(k)) => Ok(map.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Object(map), Value::Integer(k)) => {
            Ok(map.get(&k.to_string()).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(arr), Value::Integer(n)) => Ok(usize::try_from(*n)
            .ok()
            .and_then(|i| arr.get(i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::Array(_), Value::String(k)) => Err(EvalError::TypeError(format!(
            "Cannot use string key '{}' on array; use integer index instead",
            k
        ))),
        _ => Err(EvalError::TypeError(format!(
            "Cannot index {} with {}",
            object.type_name(),
            index.type_name()
        ))),
    }
}

/// Equality that treats integers and floats as one numeric domain.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            match (left, right) {
                (Value::Integer(a), Value::Integer(b)) => a == b,
                _ => left.as_float() == right.as_float(),
            }
        }
        _ => left == right,
    }
}

/// Mixed integer/float arithmetic through `Decimal`, collapsing whole
/// results back to integers.
fn mixed_arithmetic(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    if let (Some(ad), Some(bd)) = (Decimal::from_f64(a), Decimal::from_f64(b)) {
        let rd = match op {
            BinOp::Add => ad.checked_add(bd),
            BinOp::Subtract => ad.checked_sub(bd),
            BinOp::Multiply => ad.checked_mul(bd),
            BinOp::Divide => ad.checked_div(bd),
            BinOp::Modulo => ad.checked_rem(bd),
            _ => None,
        };
        if let Some(rd) = rd {
            if rd.is_integer()
                && let Some(r) = rd.to_i64()
            {
                return Ok(Value::Integer(r));
            } else if let Some(r) = rd.to_f64() {
                return Ok(Value::Float(r));
            }
        }
    }
    float_arithmetic(op, a, b)
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        BinOp::Modulo => a % b,
        _ => {
            return Err(EvalError::TypeError(format!(
                "{:?} is not an arithmetic operator",
                op
            )));
        }
    };
    Ok(Value::Float(result))
}

fn integer_arithmetic(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => {
            // Inexact division yields a float.
            if a.checked_rem(b).is_some_and(|r| r != 0) {
                return Ok(Value::Float(a as f64 / b as f64));
            }
            a.checked_div(b)
        }
        BinOp::Modulo => a.checked_rem(b),
        _ => None,
    };
    result
        .map(Value::Integer)
        .ok_or_else(|| EvalError::TypeError(format!("Integer overflow in {} {:?} {}", a, op, b)))
}

fn compare(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Boolean(false)),
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let (a, b) = (left.as_float(), right.as_float());
            match a.zip(b).and_then(|(a, b)| a.partial_cmp(&b)) {
                Some(ordering) => ordering,
                None => return Ok(Value::Boolean(false)),
            }
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (a, b) => {
            return Err(EvalError::TypeError(format!(
                "Cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )));
        }
    };

    let result = match op {
        BinOp::LessThan => ordering == Ordering::Less,
        BinOp::GreaterThan => ordering == Ordering::Greater,
        BinOp::LessEqual => ordering != Ordering::Greater,
        BinOp::GreaterEqual => ordering != Ordering::Less,
        _ => unreachable!("compare called with non-comparison operator"),
    };
    Ok(Value::Boolean(result))
}

fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Equal => Ok(Value::Boolean(values_equal(left, right))),
        BinOp::NotEqual => Ok(Value::Boolean(!values_equal(left, right))),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            compare(op, left, right)
        }
        BinOp::Add if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
            Ok(Value::String(format!("{}{}", left, right)))
        }
        BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            let divides = matches!(op, BinOp::Divide | BinOp::Modulo);
            match (left, right) {
                (Value::Integer(_), Value::Integer(0)) if divides => Err(EvalError::DivisionByZero),
                (Value::Integer(a), Value::Integer(b)) => integer_arithmetic(op, *a, *b),
                (Value::Float(a), Value::Float(b)) => float_arithmetic(op, *a, *b),
                (Value::Integer(a), Value::Float(b)) => mixed_arithmetic(op, *a as f64, *b),
                (Value::Float(a), Value::Integer(b)) => mixed_arithmetic(op, *a, *b as f64),
                (a, b) => Err(EvalError::TypeError(format!(
                    "Cannot apply {:?} to {} and {}",
                    op,
                    a.type_name(),
                    b.type_name()
                ))),
            }
        }
        BinOp::And | BinOp::Or => unreachable!("logical operators short-circuit in eval_expr"),
    }
}

fn expect_arity(method: &str, args: &[Value], arity: usize) -> Result<(), EvalError> {
    if args.len() != arity {
        return Err(EvalError::TypeError(format!(
            "{}() takes {} argument(s), {} given",
            method,
            arity,
            args.len()
        )));
    }
    Ok(())
}

fn string_arg<'a>(method: &str, arg: &'a Value) -> Result<&'a str, EvalError> {
    arg.as_str().ok_or_else(|| {
        EvalError::TypeError(format!(
            "{}() expects a string argument, got {}",
            method,
            arg.type_name()
        ))
    })
}

fn eval_method_call(
    evaluator: &Evaluator,
    object: &Value,
    method: &str,
    args: &[Value],
) -> Result<Value, EvalError> {
    let unknown = || EvalError::UnknownMethod {
        method: method.to_string(),
        type_name: object.type_name(),
    };

    match (method, object) {
        ("size" | "length", _) => {
            expect_arity(method, args, 0)?;
            match object {
                Value::Array(arr) => Ok(Value::from(arr.len())),
                Value::Object(map) => Ok(Value::from(map.len())),
                Value::String(s) => Ok(Value::from(s.chars().count())),
                _ => Err(unknown()),
            }
        }
        ("isEmpty", _) => {
            expect_arity(method, args, 0)?;
            match object {
                Value::Array(arr) => Ok(Value::Boolean(arr.is_empty())),
                Value::Object(map) => Ok(Value::Boolean(map.is_empty())),
                Value::String(s) => Ok(Value::Boolean(s.is_empty())),
                _ => Err(unknown()),
            }
        }
        ("trim", Value::String(s)) => {
            expect_arity(method, args, 0)?;
            Ok(Value::String(s.trim().to_string()))
        }
        ("toUpperCase", Value::String(s)) => {
            expect_arity(method, args, 0)?;
            Ok(Value::String(s.to_uppercase()))
        }
        ("toLowerCase", Value::String(s)) => {
            expect_arity(method, args, 0)?;
            Ok(Value::String(s.to_lowercase()))
        }
        ("startsWith", Value::String(s)) => {
            expect_arity(method, args, 1)?;
            Ok(Value::Boolean(s.starts_with(string_arg(method, &args[0])?)))
        }
        ("endsWith", Value::String(s)) => {
            expect_arity(method, args, 1)?;
            Ok(Value::Boolean(s.ends_with(string_arg(method, &args[0])?)))
        }
        ("contains", Value::String(s)) => {
            expect_arity(method, args, 1)?;
            Ok(Value::Boolean(s.contains(string_arg(method, &args[0])?)))
        }
        ("contains", Value::Array(arr)) => {
            expect_arity(method, args, 1)?;
            Ok(Value::Boolean(arr.iter().any(|v| values_equal(v, &args[0]))))
        }
        ("containsKey", Value::Object(map)) => {
            expect_arity(method, args, 1)?;
            Ok(Value::Boolean(map.contains_key(string_arg(method, &args[0])?)))
        }
        // .matches(pattern) - true if the whole string matches the regex
        ("matches", Value::String(s)) => {
            expect_arity(method, args, 1)?;
            let pattern = string_arg(method, &args[0])?;
            Ok(Value::Boolean(evaluator.pattern(pattern)?.is_match(s)))
        }
        _ => Err(unknown()),
    }
}
