//! Evaluation of parsed expressions against read-only bindings.
//!
//! The evaluator only ever reads from the [`Bindings`] it is given and from a
//! closed table of [`Builtin`] functions. There is no assignment, no method
//! dispatch on values and no way to name anything outside the bindings.

use super::{
    error::{ExprError, Result},
    parser::{BinaryOp, Expr, LogicalOp, UnaryOp},
};
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Source of identifier values for an evaluation.
pub trait Bindings {
    /// Looks up a top-level identifier.
    fn lookup(&self, name: &str) -> Option<Cow<'_, Value>>;
}

impl Bindings for serde_json::Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.get(name).map(Cow::Borrowed)
    }
}

/// Evaluates an expression tree to an owned value.
pub fn evaluate<B: Bindings + ?Sized>(expr: &Expr, bindings: &B) -> Result<Value> {
    eval(expr, bindings).map(Cow::into_owned)
}

fn eval<'a, B: Bindings + ?Sized>(expr: &Expr, bindings: &'a B) -> Result<Cow<'a, Value>> {
    match expr {
        Expr::Literal(value) => Ok(Cow::Owned(value.clone())),
        Expr::Ident(name) => bindings
            .lookup(name)
            .ok_or_else(|| ExprError::UnknownIdentifier(name.clone())),
        Expr::Member(base, name) => {
            let base = eval(base, bindings)?;
            access(base, &Value::String(name.clone()))
        }
        Expr::Index(base, index) => {
            let base = eval(base, bindings)?;
            let index = eval(index, bindings)?;
            if let Value::String(key) = index.as_ref()
                && super::parser::is_reserved(key)
            {
                return Err(ExprError::ReservedName(key.clone()));
            }
            access(base, &index)
        }
        Expr::Call(name, args) => {
            let builtin =
                Builtin::from_name(name).ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, bindings))
                .collect::<Result<Vec<_>>>()?;
            builtin.call(&args).map(Cow::Owned)
        }
        Expr::Unary(op, operand) => {
            let operand = eval(operand, bindings)?;
            Ok(Cow::Owned(match op {
                UnaryOp::Not => Value::Bool(!truthy(&operand)),
                UnaryOp::Neg => number(-to_number(&operand, "-")?),
            }))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, bindings)?;
            let rhs = eval(rhs, bindings)?;
            binary(*op, &lhs, &rhs).map(Cow::Owned)
        }
        Expr::Logical(op, lhs, rhs) => {
            let lhs = eval(lhs, bindings)?;
            match (op, truthy(&lhs)) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(lhs),
                _ => eval(rhs, bindings),
            }
        }
        Expr::Conditional(test, consequent, alternate) => {
            let condition = eval(test, bindings)?;
            if truthy(&condition) {
                eval(consequent, bindings)
            } else {
                eval(alternate, bindings)
            }
        }
    }
}

enum Child<'v> {
    Borrowed(&'v Value),
    Owned(Value),
}

fn access<'a>(base: Cow<'a, Value>, key: &Value) -> Result<Cow<'a, Value>> {
    if base.is_null() {
        return Err(ExprError::NullAccess {
            member: to_text(key),
        });
    }
    Ok(match base {
        Cow::Borrowed(value) => match child(value, key) {
            Child::Borrowed(found) => Cow::Borrowed(found),
            Child::Owned(found) => Cow::Owned(found),
        },
        Cow::Owned(value) => Cow::Owned(match child(&value, key) {
            Child::Borrowed(found) => found.clone(),
            Child::Owned(found) => found,
        }),
    })
}

fn child<'v>(value: &'v Value, key: &Value) -> Child<'v> {
    match value {
        Value::Object(map) => {
            let name = to_text(key);
            match map.get(&name) {
                Some(found) => Child::Borrowed(found),
                None if name == "length" => Child::Owned(Value::from(map.len())),
                None => Child::Owned(Value::Null),
            }
        }
        Value::Array(items) => match key {
            Value::String(name) if name == "length" => Child::Owned(Value::from(items.len())),
            _ => match array_index(key).and_then(|i| items.get(i)) {
                Some(found) => Child::Borrowed(found),
                None => Child::Owned(Value::Null),
            },
        },
        Value::String(text) => match key {
            Value::String(name) if name == "length" => {
                Child::Owned(Value::from(text.chars().count()))
            }
            _ => match array_index(key).and_then(|i| text.chars().nth(i)) {
                Some(ch) => Child::Owned(Value::String(ch.to_string())),
                None => Child::Owned(Value::Null),
            },
        },
        _ => Child::Owned(Value::Null),
    }
}

fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) => n.as_u64().map(|i| i as usize).or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as usize)
        }),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    let symbol = match op {
        BinaryOp::Add => {
            if lhs.is_string() || rhs.is_string() {
                return Ok(Value::String(format!("{}{}", to_text(lhs), to_text(rhs))));
            }
            return Ok(number(to_number(lhs, "+")? + to_number(rhs, "+")?));
        }
        BinaryOp::Eq => return Ok(Value::Bool(loose_eq(lhs, rhs))),
        BinaryOp::NotEq => return Ok(Value::Bool(!loose_eq(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(lhs, rhs).ok_or_else(|| ExprError::TypeMismatch {
                op: "comparison",
                operand: format!("{} and {}", type_name(lhs), type_name(rhs)),
            })?;
            return Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }));
        }
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
    };

    let a = to_number(lhs, symbol)?;
    let b = to_number(rhs, symbol)?;
    let result = match op {
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
            return Err(ExprError::TypeMismatch {
                op: symbol,
                operand: "a zero divisor".to_string(),
            });
        }
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Ok(number(result))
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::String(_), _) | (_, Value::String(_)) => None,
        _ => {
            let a = to_number(lhs, "").ok()?;
            let b = to_number(rhs, "").ok()?;
            a.partial_cmp(&b)
        }
    }
}

/// Value equality with numbers compared numerically.
pub fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

/// Truthiness as configuration authors expect it.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_number(value: &Value, op: &'static str) -> Result<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => s.trim().parse().map_err(|_| ExprError::TypeMismatch {
            op,
            operand: format!("string {s:?}"),
        }),
        other => Err(ExprError::TypeMismatch {
            op,
            operand: type_name(other).to_string(),
        }),
    }
}

/// Converts an `f64` into a JSON number, keeping integral values integral.
pub fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Renders a value for template substitution.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The closed set of functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Keys,
    Values,
    Includes,
    Min,
    Max,
    Abs,
    Floor,
    Ceil,
    Round,
    Sum,
    Join,
    Upper,
    Lower,
    Str,
    Num,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "keys" => Self::Keys,
            "values" => Self::Values,
            "includes" => Self::Includes,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "sum" => Self::Sum,
            "join" => Self::Join,
            "upper" => Self::Upper,
            "lower" => Self::Lower,
            "string" => Self::Str,
            "number" => Self::Num,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Includes => "includes",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Sum => "sum",
            Self::Join => "join",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Str => "string",
            Self::Num => "number",
        }
    }

    fn bad(self, expected: &'static str) -> ExprError {
        ExprError::BadArguments {
            function: self.name(),
            expected,
        }
    }

    fn call(self, args: &[Value]) -> Result<Value> {
        match (self, args) {
            (Self::Len, [value]) => match value {
                Value::Null => Ok(Value::from(0)),
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(map) => Ok(Value::from(map.len())),
                Value::String(s) => Ok(Value::from(s.chars().count())),
                _ => Err(self.bad("an array, object or string")),
            },
            (Self::Keys, [Value::Object(map)]) => {
                Ok(Value::Array(map.keys().cloned().map(Value::String).collect()))
            }
            (Self::Values, [Value::Object(map)]) => Ok(Value::Array(map.values().cloned().collect())),
            (Self::Includes, [collection, item]) => Ok(Value::Bool(match collection {
                Value::Array(items) => items.iter().any(|v| loose_eq(v, item)),
                Value::String(s) => s.contains(&to_text(item)),
                Value::Object(map) => map.contains_key(&to_text(item)),
                Value::Null => false,
                _ => return Err(self.bad("an array, object or string and an item")),
            })),
            (Self::Min | Self::Max, args) if !args.is_empty() => {
                let candidates: &[Value] = match args {
                    [Value::Array(items)] => items,
                    _ => args,
                };
                let mut best: Option<f64> = None;
                for candidate in candidates {
                    let n = to_number(candidate, self.name())?;
                    best = Some(match (best, self) {
                        (None, _) => n,
                        (Some(b), Self::Min) => b.min(n),
                        (Some(b), _) => b.max(n),
                    });
                }
                Ok(best.map_or(Value::Null, number))
            }
            (Self::Abs | Self::Floor | Self::Ceil | Self::Round, [value]) => {
                let n = to_number(value, self.name())?;
                Ok(number(match self {
                    Self::Abs => n.abs(),
                    Self::Floor => n.floor(),
                    Self::Ceil => n.ceil(),
                    _ => n.round(),
                }))
            }
            (Self::Sum, [Value::Array(items)]) => {
                let mut total = 0.0;
                for item in items {
                    total += to_number(item, "sum")?;
                }
                Ok(number(total))
            }
            (Self::Join, [Value::Array(items), rest @ ..]) if rest.len() <= 1 => {
                let separator = rest.first().map_or_else(|| ",".to_string(), to_text);
                Ok(Value::String(
                    items.iter().map(to_text).collect::<Vec<_>>().join(&separator),
                ))
            }
            (Self::Upper, [value]) => Ok(Value::String(to_text(value).to_uppercase())),
            (Self::Lower, [value]) => Ok(Value::String(to_text(value).to_lowercase())),
            (Self::Str, [value]) => Ok(Value::String(to_text(value))),
            (Self::Num, [value]) => Ok(to_number(value, "number").map_or(Value::Null, number)),
            (Self::Len | Self::Abs | Self::Floor | Self::Ceil | Self::Round, _)
            | (Self::Upper | Self::Lower | Self::Str | Self::Num, _) => {
                Err(self.bad("exactly one argument"))
            }
            (Self::Keys | Self::Values, _) => Err(self.bad("one object")),
            (Self::Includes, _) => Err(self.bad("a collection and an item")),
            (Self::Min | Self::Max, _) => Err(self.bad("at least one number")),
            (Self::Sum, _) => Err(self.bad("one array of numbers")),
            (Self::Join, _) => Err(self.bad("an array and an optional separator")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use serde_json::{Map, json};

    fn bindings() -> Map<String, Value> {
        json!({
            "gameState": {
                "round": 2,
                "scores": { "p1": 10, "p2": 25 },
                "answers": ["a", "b", "c"],
            },
            "player": { "id": "p2", "name": "Bob" },
            "empty": null,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn run(source: &str) -> Result<Value> {
        evaluate(&parse(source)?, &bindings())
    }

    #[test]
    fn test_arithmetic_stays_integral() {
        assert_eq!(run("1 + 2 * 3").unwrap(), json!(7));
        assert_eq!(run("7 / 2").unwrap(), json!(3.5));
        assert_eq!(run("-gameState.round + 10 % 4").unwrap(), json!(0));
    }

    #[test]
    fn test_member_access() {
        assert_eq!(run("gameState.scores[player.id]").unwrap(), json!(25));
        assert_eq!(run("gameState.answers[1]").unwrap(), json!("b"));
        assert_eq!(run("gameState.answers.length").unwrap(), json!(3));
        assert_eq!(run("gameState.missing").unwrap(), Value::Null);
        assert_eq!(run("player.name.length").unwrap(), json!(3));
    }

    #[test]
    fn test_null_access_errors() {
        assert!(matches!(run("empty.field"), Err(ExprError::NullAccess { .. })));
        assert!(matches!(
            run("gameState.missing.deeper"),
            Err(ExprError::NullAccess { .. })
        ));
    }

    #[test]
    fn test_unknown_identifier() {
        assert_eq!(
            run("window"),
            Err(ExprError::UnknownIdentifier("window".to_string()))
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(run("empty || 'fallback'").unwrap(), json!("fallback"));
        assert_eq!(run("player && player.id").unwrap(), json!("p2"));
        assert_eq!(run("0 && unknown").unwrap(), json!(0));
    }

    #[test]
    fn test_comparisons_and_equality() {
        assert_eq!(run("gameState.round >= 2").unwrap(), json!(true));
        assert_eq!(run("player.id === 'p2'").unwrap(), json!(true));
        assert_eq!(run("2 == 2.0").unwrap(), json!(true));
        assert_eq!(run("'a' < 'b'").unwrap(), json!(true));
        assert!(run("'a' < 1").is_err());
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run("'Round ' + gameState.round").unwrap(), json!("Round 2"));
    }

    #[test]
    fn test_ternary() {
        assert_eq!(
            run("gameState.round > 1 ? 'late' : 'early'").unwrap(),
            json!("late")
        );
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        assert!(matches!(run("1 / 0"), Err(ExprError::TypeMismatch { .. })));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(run("len(gameState.answers)").unwrap(), json!(3));
        assert_eq!(run("keys(gameState.scores)").unwrap(), json!(["p1", "p2"]));
        assert_eq!(run("sum(values(gameState.scores))").unwrap(), json!(35));
        assert_eq!(run("max(values(gameState.scores))").unwrap(), json!(25));
        assert_eq!(run("min(3, 1, 2)").unwrap(), json!(1));
        assert_eq!(run("includes(gameState.answers, 'c')").unwrap(), json!(true));
        assert_eq!(run("join(gameState.answers, '-')").unwrap(), json!("a-b-c"));
        assert_eq!(run("upper(player.name)").unwrap(), json!("BOB"));
        assert_eq!(run("round(2.6)").unwrap(), json!(3));
        assert_eq!(run("number('12')").unwrap(), json!(12));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            run("eval('1')"),
            Err(ExprError::UnknownFunction("eval".to_string()))
        );
    }

    #[test]
    fn test_computed_reserved_member_rejected() {
        assert!(matches!(
            run("player['__pro' + 'to__']"),
            Err(ExprError::ReservedName(_))
        ));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&json!(3.0)), "3");
        assert_eq!(to_text(&json!(2.5)), "2.5");
        assert_eq!(to_text(&Value::Null), "");
        assert_eq!(to_text(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!("0")));
    }
}
