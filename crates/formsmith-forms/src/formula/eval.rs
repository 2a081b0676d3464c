//! Tree-walking evaluator
//!
//! Coercions follow the spreadsheet-ish subset of JavaScript that formula
//! authors expect: `+` concatenates once a string is involved, other
//! arithmetic converts operands to numbers, dates are epoch milliseconds.

use super::parser::{BinaryOp, Builtin, Expr, LogicalOp, UnaryOp};
use super::FormulaError;
use crate::clock::Clock;
use crate::domain::format_number;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::cmp::Ordering;

/// Result of evaluating a formula or sub-expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    fn to_number(&self) -> Result<f64, FormulaError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(0.0);
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| FormulaError::NotANumber { value: s.clone() })
            }
        }
    }

    fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
        }
    }
}

impl Expr {
    /// Evaluate against `clock` for any date lookups.
    pub fn eval(&self, clock: &dyn Clock) -> Result<Value, FormulaError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Unary(op, operand) => {
                let value = operand.eval(clock)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()?),
                    UnaryOp::Plus => Value::Number(value.to_number()?),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(clock)?;
                let rhs = rhs.eval(clock)?;
                binary(*op, lhs, rhs)
            }
            Expr::Logical(op, lhs, rhs) => {
                let lhs = lhs.eval(clock)?;
                match (op, lhs.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(lhs),
                    _ => rhs.eval(clock),
                }
            }
            Expr::Conditional(condition, then, otherwise) => {
                if condition.eval(clock)?.truthy() {
                    then.eval(clock)
                } else {
                    otherwise.eval(clock)
                }
            }
            Expr::Call(function, args) => {
                let mut numbers = Vec::with_capacity(args.len());
                for arg in args {
                    numbers.push(arg.eval(clock)?.to_number()?);
                }
                call(*function, &numbers, clock).map(Value::Number)
            }
            Expr::NewDate(None) => Ok(Value::Number(clock.now().timestamp_millis() as f64)),
            Expr::NewDate(Some(arg)) => match arg.eval(clock)? {
                Value::Number(millis) => Ok(Value::Number(millis)),
                Value::Str(text) => parse_date_millis(&text)
                    .map(Value::Number)
                    .ok_or(FormulaError::InvalidDate { value: text }),
                Value::Bool(b) => Err(FormulaError::InvalidDate { value: b.to_string() }),
            },
        }
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, FormulaError> {
    let value = match op {
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(lhs.to_text() + &rhs.to_text()),
            _ => Value::Number(lhs.to_number()? + rhs.to_number()?),
        },
        BinaryOp::Sub => Value::Number(lhs.to_number()? - rhs.to_number()?),
        BinaryOp::Mul => Value::Number(lhs.to_number()? * rhs.to_number()?),
        BinaryOp::Div => {
            let divisor = rhs.to_number()?;
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Value::Number(lhs.to_number()? / divisor)
        }
        BinaryOp::Rem => {
            let divisor = rhs.to_number()?;
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Value::Number(lhs.to_number()? % divisor)
        }
        BinaryOp::Eq => Value::Bool(loosely_equal(&lhs, &rhs)),
        BinaryOp::NotEq => Value::Bool(!loosely_equal(&lhs, &rhs)),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let ordering = match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => lhs.to_number()?.partial_cmp(&rhs.to_number()?),
            };
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Less, Some(o)) => o == Ordering::Less,
                (BinaryOp::LessEq, Some(o)) => o != Ordering::Greater,
                (BinaryOp::Greater, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            })
        }
    };
    Ok(value)
}

fn loosely_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => match (lhs.to_number(), rhs.to_number()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
    }
}

fn call(function: Builtin, args: &[f64], clock: &dyn Clock) -> Result<f64, FormulaError> {
    let unary = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(FormulaError::Arity {
            function: function.name(),
            expected: "exactly 1",
            found: args.len(),
        }),
    };

    match function {
        Builtin::Floor => unary(f64::floor),
        Builtin::Ceil => unary(f64::ceil),
        Builtin::Round => unary(|x| (x + 0.5).floor()),
        Builtin::Trunc => unary(f64::trunc),
        Builtin::Abs => unary(f64::abs),
        Builtin::Sqrt => unary(f64::sqrt),
        Builtin::Sign => unary(|x| if x == 0.0 { 0.0 } else { x.signum() }),
        Builtin::Pow => match args {
            [base, exponent] => Ok(base.powf(*exponent)),
            _ => Err(FormulaError::Arity {
                function: function.name(),
                expected: "exactly 2",
                found: args.len(),
            }),
        },
        Builtin::Min | Builtin::Max => {
            if args.is_empty() {
                return Err(FormulaError::Arity {
                    function: function.name(),
                    expected: "at least 1",
                    found: 0,
                });
            }
            let pick = if function == Builtin::Min { f64::min } else { f64::max };
            Ok(args[1..].iter().fold(args[0], |acc, x| pick(acc, *x)))
        }
        Builtin::Now => match args {
            [] => Ok(clock.now().timestamp_millis() as f64),
            _ => Err(FormulaError::Arity {
                function: function.name(),
                expected: "no",
                found: args.len(),
            }),
        },
    }
}

/// Epoch milliseconds for an RFC 3339 timestamp, a `YYYY-MM-DDTHH:MM[:SS]`
/// local timestamp (read as UTC) or a bare `YYYY-MM-DD` date (UTC midnight).
fn parse_date_millis(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.timestamp_millis() as f64);
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(Utc.from_utc_datetime(&naive).timestamp_millis() as f64)
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;
    use crate::clock::FixedClock;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    fn eval(source: &str) -> Result<Value, FormulaError> {
        parse(source)?.eval(&clock())
    }

    fn number(source: &str) -> f64 {
        match eval(source).unwrap() {
            Value::Number(n) => n,
            other => panic!("expected number from {source}, got {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(number("1 + 2 * 3"), 7.0);
        assert_eq!(number("(1 + 2) * 3"), 9.0);
        assert_eq!(number("10 / 4"), 2.5);
        assert_eq!(number("10 % 4"), 2.0);
        assert_eq!(number("-3 + +2"), -1.0);
        assert_eq!(number("2 - -2"), 4.0);
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(eval(r#""5" + 3"#).unwrap(), Value::Str("53".into()));
        assert_eq!(eval(r#""a" + "b""#).unwrap(), Value::Str("ab".into()));
        assert_eq!(number(r#""5" * 3"#), 15.0);
        assert_eq!(number(r#"" " * 3"#), 0.0);
        assert_eq!(
            eval(r#""abc" * 2"#).unwrap_err(),
            FormulaError::NotANumber { value: "abc".into() }
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("1 / 0").unwrap_err(), FormulaError::DivisionByZero);
        assert_eq!(eval("1 % 0").unwrap_err(), FormulaError::DivisionByZero);
    }

    #[test]
    fn test_logic_and_comparison() {
        assert_eq!(eval("1 < 2 && 3 >= 3").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 || 7").unwrap(), Value::Number(7.0));
        assert_eq!(eval("0 && 7").unwrap(), Value::Number(0.0));
        assert_eq!(eval(r#""10" == 10"#).unwrap(), Value::Bool(true));
        assert_eq!(eval(r#""b" > "a""#).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 != 1").unwrap(), Value::Bool(false));
        assert_eq!(number("5 > 3 ? 10 : 20"), 10.0);
        assert_eq!(number("false ? 1 : true ? 2 : 3"), 2.0);
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        assert_eq!(eval("true || 1 / 0").unwrap(), Value::Bool(true));
        assert_eq!(eval("false && 1 / 0").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(number("Math.floor(2.7)"), 2.0);
        assert_eq!(number("Math.ceil(2.1)"), 3.0);
        assert_eq!(number("Math.round(2.5)"), 3.0);
        assert_eq!(number("Math.round(-2.5)"), -2.0);
        assert_eq!(number("Math.trunc(-2.7)"), -2.0);
        assert_eq!(number("Math.abs(-4)"), 4.0);
        assert_eq!(number("Math.sign(0)"), 0.0);
        assert_eq!(number("Math.sign(-9)"), -1.0);
        assert_eq!(number("Math.sqrt(16)"), 4.0);
        assert_eq!(number("Math.pow(2, 10)"), 1024.0);
        assert_eq!(number("Math.min(4, 2, 8)"), 2.0);
        assert_eq!(number("Math.max(4, 2, 8)"), 8.0);
        assert!(matches!(eval("Math.floor(1, 2)"), Err(FormulaError::Arity { found: 2, .. })));
        assert!(matches!(eval("Math.max()"), Err(FormulaError::Arity { found: 0, .. })));
    }

    #[test]
    fn test_dates() {
        let now = clock().0.timestamp_millis() as f64;
        assert_eq!(number("new Date()"), now);
        assert_eq!(number("Date.now()"), now);
        assert_eq!(number(r#"new Date("1970-01-02")"#), 86_400_000.0);
        assert_eq!(number(r#"new Date("1970-01-01T00:00:01Z")"#), 1000.0);
        assert_eq!(number(r#"new Date("1970-01-01T00:01")"#), 60_000.0);
        assert_eq!(number("new Date(1234)"), 1234.0);
        assert_eq!(
            eval(r#"new Date("yesterday")"#).unwrap_err(),
            FormulaError::InvalidDate { value: "yesterday".into() }
        );
    }

    #[test]
    fn test_age_formula() {
        let age = number(
            r#"Math.floor((new Date() - new Date("1994-06-01")) / (1000*60*60*24*365.25))"#,
        );
        assert_eq!(age, 30.0);
    }
}
