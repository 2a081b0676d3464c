//! Formula language for derived fields
//!
//! Formulas are small spreadsheet-style expressions. Before evaluation the
//! derivation engine has already replaced every field alias with that field's
//! current value, so a formula reaching this module only contains literals,
//! operators and a fixed set of builtins:
//!
//! - numbers, `"strings"` / `'strings'`, `true`, `false`
//! - `+ - * / %`, unary `-` `+` `!`, parentheses
//! - `< <= > >= == != === !==`, `&&`, `||`, `cond ? a : b`
//! - `Math.floor/ceil/round/trunc/abs/sign/sqrt/pow/min/max`, `Math.PI`, `Math.E`
//! - `new Date()`, `new Date(x)`, `Date.now()` (all epoch milliseconds)
//!
//! Nothing else resolves: there is no way to reach variables, properties or
//! functions outside this list.
//!
//! ```
//! use formsmith_forms::clock::SystemClock;
//! use formsmith_forms::formula;
//!
//! let value = formula::evaluate("Math.round((3 + 4) * 1.5)", &SystemClock).unwrap();
//! assert_eq!(value, serde_json::json!(11));
//! ```

mod eval;
mod lexer;
mod parser;

pub use eval::Value;
pub use parser::{BinaryOp, Builtin, Expr, LogicalOp, UnaryOp};

use crate::clock::Clock;
use crate::domain::{number_value, FieldValue};
use lexer::Lexer;
use parser::Parser;

/// Maximum accepted formula size in bytes.
pub const MAX_FORMULA_BYTES: usize = 4096;
/// Maximum nesting depth of parentheses, unary operators and calls.
pub const MAX_FORMULA_NESTING: usize = 64;

/// Errors raised while parsing or evaluating a formula
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    EmptyInput,

    #[error("formula exceeds {max_bytes} bytes")]
    InputTooLarge { max_bytes: usize },

    #[error("unexpected character `{found}` at {position}")]
    UnexpectedCharacter { found: char, position: usize },

    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: usize },

    #[error("invalid number `{raw}` at {position}")]
    InvalidNumber { raw: String, position: usize },

    #[error("expected {expected}, found `{found}` at {position}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },

    #[error("unknown identifier `{name}` at {position}")]
    UnknownIdentifier { name: String, position: usize },

    #[error("unknown function `{name}` at {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("expression nesting exceeds {max_depth} at {position}")]
    NestingTooDeep { max_depth: usize, position: usize },

    #[error("unexpected input after expression at {position}")]
    TrailingInput { position: usize },

    #[error("{function} takes {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("`{value}` is not a number")]
    NotANumber { value: String },

    #[error("`{value}` is not a valid date")]
    InvalidDate { value: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}

/// Parse formula text into an expression tree.
pub fn parse(source: &str) -> Result<Expr, FormulaError> {
    if source.len() > MAX_FORMULA_BYTES {
        return Err(FormulaError::InputTooLarge {
            max_bytes: MAX_FORMULA_BYTES,
        });
    }
    let tokens = Lexer::new(source).lex()?;
    Parser::new(tokens).parse()
}

/// Parse and evaluate, converting the result into a field value.
pub fn evaluate(source: &str, clock: &dyn Clock) -> Result<FieldValue, FormulaError> {
    let value = parse(source)?.eval(clock)?;
    match value {
        Value::Number(n) if !n.is_finite() => Err(FormulaError::NonFinite),
        Value::Number(n) => Ok(number_value(n)),
        Value::Str(s) => Ok(FieldValue::String(s)),
        Value::Bool(b) => Ok(FieldValue::Bool(b)),
    }
}
