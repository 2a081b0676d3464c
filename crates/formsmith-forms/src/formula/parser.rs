//! Recursive-descent parser producing a formula [`Expr`] tree
//!
//! ### Grammar (informal, lowest precedence first)
//! ```text
//! conditional := or ( "?" conditional ":" conditional )?
//! or          := and ( "||" and )*
//! and         := equality ( "&&" equality )*
//! equality    := comparison ( ("==" | "!=") comparison )*
//! comparison  := additive ( ("<" | "<=" | ">" | ">=") additive )*
//! additive    := term ( ("+" | "-") term )*
//! term        := unary ( ("*" | "/" | "%") unary )*
//! unary       := ("-" | "+" | "!") unary | primary
//! primary     := number | string | "true" | "false" | "(" conditional ")"
//!              | "Math" "." name ( "(" args ")" )?
//!              | "Date" "." "now" "(" ")"
//!              | "new" "Date" ( "(" args ")" )?
//! ```

use super::lexer::{SpannedToken, Token};
use super::{FormulaError, MAX_FORMULA_NESTING};

/// Parsed formula
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Short-circuiting `&&` / `||`
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    /// `new Date(...)`, evaluated to epoch milliseconds
    NewDate(Option<Box<Expr>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Functions reachable from a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Floor,
    Ceil,
    Round,
    Trunc,
    Abs,
    Sign,
    Sqrt,
    Pow,
    Min,
    Max,
    /// `Date.now()`
    Now,
}

impl Builtin {
    fn from_math_name(name: &str) -> Option<Self> {
        Some(match name {
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "round" => Builtin::Round,
            "trunc" => Builtin::Trunc,
            "abs" => Builtin::Abs,
            "sign" => Builtin::Sign,
            "sqrt" => Builtin::Sqrt,
            "pow" => Builtin::Pow,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Floor => "Math.floor",
            Builtin::Ceil => "Math.ceil",
            Builtin::Round => "Math.round",
            Builtin::Trunc => "Math.trunc",
            Builtin::Abs => "Math.abs",
            Builtin::Sign => "Math.sign",
            Builtin::Sqrt => "Math.sqrt",
            Builtin::Pow => "Math.pow",
            Builtin::Min => "Math.min",
            Builtin::Max => "Math.max",
            Builtin::Now => "Date.now",
        }
    }
}

pub(crate) struct Parser<'input> {
    tokens: Vec<SpannedToken<'input>>,
    index: usize,
    nesting: usize,
}

impl<'input> Parser<'input> {
    pub(crate) fn new(tokens: Vec<SpannedToken<'input>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parse the whole token stream as one expression.
    pub(crate) fn parse(mut self) -> Result<Expr, FormulaError> {
        let expr = self.parse_conditional()?;
        if self.current().token != Token::Eof {
            return Err(FormulaError::TrailingInput {
                position: self.current().position,
            });
        }
        Ok(expr)
    }

    fn parse_conditional(&mut self) -> Result<Expr, FormulaError> {
        let condition = self.parse_or()?;
        if !self.matches(&Token::Question) {
            return Ok(condition);
        }
        let position = self.current().position;
        self.with_nesting(position, |parser| {
            let then = parser.parse_conditional()?;
            parser.expect(&Token::Colon, "`:` in conditional expression")?;
            let otherwise = parser.parse_conditional()?;
            Ok(Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise)))
        })
    }

    fn parse_or(&mut self) -> Result<Expr, FormulaError> {
        self.parse_operator_chain(Self::parse_and, Expr::Logical, |token| match token {
            Token::OrOr => Some(LogicalOp::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> Result<Expr, FormulaError> {
        self.parse_operator_chain(Self::parse_equality, Expr::Logical, |token| match token {
            Token::AndAnd => Some(LogicalOp::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(Self::parse_comparison, |token| match token {
            Token::Eq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(Self::parse_additive, |token| match token {
            Token::Less => Some(BinaryOp::Less),
            Token::LessEq => Some(BinaryOp::LessEq),
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEq => Some(BinaryOp::GreaterEq),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(Self::parse_term, |token| match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_term(&mut self) -> Result<Expr, FormulaError> {
        self.parse_binary_level(Self::parse_unary, |token| match token {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn parse_binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, FormulaError>,
        operator: fn(&Token<'_>) -> Option<BinaryOp>,
    ) -> Result<Expr, FormulaError> {
        self.parse_operator_chain(operand, Expr::Binary, operator)
    }

    /// Left-associative loop shared by every binary and logical level.
    ///
    /// Each operator in a chain adds one level to the tree, so a chain counts
    /// against the nesting limit the same way parentheses do.
    fn parse_operator_chain<Op>(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, FormulaError>,
        build: fn(Op, Box<Expr>, Box<Expr>) -> Expr,
        operator: fn(&Token<'_>) -> Option<Op>,
    ) -> Result<Expr, FormulaError> {
        let mut lhs = operand(self)?;
        let outer = self.nesting;
        let result = loop {
            let Some(op) = operator(&self.current().token) else {
                break Ok(lhs);
            };
            let position = self.current().position;
            if let Err(err) = self.deepen(position) {
                break Err(err);
            }
            self.advance();
            match operand(self) {
                Ok(rhs) => lhs = build(op, Box::new(lhs), Box::new(rhs)),
                Err(err) => break Err(err),
            }
        };
        self.nesting = outer;
        result
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        let op = match self.current().token {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let position = self.current().position;
        self.advance();
        self.with_nesting(position, |parser| {
            let operand = parser.parse_unary()?;
            Ok(Expr::Unary(op, Box::new(operand)))
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        let SpannedToken { token, position } = self.current().clone();
        match token {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let expr = parser.parse_conditional()?;
                    parser.expect(&Token::RParen, "`)`")?;
                    Ok(expr)
                })
            }
            Token::Ident(name) => {
                self.advance();
                self.parse_identifier(name, position)
            }
            other => Err(FormulaError::UnexpectedToken {
                expected: "number, string, or `(`",
                found: other.describe(),
                position,
            }),
        }
    }

    fn parse_identifier(&mut self, name: &'input str, position: usize) -> Result<Expr, FormulaError> {
        match name {
            "true" => Ok(Expr::Bool(true)),
            "false" => Ok(Expr::Bool(false)),
            "Math" => self.parse_math_member(),
            "Date" => {
                self.expect(&Token::Dot, "`.` after `Date`")?;
                let member_pos = self.current().position;
                let member = self.expect_ident("`now` after `Date.`")?;
                if member != "now" {
                    return Err(FormulaError::UnknownFunction {
                        name: format!("Date.{member}"),
                        position: member_pos,
                    });
                }
                self.expect(&Token::LParen, "`(` after `Date.now`")?;
                self.expect(&Token::RParen, "`)` after `Date.now(`")?;
                Ok(Expr::Call(Builtin::Now, Vec::new()))
            }
            "new" => {
                let ctor_pos = self.current().position;
                let ctor = self.expect_ident("`Date` after `new`")?;
                if ctor != "Date" {
                    return Err(FormulaError::UnknownFunction {
                        name: format!("new {ctor}"),
                        position: ctor_pos,
                    });
                }
                if !self.matches(&Token::LParen) {
                    return Ok(Expr::NewDate(None));
                }
                let mut args = self.with_nesting(ctor_pos, Self::parse_argument_list)?;
                match args.len() {
                    0 => Ok(Expr::NewDate(None)),
                    1 => Ok(Expr::NewDate(args.pop().map(Box::new))),
                    found => Err(FormulaError::Arity {
                        function: "new Date",
                        expected: "at most 1",
                        found,
                    }),
                }
            }
            _ => Err(FormulaError::UnknownIdentifier {
                name: name.to_string(),
                position,
            }),
        }
    }

    fn parse_math_member(&mut self) -> Result<Expr, FormulaError> {
        self.expect(&Token::Dot, "`.` after `Math`")?;
        let member_pos = self.current().position;
        let member = self.expect_ident("a `Math` member")?;
        match member {
            "PI" => return Ok(Expr::Number(std::f64::consts::PI)),
            "E" => return Ok(Expr::Number(std::f64::consts::E)),
            _ => {}
        }
        let function = Builtin::from_math_name(member).ok_or_else(|| FormulaError::UnknownFunction {
            name: format!("Math.{member}"),
            position: member_pos,
        })?;
        self.expect(&Token::LParen, "`(` after function name")?;
        let args = self.with_nesting(member_pos, Self::parse_argument_list)?;
        Ok(Expr::Call(function, args))
    }

    /// Parses `a, b, c)` with the opening parenthesis already consumed.
    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if self.matches(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_conditional()?);
            if self.matches(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "`)` after arguments")?;
            break;
        }
        Ok(args)
    }

    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, FormulaError>,
    ) -> Result<T, FormulaError> {
        let outer = self.nesting;
        self.deepen(position)?;
        let result = f(self);
        self.nesting = outer;
        result
    }

    fn deepen(&mut self, position: usize) -> Result<(), FormulaError> {
        if self.nesting >= MAX_FORMULA_NESTING {
            return Err(FormulaError::NestingTooDeep {
                max_depth: MAX_FORMULA_NESTING,
                position,
            });
        }
        self.nesting += 1;
        Ok(())
    }

    fn expect(&mut self, token: &Token<'_>, expected: &'static str) -> Result<(), FormulaError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(FormulaError::UnexpectedToken {
                expected,
                found: self.current().token.describe(),
                position: self.current().position,
            })
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<&'input str, FormulaError> {
        let position = self.current().position;
        if let Token::Ident(name) = self.current().token {
            self.advance();
            return Ok(name);
        }
        Err(FormulaError::UnexpectedToken {
            expected,
            found: self.current().token.describe(),
            position,
        })
    }

    /// Consumes the token if it is of the same kind as `kind`.
    fn matches(&mut self, kind: &Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current(&self) -> &SpannedToken<'input> {
        debug_assert!(self.index < self.tokens.len(), "parser index out of bounds");
        &self.tokens[self.index]
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }
}
