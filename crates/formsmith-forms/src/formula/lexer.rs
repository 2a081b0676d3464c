//! Formula tokenizer

use super::FormulaError;

/// Lexer token produced from formula text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'a> {
    /// Numeric literal.
    Number(f64),
    /// String literal with escapes resolved.
    Str(String),
    /// Identifier or keyword (`Math`, `new`, `true`, ...).
    Ident(&'a str),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Dot,
    Question,
    Colon,
    Not,
    AndAnd,
    OrOr,
    /// `==` or `===`
    Eq,
    /// `!=` or `!==`
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// End-of-input marker.
    Eof,
}

impl Token<'_> {
    /// Formats the token for diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Str(s) => format!("\"{s}\""),
            Token::Ident(name) => (*name).to_string(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Question => "?".into(),
            Token::Colon => ":".into(),
            Token::Not => "!".into(),
            Token::AndAnd => "&&".into(),
            Token::OrOr => "||".into(),
            Token::Eq => "==".into(),
            Token::NotEq => "!=".into(),
            Token::Less => "<".into(),
            Token::LessEq => "<=".into(),
            Token::Greater => ">".into(),
            Token::GreaterEq => ">=".into(),
            Token::Eof => "end of input".into(),
        }
    }
}

/// Token paired with its byte offset.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpannedToken<'a> {
    pub(crate) token: Token<'a>,
    pub(crate) position: usize,
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) const fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    pub(crate) fn lex(&mut self) -> Result<Vec<SpannedToken<'a>>, FormulaError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while self.offset < bytes.len() {
            let ch = bytes[self.offset];
            let start = self.offset;
            let token = match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.offset += 1;
                    continue;
                }
                b'+' => self.single(Token::Plus),
                b'-' => self.single(Token::Minus),
                b'*' => self.single(Token::Star),
                b'/' => self.single(Token::Slash),
                b'%' => self.single(Token::Percent),
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b',' => self.single(Token::Comma),
                b'?' => self.single(Token::Question),
                b':' => self.single(Token::Colon),
                b'.' if !self.peek(bytes, 1).is_some_and(|b| b.is_ascii_digit()) => self.single(Token::Dot),
                b'0'..=b'9' | b'.' => self.number(bytes)?,
                b'"' | b'\'' => self.string(ch)?,
                b'!' => {
                    if self.peek(bytes, 1) == Some(b'=') {
                        let width = if self.peek(bytes, 2) == Some(b'=') { 3 } else { 2 };
                        self.offset += width;
                        Token::NotEq
                    } else {
                        self.single(Token::Not)
                    }
                }
                b'=' => {
                    if self.peek(bytes, 1) != Some(b'=') {
                        return Err(FormulaError::UnexpectedCharacter {
                            found: '=',
                            position: start,
                        });
                    }
                    let width = if self.peek(bytes, 2) == Some(b'=') { 3 } else { 2 };
                    self.offset += width;
                    Token::Eq
                }
                b'<' => self.with_optional_eq(bytes, Token::Less, Token::LessEq),
                b'>' => self.with_optional_eq(bytes, Token::Greater, Token::GreaterEq),
                b'&' => self.doubled(bytes, b'&', Token::AndAnd)?,
                b'|' => self.doubled(bytes, b'|', Token::OrOr)?,
                b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => {
                    self.consume_while(bytes, |b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$');
                    Token::Ident(&self.input[start..self.offset])
                }
                _ => {
                    let found = self.input[start..].chars().next().unwrap_or('\u{fffd}');
                    return Err(FormulaError::UnexpectedCharacter { found, position: start });
                }
            };
            tokens.push(SpannedToken { token, position: start });
        }

        if tokens.is_empty() {
            return Err(FormulaError::EmptyInput);
        }
        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    fn single(&mut self, token: Token<'a>) -> Token<'a> {
        self.offset += 1;
        token
    }

    fn with_optional_eq(&mut self, bytes: &[u8], bare: Token<'a>, with_eq: Token<'a>) -> Token<'a> {
        if self.peek(bytes, 1) == Some(b'=') {
            self.offset += 2;
            with_eq
        } else {
            self.single(bare)
        }
    }

    fn doubled(&mut self, bytes: &[u8], expected: u8, token: Token<'a>) -> Result<Token<'a>, FormulaError> {
        if self.peek(bytes, 1) == Some(expected) {
            self.offset += 2;
            Ok(token)
        } else {
            Err(FormulaError::UnexpectedCharacter {
                found: char::from(expected),
                position: self.offset,
            })
        }
    }

    fn number(&mut self, bytes: &[u8]) -> Result<Token<'a>, FormulaError> {
        let start = self.offset;
        self.consume_while(bytes, |b| b.is_ascii_digit());
        if bytes.get(self.offset) == Some(&b'.') {
            self.offset += 1;
            self.consume_while(bytes, |b| b.is_ascii_digit());
        }
        if matches!(bytes.get(self.offset), Some(b'e' | b'E')) {
            let exponent_digits = match self.peek(bytes, 1) {
                Some(b'+' | b'-') => self.peek(bytes, 2),
                other => other,
            };
            if exponent_digits.is_some_and(|b| b.is_ascii_digit()) {
                self.offset += 1;
                if matches!(bytes.get(self.offset), Some(b'+' | b'-')) {
                    self.offset += 1;
                }
                self.consume_while(bytes, |b| b.is_ascii_digit());
            }
        }

        let raw = &self.input[start..self.offset];
        raw.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FormulaError::InvalidNumber {
                raw: raw.to_string(),
                position: start,
            })
    }

    fn string(&mut self, quote: u8) -> Result<Token<'a>, FormulaError> {
        let start = self.offset;
        self.offset += 1;
        let mut value = String::new();
        let mut chars = self.input[self.offset..].char_indices();

        while let Some((index, c)) = chars.next() {
            match c {
                '\\' => {
                    let Some((_, escaped)) = chars.next() else {
                        break;
                    };
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c as u32 == u32::from(quote) => {
                    self.offset += index + 1;
                    return Ok(Token::Str(value));
                }
                c => value.push(c),
            }
        }

        Err(FormulaError::UnterminatedString { position: start })
    }

    fn peek(&self, bytes: &[u8], ahead: usize) -> Option<u8> {
        bytes.get(self.offset + ahead).copied()
    }

    fn consume_while<F>(&mut self, bytes: &[u8], condition: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(&b) = bytes.get(self.offset) {
            if condition(b) {
                self.offset += 1;
            } else {
                break;
            }
        }
    }
}
