//! SQL-like query text
//!
//! Accepts the subset needed to express a [`Predicate`]:
//!
//! ```text
//! SELECT * FROM <container> [[AS] <alias>]
//!     [WHERE <alias>.<path> <op> <literal> [AND ...]]
//! ```
//!
//! `<op>` is one of `= < <= > >=`; literals are single- or double-quoted
//! strings, numbers, `true`, `false` and `null`. Keywords are
//! case-insensitive. Field references must go through the alias
//! (`c.StarRating`, `c.Address.City`).

use partdb_core::{Error, FieldPath, Result};
use serde_json::{Number, Value};

use super::predicate::{CompareOp, Comparison, Predicate};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Select,
    From,
    Where,
    And,
    As,
    True,
    False,
    Null,
    Star,
    Dot,
    Op(CompareOp),
    Identifier(String),
    StringLit(String),
    IntLit(i64),
    FloatLit(f64),
    Eof,
}

/// Parse query text into a predicate
pub fn parse_query(text: &str) -> Result<Predicate> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_statement()
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidQuery(msg.into())
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '*' => {
                tokens.push(Token::Star);
                i += 1;
                continue;
            }
            '.' if !(i + 1 < len && chars[i + 1].is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
                continue;
            }
            '=' => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 1;
                continue;
            }
            '<' | '>' => {
                let or_equal = i + 1 < len && chars[i + 1] == '=';
                let op = match (c, or_equal) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                tokens.push(Token::Op(op));
                i += if or_equal { 2 } else { 1 };
                continue;
            }
            _ => {}
        }

        // String literals
        if c == '\'' || c == '"' {
            let quote = c;
            i += 1;
            let mut s = String::new();
            let mut closed = false;
            while i < len {
                if chars[i] == '\\' && i + 1 < len {
                    s.push(chars[i + 1]);
                    i += 2;
                } else if chars[i] == quote {
                    closed = true;
                    i += 1;
                    break;
                } else {
                    s.push(chars[i]);
                    i += 1;
                }
            }
            if !closed {
                return Err(invalid("unterminated string literal"));
            }
            tokens.push(Token::StringLit(s));
            continue;
        }

        // Numbers, with an optional leading minus
        let starts_number = c.is_ascii_digit()
            || (c == '.' && i + 1 < len && chars[i + 1].is_ascii_digit())
            || (c == '-' && i + 1 < len && (chars[i + 1].is_ascii_digit() || chars[i + 1] == '.'));
        if starts_number {
            let start = i;
            let mut has_dot = c == '.';
            i += 1;
            while i < len && (chars[i].is_ascii_digit() || (!has_dot && chars[i] == '.')) {
                if chars[i] == '.' {
                    has_dot = true;
                }
                i += 1;
            }
            let num_str: String = chars[start..i].iter().collect();
            let token = if has_dot {
                Token::FloatLit(
                    num_str
                        .parse()
                        .map_err(|_| invalid(format!("invalid number: {}", num_str)))?,
                )
            } else {
                Token::IntLit(
                    num_str
                        .parse()
                        .map_err(|_| invalid(format!("invalid number: {}", num_str)))?,
                )
            };
            tokens.push(token);
            continue;
        }

        // Identifiers and keywords
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let token = match word.to_uppercase().as_str() {
                "SELECT" => Token::Select,
                "FROM" => Token::From,
                "WHERE" => Token::Where,
                "AND" => Token::And,
                "AS" => Token::As,
                "TRUE" => Token::True,
                "FALSE" => Token::False,
                "NULL" => Token::Null,
                _ => Token::Identifier(word),
            };
            tokens.push(token);
            continue;
        }

        return Err(invalid(format!("unexpected character '{}'", c)));
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        let token = self.advance();
        if token == expected {
            Ok(())
        } else {
            Err(invalid(format!("expected {}, found {:?}", what, token)))
        }
    }

    fn identifier(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            other => Err(invalid(format!("expected {}, found {:?}", what, other))),
        }
    }

    fn parse_statement(&mut self) -> Result<Predicate> {
        self.expect(Token::Select, "SELECT")?;
        self.expect(Token::Star, "'*' (only SELECT * is supported)")?;
        self.expect(Token::From, "FROM")?;
        let container = self.identifier("container name")?;

        let alias = match self.peek() {
            Token::As => {
                self.advance();
                self.identifier("alias")?
            }
            Token::Identifier(_) => self.identifier("alias")?,
            _ => container,
        };

        let mut predicate = Predicate::all();
        if *self.peek() == Token::Where {
            self.advance();
            predicate.push(self.parse_comparison(&alias)?);
            while *self.peek() == Token::And {
                self.advance();
                predicate.push(self.parse_comparison(&alias)?);
            }
        }

        match self.advance() {
            Token::Eof => Ok(predicate),
            other => Err(invalid(format!("unexpected {:?} after query", other))),
        }
    }

    fn parse_comparison(&mut self, alias: &str) -> Result<Comparison> {
        let root = self.identifier("field reference")?;
        if root != alias {
            return Err(invalid(format!(
                "field reference must start with '{}', found '{}'",
                alias, root
            )));
        }
        let mut segments = Vec::new();
        while *self.peek() == Token::Dot {
            self.advance();
            segments.push(self.identifier("field name")?);
        }
        if segments.is_empty() {
            return Err(invalid(format!("expected '{}.<field>'", alias)));
        }
        let field = FieldPath::parse(&segments.join("."))?;

        let op = match self.advance() {
            Token::Op(op) => op,
            other => {
                return Err(invalid(format!(
                    "expected comparison operator, found {:?}",
                    other
                )))
            }
        };

        let value = match self.advance() {
            Token::StringLit(s) => Value::String(s),
            Token::IntLit(n) => Value::from(n),
            Token::FloatLit(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| invalid(format!("invalid number: {}", f)))?,
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
            other => return Err(invalid(format!("expected literal, found {:?}", other))),
        };

        Ok(Comparison { field, op, value })
    }
}
