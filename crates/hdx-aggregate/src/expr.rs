//! Sandboxed arithmetic expressions.
//!
//! Used for derived columns and custom reducers. The grammar only knows
//! numbers, named variables, parentheses and the four arithmetic operators,
//! so evaluation can never reach anything but the supplied variable lookup.
//!
//! ## Precedence (lowest to highest)
//!
//! 1. `+`, `-` (additive)
//! 2. `*`, `/` (multiplicative)
//! 3. `-`, `+` (unary)
//! 4. Primary: number, variable, `` `quoted variable` ``, parenthesized

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unterminated quoted variable starting at position {position}")]
    UnterminatedQuote { position: usize },

    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    /// The variable exists but has no numeric value for this evaluation.
    #[error("no numeric value for '{name}'")]
    MissingValue { name: String },

    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Variable(String),
    Negate(Box<Node>),
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Ident(name) => write!(f, "variable '{name}'"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        let start = pos;
        let kind = match ch {
            c if c.is_whitespace() => {
                pos += 1;
                continue;
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '`' => {
                let end = chars[pos + 1..]
                    .iter()
                    .position(|&c| c == '`')
                    .ok_or(ExprError::UnterminatedQuote { position: start })?;
                let name: String = chars[pos + 1..pos + 1 + end].iter().collect();
                pos += end + 2;
                tokens.push(Token {
                    kind: TokenKind::Ident(name),
                    position: start,
                });
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => {
                while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                    pos += 1;
                }
                let text: String = chars[start..pos].iter().collect();
                let value = text.parse::<f64>().map_err(|_| ExprError::UnexpectedToken {
                    found: format!("number '{text}'"),
                    position: start,
                })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    position: start,
                });
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..pos].iter().collect()),
                    position: start,
                });
                continue;
            }
            other => {
                return Err(ExprError::UnexpectedChar {
                    ch: other,
                    position: start,
                });
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
        pos += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn unexpected(token: Token) -> ExprError {
        ExprError::UnexpectedToken {
            found: token.kind.to_string(),
            position: token.position,
        }
    }

    fn parse_additive(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        match self.peek() {
            Some(TokenKind::Minus) => {
                self.advance();
                Ok(Node::Negate(Box::new(self.parse_unary()?)))
            }
            Some(TokenKind::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        let token = self.advance().ok_or(ExprError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok(Node::Number(value)),
            TokenKind::Ident(name) => Ok(Node::Variable(name)),
            TokenKind::LParen => {
                let inner = self.parse_additive()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(Self::unexpected(other)),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            _ => Err(Self::unexpected(token)),
        }
    }
}

/// A parsed arithmetic expression over named variables.
///
/// ```
/// use hdx_aggregate::Expression;
///
/// let expr = Expression::parse("(cases - deaths) / cases * 100").unwrap();
/// let value = expr
///     .evaluate(&|name| match name {
///         "cases" => Some(200.0),
///         "deaths" => Some(50.0),
///         _ => None,
///     })
///     .unwrap();
/// assert_eq!(value, 75.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_additive()?;
        if let Some(extra) = parser.advance() {
            return Err(Parser::unexpected(extra));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of every variable the expression reads.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        collect_variables(&self.root, &mut names);
        names
    }

    /// Evaluates with `lookup` supplying variable values.
    pub fn evaluate(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
        eval(&self.root, lookup)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect_variables<'a>(node: &'a Node, names: &mut BTreeSet<&'a str>) {
    match node {
        Node::Number(_) => {}
        Node::Variable(name) => {
            names.insert(name.as_str());
        }
        Node::Negate(inner) => collect_variables(inner, names),
        Node::Binary { left, right, .. } => {
            collect_variables(left, names);
            collect_variables(right, names);
        }
    }
}

fn eval(node: &Node, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
    match node {
        Node::Number(value) => Ok(*value),
        Node::Variable(name) => lookup(name).ok_or_else(|| ExprError::MissingValue {
            name: name.clone(),
        }),
        Node::Negate(inner) => Ok(-eval(inner, lookup)?),
        Node::Binary { op, left, right } => {
            let left = eval(left, lookup)?;
            let right = eval(right, lookup)?;
            match op {
                BinaryOp::Add => Ok(left + right),
                BinaryOp::Sub => Ok(left - right),
                BinaryOp::Mul => Ok(left * right),
                BinaryOp::Div if right == 0.0 => Err(ExprError::DivisionByZero),
                BinaryOp::Div => Ok(left / right),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with(source: &str, vars: &[(&str, f64)]) -> Result<f64, ExprError> {
        let expr = Expression::parse(source)?;
        expr.evaluate(&|name| vars.iter().find(|(n, _)| *n == name).map(|(_, v)| *v))
    }

    #[test]
    fn precedence_and_unary_minus() {
        assert_eq!(eval_with("1 + 2 * 3", &[]), Ok(7.0));
        assert_eq!(eval_with("(1 + 2) * 3", &[]), Ok(9.0));
        assert_eq!(eval_with("-a - -2", &[("a", 5.0)]), Ok(-3.0));
        assert_eq!(eval_with("10 / 4 / 5", &[]), Ok(0.5));
    }

    #[test]
    fn quoted_variables_allow_spaces() {
        let expr = Expression::parse("`people in need` - targeted").expect("parse");
        let vars: Vec<&str> = expr.variables().into_iter().collect();
        assert_eq!(vars, vec!["people in need", "targeted"]);
    }

    #[test]
    fn rejects_anything_but_arithmetic() {
        assert!(matches!(
            Expression::parse("a; b"),
            Err(ExprError::UnexpectedChar { ch: ';', .. })
        ));
        assert!(matches!(
            Expression::parse("f(a)"),
            Err(ExprError::UnexpectedToken { .. })
        ));
        assert_eq!(Expression::parse("a +"), Err(ExprError::UnexpectedEnd));
        assert_eq!(Expression::parse("  "), Err(ExprError::Empty));
        assert!(matches!(
            Expression::parse("`open"),
            Err(ExprError::UnterminatedQuote { position: 0 })
        ));
    }

    #[test]
    fn evaluation_errors() {
        assert_eq!(eval_with("a / 0", &[("a", 1.0)]), Err(ExprError::DivisionByZero));
        assert_eq!(
            eval_with("a + b", &[("a", 1.0)]),
            Err(ExprError::MissingValue {
                name: "b".to_string()
            })
        );
    }
}
