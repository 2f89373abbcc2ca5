use regex::Regex;
use serde_json::Value;

use super::lexer::{Spanned, Token};
use super::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Literal(Value),
    Variable(String),
    Index(Box<Node>, Box<Node>),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    /// `=~` or `!~` with a string literal pattern, compiled with the expression.
    Regex(BinaryOp, Box<Node>, LiteralRegex),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone)]
pub(crate) struct LiteralRegex(Regex);

impl LiteralRegex {
    pub(crate) fn regex(&self) -> &Regex {
        &self.0
    }
}

impl PartialEq for LiteralRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Match => "=~",
            Self::NotMatch => "!~",
            Self::In => "in",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "**",
        }
    }
}

// Binding powers, loosest first.
const TERNARY_BP: u8 = 1;
const PREFIX_BP: u8 = 15;
const POSTFIX_BP: u8 = 17;

/// Returns (operator, left binding power, right binding power).
fn infix(token: &Token) -> Option<(BinaryOp, u8, u8)> {
    let entry = match token {
        Token::Or => (BinaryOp::Or, 3, 4),
        Token::And => (BinaryOp::And, 5, 6),
        Token::Eq => (BinaryOp::Eq, 7, 8),
        Token::NotEq => (BinaryOp::NotEq, 7, 8),
        Token::Lt => (BinaryOp::Lt, 7, 8),
        Token::Le => (BinaryOp::Le, 7, 8),
        Token::Gt => (BinaryOp::Gt, 7, 8),
        Token::Ge => (BinaryOp::Ge, 7, 8),
        Token::Match => (BinaryOp::Match, 7, 8),
        Token::NotMatch => (BinaryOp::NotMatch, 7, 8),
        Token::In => (BinaryOp::In, 7, 8),
        Token::Plus => (BinaryOp::Add, 9, 10),
        Token::Minus => (BinaryOp::Sub, 9, 10),
        Token::Star => (BinaryOp::Mul, 11, 12),
        Token::Slash => (BinaryOp::Div, 11, 12),
        Token::Percent => (BinaryOp::Rem, 11, 12),
        // right associative
        Token::Power => (BinaryOp::Pow, 14, 13),
        _ => return None,
    };
    Some(entry)
}

pub(crate) fn parse(tokens: Vec<Spanned>) -> Result<Node, CompileError> {
    if tokens.is_empty() {
        return Err(CompileError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.expression(0)?;

    match parser.tokens.get(parser.pos) {
        None => Ok(node),
        Some((offset, token)) => Err(CompileError::UnexpectedToken {
            token: token.to_string(),
            offset: *offset,
        }),
    }
}

fn binary_node(op: BinaryOp, lhs: Node, rhs: Node) -> Result<Node, CompileError> {
    match (op, rhs) {
        (BinaryOp::Match | BinaryOp::NotMatch, Node::Literal(Value::String(pattern))) => {
            let regex = Regex::new(&pattern).map_err(|e| CompileError::InvalidRegex(e.to_string()))?;
            Ok(Node::Regex(op, Box::new(lhs), LiteralRegex(regex)))
        }
        (op, rhs) => Ok(Node::Binary(op, Box::new(lhs), Box::new(rhs))),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn expect(&mut self, expected: Token) -> Result<(), CompileError> {
        match self.advance() {
            Some((_, token)) if token == expected => Ok(()),
            Some((offset, token)) => Err(CompileError::UnexpectedToken {
                token: token.to_string(),
                offset,
            }),
            None => Err(CompileError::UnexpectedEnd),
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self, min_bp: u8) -> Result<Node, CompileError> {
        let mut lhs = self.prefix()?;

        loop {
            let Some(token) = self.peek() else {
                break;
            };

            match token {
                Token::Dot => {
                    if POSTFIX_BP < min_bp {
                        break;
                    }
                    self.pos += 1;
                    let key = match self.advance() {
                        Some((_, Token::Ident(name))) => name,
                        Some((offset, token)) => {
                            return Err(CompileError::UnexpectedToken {
                                token: token.to_string(),
                                offset,
                            })
                        }
                        None => return Err(CompileError::UnexpectedEnd),
                    };
                    lhs = Node::Index(Box::new(lhs), Box::new(Node::Literal(Value::String(key))));
                    continue;
                }
                Token::LBracket => {
                    if POSTFIX_BP < min_bp {
                        break;
                    }
                    self.pos += 1;
                    let key = self.expression(0)?;
                    self.expect(Token::RBracket)?;
                    lhs = Node::Index(Box::new(lhs), Box::new(key));
                    continue;
                }
                Token::Question => {
                    if TERNARY_BP < min_bp {
                        break;
                    }
                    self.pos += 1;
                    let then = self.expression(0)?;
                    self.expect(Token::Colon)?;
                    let otherwise = self.expression(TERNARY_BP)?;
                    lhs = Node::Ternary(Box::new(lhs), Box::new(then), Box::new(otherwise));
                    continue;
                }
                _ => {}
            }

            let Some((op, l_bp, r_bp)) = infix(token) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;

            let rhs = self.expression(r_bp)?;
            lhs = binary_node(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Node, CompileError> {
        let Some((offset, token)) = self.advance() else {
            return Err(CompileError::UnexpectedEnd);
        };

        let node = match token {
            Token::Number(n) => Node::Literal(Value::from(n)),
            Token::Str(s) => Node::Literal(Value::String(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Node::Literal(Value::Bool(true)),
                "false" => Node::Literal(Value::Bool(false)),
                "null" | "nil" => Node::Literal(Value::Null),
                _ => Node::Variable(name),
            },
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                inner
            }
            Token::LBracket => Node::Array(self.array_items()?),
            Token::LBrace => Node::Object(self.object_entries()?),
            Token::Not => Node::Unary(UnaryOp::Not, Box::new(self.expression(PREFIX_BP)?)),
            Token::Minus => Node::Unary(UnaryOp::Neg, Box::new(self.expression(PREFIX_BP)?)),
            Token::Plus => self.expression(PREFIX_BP)?,
            token => {
                return Err(CompileError::UnexpectedToken {
                    token: token.to_string(),
                    offset,
                })
            }
        };

        Ok(node)
    }

    fn array_items(&mut self) -> Result<Vec<Node>, CompileError> {
        let mut items = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(items);
        }

        loop {
            items.push(self.expression(0)?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RBracket)?;
            return Ok(items);
        }
    }

    fn object_entries(&mut self) -> Result<Vec<(String, Node)>, CompileError> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(entries);
        }

        loop {
            let key = match self.advance() {
                Some((_, Token::Str(key))) | Some((_, Token::Ident(key))) => key,
                Some((offset, token)) => {
                    return Err(CompileError::UnexpectedToken {
                        token: token.to_string(),
                        offset,
                    })
                }
                None => return Err(CompileError::UnexpectedEnd),
            };
            self.expect(Token::Colon)?;
            entries.push((key, self.expression(0)?));

            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RBrace)?;
            return Ok(entries);
        }
    }
}
